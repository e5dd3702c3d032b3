use axum::{
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::debug;
use super::health;
use super::runs;
use super::state::AppState;
use super::types::Json;
use super::workflows;

/// GET /
async fn root() -> Json<Value> {
    Json(json!({"status": "Agentic Workflow Builder API running"}))
}

/// Create the full router with application state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        // Health endpoints
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        // Workflow definitions
        .route(
            "/workflows",
            get(workflows::list_workflows).post(workflows::create_workflow),
        )
        .route(
            "/workflows/{workflow_id}",
            get(workflows::get_workflow)
                .put(workflows::update_workflow)
                .delete(workflows::delete_workflow),
        )
        // Runs
        .route("/workflows/{workflow_id}/run", post(runs::start_run))
        .route("/workflows/{workflow_id}/runs", get(runs::list_runs))
        .route("/runs/{run_id}", get(runs::get_run))
        // Gateway check
        .route("/debug/llm", post(debug::debug_llm))
        // Add state and middleware
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
