//! Direct model call for checking gateway wiring

use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::{AllowedModel, Usage};

/// Token cap for debug calls when the body omits one
pub const DEBUG_DEFAULT_MAX_TOKENS: u32 = 400;

#[derive(Debug, Clone, Deserialize)]
pub struct DebugLlmRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugLlmResponse {
    pub response: String,
    pub usage: Usage,
}

/// POST /debug/llm
pub async fn debug_llm(
    State(state): State<AppState>,
    Json(request): Json<DebugLlmRequest>,
) -> Result<Json<DebugLlmResponse>, ApiError> {
    let model: AllowedModel = request
        .model
        .parse()
        .map_err(|e| ApiError::from(e).with_param("model"))?;
    let max_tokens = request.max_tokens.unwrap_or(DEBUG_DEFAULT_MAX_TOKENS);

    debug!(model = %model, max_tokens, "Debug model call");

    let completion = state
        .gateway
        .invoke(model, &request.prompt, max_tokens)
        .await?;

    Ok(Json(DebugLlmResponse {
        response: completion.text,
        usage: completion.usage,
    }))
}
