//! Run endpoints: start a workflow and read back its audit trail

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::{AttemptRecord, RunId, RunStatus, WorkflowId, WorkflowRun};
use crate::infrastructure::services::RunSummary;

/// Body returned when a run is queued
#[derive(Debug, Clone, Serialize)]
pub struct RunCreatedResponse {
    pub run_id: RunId,
}

/// A run with every attempt in execution order
#[derive(Debug, Clone, Serialize)]
pub struct RunResponse {
    pub id: RunId,
    pub workflow_id: WorkflowId,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub attempts: Vec<AttemptRecord>,
}

impl From<WorkflowRun> for RunResponse {
    fn from(run: WorkflowRun) -> Self {
        Self {
            id: run.id().clone(),
            workflow_id: run.workflow_id().clone(),
            status: run.status(),
            started_at: run.started_at(),
            ended_at: run.ended_at(),
            attempts: run.attempts().to_vec(),
        }
    }
}

/// POST /workflows/{workflow_id}/run
///
/// Responds as soon as the run exists; execution continues in the
/// background and is observed by polling the run.
pub async fn start_run(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> Result<(StatusCode, Json<RunCreatedResponse>), ApiError> {
    debug!(workflow_id = %workflow_id, "Starting run");

    let started = state.run_service.start_run(&workflow_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(RunCreatedResponse {
            run_id: started.run_id,
        }),
    ))
}

/// GET /runs/{run_id}
pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunResponse>, ApiError> {
    debug!(run_id = %run_id, "Getting run");

    let run = state.run_service.get_run(&run_id).await?;
    Ok(Json(RunResponse::from(run)))
}

/// GET /workflows/{workflow_id}/runs
pub async fn list_runs(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<Vec<RunSummary>>, ApiError> {
    debug!(workflow_id = %workflow_id, "Listing runs");

    let runs = state.run_service.list_runs(&workflow_id).await?;
    Ok(Json(runs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::criteria::CriteriaOutcome;
    use crate::domain::{AllowedModel, Usage};

    #[test]
    fn test_run_response_serialization() {
        let mut run = WorkflowRun::start(WorkflowId::generate());
        run.append_attempt(AttemptRecord::evaluated(
            1,
            1,
            AllowedModel::KimiK2p5,
            "prompt",
            "output",
            CriteriaOutcome::pass("no_criteria"),
            Usage::new(3, 4),
        ))
        .unwrap();

        let value = serde_json::to_value(RunResponse::from(run)).unwrap();

        assert_eq!(value["status"], "RUNNING");
        assert!(value["ended_at"].is_null());
        assert_eq!(value["attempts"][0]["status"], "PASSED");
        assert_eq!(value["attempts"][0]["criteria_reason"], "no_criteria");
        assert_eq!(value["attempts"][0]["usage"]["total_tokens"], 7);
        assert!(value["id"].as_str().unwrap().starts_with("run-"));
    }
}
