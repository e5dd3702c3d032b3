//! Run service - starting runs in the background and reading their audit trail

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::workflow_service::parse_workflow_id;
use crate::domain::run::{RunId, RunRepository, RunStatus, WorkflowRun};
use crate::domain::{DomainError, WorkflowError, WorkflowExecutor, WorkflowId, WorkflowRepository};

/// Handle to a run executing in the background
#[derive(Debug)]
pub struct StartedRun {
    pub run_id: RunId,

    /// Resolves to the terminal status once the run finishes
    pub handle: JoinHandle<RunStatus>,
}

/// Listing entry for a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub id: RunId,
    pub workflow_id: WorkflowId,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub attempt_count: usize,
}

impl From<&WorkflowRun> for RunSummary {
    fn from(run: &WorkflowRun) -> Self {
        Self {
            id: run.id().clone(),
            workflow_id: run.workflow_id().clone(),
            status: run.status(),
            started_at: run.started_at(),
            ended_at: run.ended_at(),
            attempt_count: run.attempt_count(),
        }
    }
}

/// Starts runs and exposes their records
pub struct RunService {
    workflows: Arc<dyn WorkflowRepository>,
    runs: Arc<dyn RunRepository>,
    executor: Arc<dyn WorkflowExecutor>,
}

impl std::fmt::Debug for RunService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunService")
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl RunService {
    pub fn new(
        workflows: Arc<dyn WorkflowRepository>,
        runs: Arc<dyn RunRepository>,
        executor: Arc<dyn WorkflowExecutor>,
    ) -> Self {
        Self {
            workflows,
            runs,
            executor,
        }
    }

    /// Create a run in `Running` and execute it on its own task
    ///
    /// Rejected before any run exists when the workflow is missing or has
    /// no steps.
    pub async fn start_run(&self, workflow_id: &str) -> Result<StartedRun, DomainError> {
        let workflow_id = parse_workflow_id(workflow_id)?;

        let workflow = self
            .workflows
            .get(&workflow_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Workflow '{}' not found", workflow_id)))?;

        if workflow.is_empty() {
            return Err(WorkflowError::empty_workflow(workflow_id.as_str()).into());
        }

        let run = self.runs.create(WorkflowRun::start(workflow_id.clone())).await?;
        let run_id = run.id().clone();

        info!(run_id = %run_id, workflow_id = %workflow_id, "Queued run");

        let executor = self.executor.clone();
        let task_run_id = run_id.clone();
        let handle =
            tokio::spawn(async move { executor.execute(&task_run_id, &workflow_id).await });

        Ok(StartedRun { run_id, handle })
    }

    /// A run with its attempts in execution order
    pub async fn get_run(&self, run_id: &str) -> Result<WorkflowRun, DomainError> {
        let run_id = RunId::new(run_id)?;

        self.runs
            .get(&run_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Run '{}' not found", run_id)))
    }

    /// Runs of a workflow, newest first
    pub async fn list_runs(&self, workflow_id: &str) -> Result<Vec<RunSummary>, DomainError> {
        let workflow_id = parse_workflow_id(workflow_id)?;

        if !self.workflows.exists(&workflow_id).await? {
            return Err(DomainError::not_found(format!(
                "Workflow '{}' not found",
                workflow_id
            )));
        }

        let runs = self.runs.list_by_workflow(&workflow_id).await?;
        Ok(runs.iter().map(RunSummary::from).collect())
    }

    /// Start a run and wait for it to finish
    pub async fn run_to_completion(&self, workflow_id: &str) -> Result<WorkflowRun, DomainError> {
        let started = self.start_run(workflow_id).await?;

        if let Err(e) = started.handle.await {
            error!(run_id = %started.run_id, error = %e, "Run task panicked");
            return Err(DomainError::internal(format!("Run task failed: {}", e)));
        }

        self.get_run(started.run_id.as_str()).await
    }
}
