//! Run repository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::entity::{AttemptRecord, RunId, RunStatus, WorkflowRun};
use crate::domain::workflow::WorkflowId;
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Persistence for runs and their attempt trail
///
/// All writes for a run go through this trait. Implementations must make
/// each call atomic with respect to concurrent readers.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Store a freshly started run
    async fn create(&self, run: WorkflowRun) -> Result<WorkflowRun, DomainError>;

    /// Get a run with its attempts in execution order
    async fn get(&self, id: &RunId) -> Result<Option<WorkflowRun>, DomainError>;

    /// Runs of a workflow, newest first
    async fn list_by_workflow(&self, workflow_id: &WorkflowId)
        -> Result<Vec<WorkflowRun>, DomainError>;

    /// Append one attempt; fails when the run is missing or terminal
    async fn append_attempt(&self, id: &RunId, record: AttemptRecord) -> Result<(), DomainError>;

    /// Move a run to a terminal status
    async fn update_status(
        &self,
        id: &RunId,
        status: RunStatus,
        ended_at: DateTime<Utc>,
    ) -> Result<(), DomainError>;

    /// Remove every run of a workflow, returning how many were removed
    async fn delete_by_workflow(&self, workflow_id: &WorkflowId) -> Result<usize, DomainError>;
}
