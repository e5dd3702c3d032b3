//! Workflow executor trait

use async_trait::async_trait;

use super::entity::WorkflowId;
use crate::domain::run::{RunId, RunStatus};

/// Drives one run of a workflow to a terminal status
///
/// Implementations own their error boundary: every failure, including
/// storage failures, ends as a `Failed` run rather than an `Err`.
#[async_trait]
pub trait WorkflowExecutor: Send + Sync + std::fmt::Debug {
    /// Execute the run and return its terminal status
    async fn execute(&self, run_id: &RunId, workflow_id: &WorkflowId) -> RunStatus;
}
