//! In-memory run repository implementation

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::run::{AttemptRecord, RunId, RunRepository, RunStatus, WorkflowRun};
use crate::domain::{DomainError, WorkflowId};

/// In-memory implementation of RunRepository
///
/// Every call holds the write lock for its whole duration, so readers never
/// observe a half-applied append or status change.
#[derive(Debug, Default)]
pub struct InMemoryRunRepository {
    runs: Arc<RwLock<HashMap<String, WorkflowRun>>>,
}

impl InMemoryRunRepository {
    /// Create a new empty repository
    pub fn new() -> Self {
        Self::default()
    }

    fn missing(id: &RunId) -> DomainError {
        DomainError::not_found(format!("Run '{}' not found", id))
    }
}

#[async_trait]
impl RunRepository for InMemoryRunRepository {
    async fn create(&self, run: WorkflowRun) -> Result<WorkflowRun, DomainError> {
        let mut runs = self.runs.write().await;

        if runs.contains_key(run.id().as_str()) {
            return Err(DomainError::conflict(format!(
                "Run '{}' already exists",
                run.id()
            )));
        }

        runs.insert(run.id().as_str().to_string(), run.clone());
        Ok(run)
    }

    async fn get(&self, id: &RunId) -> Result<Option<WorkflowRun>, DomainError> {
        let runs = self.runs.read().await;
        Ok(runs.get(id.as_str()).cloned())
    }

    async fn list_by_workflow(
        &self,
        workflow_id: &WorkflowId,
    ) -> Result<Vec<WorkflowRun>, DomainError> {
        let runs = self.runs.read().await;

        let mut list: Vec<WorkflowRun> = runs
            .values()
            .filter(|run| run.workflow_id() == workflow_id)
            .cloned()
            .collect();

        list.sort_by(|a, b| b.started_at().cmp(&a.started_at()));
        Ok(list)
    }

    async fn append_attempt(&self, id: &RunId, record: AttemptRecord) -> Result<(), DomainError> {
        let mut runs = self.runs.write().await;
        let run = runs.get_mut(id.as_str()).ok_or_else(|| Self::missing(id))?;
        run.append_attempt(record)
    }

    async fn update_status(
        &self,
        id: &RunId,
        status: RunStatus,
        ended_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let mut runs = self.runs.write().await;
        let run = runs.get_mut(id.as_str()).ok_or_else(|| Self::missing(id))?;
        run.finish(status, ended_at)
    }

    async fn delete_by_workflow(&self, workflow_id: &WorkflowId) -> Result<usize, DomainError> {
        let mut runs = self.runs.write().await;
        let before = runs.len();
        runs.retain(|_, run| run.workflow_id() != workflow_id);
        Ok(before - runs.len())
    }
}
