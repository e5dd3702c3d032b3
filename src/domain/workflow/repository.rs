//! Workflow repository trait

use async_trait::async_trait;

use super::entity::{Workflow, WorkflowId};
use super::step::StepDefinition;
use crate::domain::DomainError;

/// Repository trait for workflow persistence
#[async_trait]
pub trait WorkflowRepository: Send + Sync + std::fmt::Debug {
    /// Get a workflow by ID
    async fn get(&self, id: &WorkflowId) -> Result<Option<Workflow>, DomainError>;

    /// List all workflows
    async fn list(&self) -> Result<Vec<Workflow>, DomainError>;

    /// Create a new workflow
    async fn create(&self, workflow: Workflow) -> Result<Workflow, DomainError>;

    /// Update an existing workflow
    async fn update(&self, workflow: Workflow) -> Result<Workflow, DomainError>;

    /// Delete a workflow by ID
    async fn delete(&self, id: &WorkflowId) -> Result<bool, DomainError>;

    /// Check if a workflow exists
    async fn exists(&self, id: &WorkflowId) -> Result<bool, DomainError> {
        Ok(self.get(id).await?.is_some())
    }

    /// Snapshot of a workflow's steps, sorted ascending by order
    async fn ordered_steps(&self, id: &WorkflowId) -> Result<Vec<StepDefinition>, DomainError> {
        let workflow = self
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Workflow '{}' not found", id)))?;

        let mut steps = workflow.steps().to_vec();
        steps.sort_by_key(|s| s.order());
        Ok(steps)
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock workflow repository for testing
    #[derive(Debug, Default)]
    pub struct MockWorkflowRepository {
        workflows: Mutex<HashMap<String, Workflow>>,
        should_fail: Mutex<Option<String>>,
    }

    impl MockWorkflowRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_workflow(self, workflow: Workflow) -> Self {
            self.workflows
                .lock()
                .unwrap()
                .insert(workflow.id().as_str().to_string(), workflow);
            self
        }

        pub fn with_error(self, error: impl Into<String>) -> Self {
            *self.should_fail.lock().unwrap() = Some(error.into());
            self
        }

        fn check_error(&self) -> Result<(), DomainError> {
            if let Some(ref msg) = *self.should_fail.lock().unwrap() {
                return Err(DomainError::storage(msg.clone()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl WorkflowRepository for MockWorkflowRepository {
        async fn get(&self, id: &WorkflowId) -> Result<Option<Workflow>, DomainError> {
            self.check_error()?;
            Ok(self.workflows.lock().unwrap().get(id.as_str()).cloned())
        }

        async fn list(&self) -> Result<Vec<Workflow>, DomainError> {
            self.check_error()?;
            Ok(self.workflows.lock().unwrap().values().cloned().collect())
        }

        async fn create(&self, workflow: Workflow) -> Result<Workflow, DomainError> {
            self.check_error()?;
            self.workflows
                .lock()
                .unwrap()
                .insert(workflow.id().as_str().to_string(), workflow.clone());
            Ok(workflow)
        }

        async fn update(&self, workflow: Workflow) -> Result<Workflow, DomainError> {
            self.create(workflow).await
        }

        async fn delete(&self, id: &WorkflowId) -> Result<bool, DomainError> {
            self.check_error()?;
            Ok(self.workflows.lock().unwrap().remove(id.as_str()).is_some())
        }
    }
}
