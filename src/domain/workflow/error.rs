//! Workflow error types

use thiserror::Error;

use crate::domain::DomainError;

/// Errors raised while validating or resolving workflow definitions
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkflowError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicate step_order values ({0}). Each step must have a unique step_order.")]
    DuplicateStepOrder(u32),

    #[error("Workflow has no steps to run: {0}")]
    EmptyWorkflow(String),
}

impl WorkflowError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn duplicate_step_order(order: u32) -> Self {
        Self::DuplicateStepOrder(order)
    }

    pub fn empty_workflow(id: impl Into<String>) -> Self {
        Self::EmptyWorkflow(id.into())
    }
}

impl From<WorkflowError> for DomainError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::NotFound(_) => DomainError::not_found(err.to_string()),
            WorkflowError::Validation(message) => DomainError::validation(message),
            WorkflowError::DuplicateStepOrder(_) | WorkflowError::EmptyWorkflow(_) => {
                DomainError::validation(err.to_string())
            }
        }
    }
}
