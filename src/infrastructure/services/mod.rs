//! Infrastructure services

mod run_service;
mod workflow_service;

pub use run_service::{RunService, RunSummary, StartedRun};
pub use workflow_service::{
    CreateWorkflowRequest, UpdateWorkflowRequest, WorkflowService, WorkflowSummary,
};
