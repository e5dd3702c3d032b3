//! Application state for shared services

use std::sync::Arc;

use crate::domain::ModelGateway;
use crate::infrastructure::services::{RunService, WorkflowService};

/// Shared handles passed to every handler
#[derive(Clone)]
pub struct AppState {
    pub workflow_service: Arc<WorkflowService>,
    pub run_service: Arc<RunService>,
    pub gateway: Arc<dyn ModelGateway>,
}

impl AppState {
    pub fn new(
        workflow_service: Arc<WorkflowService>,
        run_service: Arc<RunService>,
        gateway: Arc<dyn ModelGateway>,
    ) -> Self {
        Self {
            workflow_service,
            run_service,
            gateway,
        }
    }
}
