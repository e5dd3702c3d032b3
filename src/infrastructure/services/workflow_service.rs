//! Workflow service - CRUD operations for workflow definitions

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::domain::run::RunRepository;
use crate::domain::{DomainError, StepDefinition, Workflow, WorkflowId, WorkflowRepository};

/// Request to create a new workflow
#[derive(Debug, Clone)]
pub struct CreateWorkflowRequest {
    pub name: String,
    pub steps: Vec<StepDefinition>,
}

impl CreateWorkflowRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn with_steps(mut self, steps: Vec<StepDefinition>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }
}

/// Full replacement of a workflow's name and steps
#[derive(Debug, Clone)]
pub struct UpdateWorkflowRequest {
    pub name: String,
    pub steps: Vec<StepDefinition>,
}

impl UpdateWorkflowRequest {
    pub fn new(name: impl Into<String>, steps: Vec<StepDefinition>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }
}

/// Lightweight listing entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowSummary {
    pub id: WorkflowId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub step_count: usize,
}

impl From<&Workflow> for WorkflowSummary {
    fn from(workflow: &Workflow) -> Self {
        Self {
            id: workflow.id().clone(),
            name: workflow.name().to_string(),
            created_at: workflow.created_at(),
            step_count: workflow.step_count(),
        }
    }
}

/// Workflow service for CRUD operations
pub struct WorkflowService {
    workflows: Arc<dyn WorkflowRepository>,
    runs: Arc<dyn RunRepository>,
}

impl std::fmt::Debug for WorkflowService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowService").finish()
    }
}

impl WorkflowService {
    /// Create a new workflow service
    pub fn new(workflows: Arc<dyn WorkflowRepository>, runs: Arc<dyn RunRepository>) -> Self {
        Self { workflows, runs }
    }

    /// Get a workflow by ID
    pub async fn get(&self, id: &str) -> Result<Workflow, DomainError> {
        let workflow_id = parse_workflow_id(id)?;

        self.workflows
            .get(&workflow_id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// List workflow summaries, newest first
    pub async fn list(&self) -> Result<Vec<WorkflowSummary>, DomainError> {
        let mut workflows = self.workflows.list().await?;
        workflows.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

        Ok(workflows.iter().map(WorkflowSummary::from).collect())
    }

    /// Create a new workflow
    pub async fn create(&self, request: CreateWorkflowRequest) -> Result<Workflow, DomainError> {
        let workflow = Workflow::new(WorkflowId::generate(), request.name).with_steps(request.steps);
        workflow.validate()?;

        let workflow = self.workflows.create(workflow).await?;

        info!(
            workflow_id = %workflow.id(),
            step_count = workflow.step_count(),
            "Created workflow"
        );

        Ok(workflow)
    }

    /// Replace the name and the whole step list of a workflow
    ///
    /// Existing runs keep their attempt history; attempts reference steps
    /// by order only.
    pub async fn update(
        &self,
        id: &str,
        request: UpdateWorkflowRequest,
    ) -> Result<Workflow, DomainError> {
        let mut workflow = self.get(id).await?;

        workflow.set_name(request.name);
        workflow.set_steps(request.steps);
        workflow.validate()?;

        let workflow = self.workflows.update(workflow).await?;

        info!(workflow_id = %workflow.id(), "Updated workflow");
        Ok(workflow)
    }

    /// Delete a workflow together with all of its runs
    pub async fn delete(&self, id: &str) -> Result<(), DomainError> {
        let workflow_id = parse_workflow_id(id)?;

        if !self.workflows.delete(&workflow_id).await? {
            return Err(not_found(id));
        }

        let removed_runs = self.runs.delete_by_workflow(&workflow_id).await?;

        info!(workflow_id = %workflow_id, removed_runs, "Deleted workflow");
        Ok(())
    }
}

/// Parse and validate a workflow ID
pub(crate) fn parse_workflow_id(id: &str) -> Result<WorkflowId, DomainError> {
    WorkflowId::new(id).map_err(|e| DomainError::invalid_id(e.to_string()))
}

fn not_found(id: &str) -> DomainError {
    DomainError::not_found(format!("Workflow '{}' not found", id))
}
