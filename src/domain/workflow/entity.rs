//! Workflow domain entity

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::WorkflowError;
use super::step::{StepDefinition, MAX_RETRIES_LIMIT};

/// Maximum length for workflow IDs
pub const MAX_ID_LENGTH: usize = 50;

/// Maximum length for workflow names
pub const MAX_NAME_LENGTH: usize = 200;

/// Regex pattern for valid workflow IDs: alphanumeric and hyphens
static ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9]$|^[a-zA-Z0-9]$").unwrap());

/// Validated workflow identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkflowId(String);

impl WorkflowId {
    /// Create a new validated workflow ID
    pub fn new(id: impl Into<String>) -> Result<Self, WorkflowError> {
        let id = id.into();
        validate_workflow_id(&id)?;
        Ok(Self(id))
    }

    /// Generate a fresh `wf-{uuid}` identifier
    pub fn generate() -> Self {
        Self(format!("wf-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for WorkflowId {
    type Error = WorkflowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WorkflowId> for String {
    fn from(id: WorkflowId) -> Self {
        id.0
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for WorkflowId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validate a workflow ID string
pub fn validate_workflow_id(id: &str) -> Result<(), WorkflowError> {
    if id.is_empty() {
        return Err(WorkflowError::validation("Workflow ID cannot be empty"));
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(WorkflowError::validation(format!(
            "Workflow ID exceeds maximum length of {} characters",
            MAX_ID_LENGTH
        )));
    }

    if !ID_PATTERN.is_match(id) {
        return Err(WorkflowError::validation(format!(
            "Invalid workflow ID '{}': must be alphanumeric with hyphens",
            id
        )));
    }

    Ok(())
}

/// Validate a workflow name
pub fn validate_workflow_name(name: &str) -> Result<(), WorkflowError> {
    if name.trim().is_empty() {
        return Err(WorkflowError::validation("Workflow name cannot be empty"));
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(WorkflowError::validation(format!(
            "Workflow name exceeds maximum length of {} characters",
            MAX_NAME_LENGTH
        )));
    }

    Ok(())
}

/// Validate a step list as a whole
///
/// Orders must be positive and unique, prompts non-empty, retries bounded and
/// criteria of a known kind.
pub fn validate_steps(steps: &[StepDefinition]) -> Result<(), WorkflowError> {
    let mut seen = HashSet::with_capacity(steps.len());

    for step in steps {
        if step.order() == 0 {
            return Err(WorkflowError::validation("step_order must be >= 1"));
        }

        if !seen.insert(step.order()) {
            return Err(WorkflowError::duplicate_step_order(step.order()));
        }

        if step.prompt_template().trim().is_empty() {
            return Err(WorkflowError::validation(format!(
                "Step {} has an empty prompt",
                step.order()
            )));
        }

        if step.max_retries() > MAX_RETRIES_LIMIT {
            return Err(WorkflowError::validation(format!(
                "Step {}: max_retries must be <= {}",
                step.order(),
                MAX_RETRIES_LIMIT
            )));
        }

        if let Some(criterion) = step.criterion() {
            if !criterion.is_known() {
                return Err(WorkflowError::validation(format!(
                    "Step {}: unsupported criteria kind '{}'. Choose from: contains, json_valid, regex",
                    step.order(),
                    criterion.kind()
                )));
            }
        }
    }

    Ok(())
}

/// A workflow definition: a name plus steps kept sorted by order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    id: WorkflowId,
    name: String,
    steps: Vec<StepDefinition>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Create a new workflow without steps
    pub fn new(id: WorkflowId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            steps: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    // Builder methods

    pub fn with_steps(mut self, steps: Vec<StepDefinition>) -> Self {
        self.steps = steps;
        self.sort_steps();
        self
    }

    pub fn with_step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self.sort_steps();
        self
    }

    // Getters

    pub fn id(&self) -> &WorkflowId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Steps in ascending order
    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Check name and steps together
    pub fn validate(&self) -> Result<(), WorkflowError> {
        validate_workflow_name(&self.name)?;
        validate_steps(&self.steps)
    }

    // Setters (mutate and update timestamp)

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    /// Replace the whole step list
    pub fn set_steps(&mut self, steps: Vec<StepDefinition>) {
        self.steps = steps;
        self.sort_steps();
        self.touch();
    }

    fn sort_steps(&mut self) {
        self.steps.sort_by_key(|s| s.order());
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::criteria::Criterion;
    use crate::domain::model::AllowedModel;

    fn step(order: u32) -> StepDefinition {
        StepDefinition::new(order, AllowedModel::KimiK2p5, format!("task {}", order))
    }

    #[test]
    fn test_workflow_id_valid() {
        assert!(WorkflowId::new("my-workflow").is_ok());
        assert!(WorkflowId::new("a").is_ok());
        assert!(WorkflowId::new(WorkflowId::generate().as_str()).is_ok());
    }

    #[test]
    fn test_workflow_id_invalid() {
        assert!(WorkflowId::new("").is_err());
        assert!(WorkflowId::new("-invalid").is_err());
        assert!(WorkflowId::new("has spaces").is_err());
        assert!(WorkflowId::new("a".repeat(51)).is_err());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = WorkflowId::generate();
        let b = WorkflowId::generate();

        assert_ne!(a, b);
        assert!(a.as_str().starts_with("wf-"));
    }

    #[test]
    fn test_steps_are_kept_sorted() {
        let workflow = Workflow::new(WorkflowId::generate(), "Sorted")
            .with_steps(vec![step(3), step(1)])
            .with_step(step(2));

        let orders: Vec<u32> = workflow.steps().iter().map(|s| s.order()).collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }

    #[test]
    fn test_validate_rejects_duplicate_orders() {
        let result = validate_steps(&[step(1), step(2), step(1)]);
        assert_eq!(result, Err(WorkflowError::duplicate_step_order(1)));
    }

    #[test]
    fn test_validate_rejects_zero_order_and_empty_prompt() {
        assert!(validate_steps(&[step(0)]).is_err());

        let blank = StepDefinition::new(1, AllowedModel::KimiK2p5, "   ");
        assert!(validate_steps(&[blank]).is_err());
    }

    #[test]
    fn test_validate_rejects_excess_retries() {
        assert!(validate_steps(&[step(1).with_max_retries(MAX_RETRIES_LIMIT)]).is_ok());
        assert!(validate_steps(&[step(1).with_max_retries(MAX_RETRIES_LIMIT + 1)]).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_criterion() {
        let unknown = step(1).with_criterion(Criterion::Unknown {
            kind: "vibes".to_string(),
        });

        let err = validate_steps(&[unknown]).unwrap_err();
        assert!(err.to_string().contains("unsupported criteria kind 'vibes'"));
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_workflow_name("Demo").is_ok());
        assert!(validate_workflow_name("  ").is_err());
        assert!(validate_workflow_name(&"n".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_empty_workflow_is_valid_definition() {
        let workflow = Workflow::new(WorkflowId::generate(), "Empty");
        assert!(workflow.validate().is_ok());
        assert!(workflow.is_empty());
    }

    #[test]
    fn test_set_steps_updates_timestamp() {
        let mut workflow = Workflow::new(WorkflowId::generate(), "Mutable");
        let original = workflow.updated_at();

        std::thread::sleep(std::time::Duration::from_millis(10));
        workflow.set_steps(vec![step(2), step(1)]);

        assert!(workflow.updated_at() > original);
        assert_eq!(workflow.steps()[0].order(), 1);
    }

    #[test]
    fn test_workflow_serialization() {
        let workflow = Workflow::new(WorkflowId::new("serializable").unwrap(), "Serializable")
            .with_step(step(1).with_criterion(Criterion::JsonValid));

        let json = serde_json::to_string(&workflow).unwrap();
        assert!(json.contains("\"id\":\"serializable\""));
        assert!(json.contains("\"kind\":\"json_valid\""));

        let deserialized: Workflow = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.step_count(), 1);
    }
}
