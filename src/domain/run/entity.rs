//! Run and attempt records

use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::criteria::CriteriaOutcome;
use crate::domain::llm::Usage;
use crate::domain::model::AllowedModel;
use crate::domain::workflow::WorkflowId;
use crate::domain::DomainError;

/// Step order used for the synthetic record written on internal failures.
/// Sorts after every real step.
pub const INTERNAL_ERROR_STEP_ORDER: u32 = 999_999;

/// Prompt recorded on the synthetic internal-error attempt
pub const SYSTEM_PROMPT_MARKER: &str = "(system)";

/// Regex pattern for valid run IDs: run-{uuid}
static ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^run-[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}$").unwrap()
});

/// Validated run identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

impl RunId {
    /// Parse and validate a run ID
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();

        if !ID_PATTERN.is_match(&id) {
            return Err(DomainError::invalid_id(format!(
                "Invalid run ID '{}': must be in format run-{{uuid}}",
                id
            )));
        }

        Ok(Self(id))
    }

    /// Generate a new run ID with UUID
    pub fn generate() -> Self {
        Self(format!("run-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RunId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RunId> for String {
    fn from(id: RunId) -> Self {
        id.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    #[default]
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_transition_to(&self, target: RunStatus) -> bool {
        matches!(
            (self, target),
            (Self::Running, Self::Completed) | (Self::Running, Self::Failed)
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Outcome of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    /// Model answered and the criterion passed
    Passed,

    /// Model answered but the criterion failed
    Failed,

    /// The gateway call itself failed, or the engine hit an internal error
    Error,
}

/// One audit entry: a single model invocation for a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub step_order: u32,
    /// 1-based, monotonic per step
    pub attempt_number: u32,
    pub status: AttemptStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<AllowedModel>,
    pub prompt: String,
    pub output: Option<String>,
    pub criteria_reason: Option<String>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    pub recorded_at: DateTime<Utc>,
}

impl AttemptRecord {
    /// Attempt where the model answered and the output was evaluated
    pub fn evaluated(
        step_order: u32,
        attempt_number: u32,
        model: AllowedModel,
        prompt: impl Into<String>,
        output: impl Into<String>,
        outcome: CriteriaOutcome,
        usage: Usage,
    ) -> Self {
        Self {
            step_order,
            attempt_number,
            status: if outcome.passed {
                AttemptStatus::Passed
            } else {
                AttemptStatus::Failed
            },
            model: Some(model),
            prompt: prompt.into(),
            output: Some(output.into()),
            criteria_reason: Some(outcome.reason),
            error: None,
            usage: Some(usage),
            recorded_at: Utc::now(),
        }
    }

    /// Attempt where the gateway call failed
    pub fn gateway_error(
        step_order: u32,
        attempt_number: u32,
        model: AllowedModel,
        prompt: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            step_order,
            attempt_number,
            status: AttemptStatus::Error,
            model: Some(model),
            prompt: prompt.into(),
            output: None,
            criteria_reason: None,
            error: Some(error.into()),
            usage: None,
            recorded_at: Utc::now(),
        }
    }

    /// Synthetic entry describing an internal engine failure
    pub fn internal_error(error: impl Into<String>) -> Self {
        Self {
            step_order: INTERNAL_ERROR_STEP_ORDER,
            attempt_number: 1,
            status: AttemptStatus::Error,
            model: None,
            prompt: SYSTEM_PROMPT_MARKER.to_string(),
            output: None,
            criteria_reason: None,
            error: Some(error.into()),
            usage: None,
            recorded_at: Utc::now(),
        }
    }
}

/// One execution instance of a workflow, owning its attempt trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    id: RunId,
    workflow_id: WorkflowId,
    status: RunStatus,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    attempts: Vec<AttemptRecord>,
}

impl WorkflowRun {
    /// Start a new run in `Running`
    pub fn start(workflow_id: WorkflowId) -> Self {
        Self {
            id: RunId::generate(),
            workflow_id,
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            attempts: Vec::new(),
        }
    }

    pub fn id(&self) -> &RunId {
        &self.id
    }

    pub fn workflow_id(&self) -> &WorkflowId {
        &self.workflow_id
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Attempts in execution order: (step_order, attempt_number) ascending
    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    /// Append an attempt; rejected once the run is terminal
    pub fn append_attempt(&mut self, record: AttemptRecord) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "Run '{}' is {} and no longer accepts attempts",
                self.id, self.status
            )));
        }

        let position = self.attempts.partition_point(|existing| {
            (existing.step_order, existing.attempt_number)
                <= (record.step_order, record.attempt_number)
        });
        self.attempts.insert(position, record);
        Ok(())
    }

    /// Move to a terminal status
    ///
    /// Repeating the same terminal write is a no-op; changing a terminal
    /// status is a conflict.
    pub fn finish(&mut self, status: RunStatus, ended_at: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status == status && status.is_terminal() {
            return Ok(());
        }

        if !self.status.can_transition_to(status) {
            return Err(DomainError::conflict(format!(
                "Run '{}' cannot transition from {} to {}",
                self.id, self.status, status
            )));
        }

        self.status = status;
        self.ended_at = Some(ended_at);
        Ok(())
    }
}
