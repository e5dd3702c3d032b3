//! Step definitions

use serde::{Deserialize, Serialize};

use crate::domain::criteria::Criterion;
use crate::domain::model::AllowedModel;

/// Upper bound for user-configured retries on a single step
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Retries used when a step does not specify any
pub const DEFAULT_MAX_RETRIES: u32 = 2;

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

/// How a passing step's output is turned into context for the next step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    /// Forward the whole output
    #[default]
    Full,

    /// Forward only the first fenced code block
    CodeOnly,
}

/// One ordered unit of work in a workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Execution position, ascending, unique within a workflow
    order: u32,

    /// Optional display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    /// Model to call
    model: AllowedModel,

    /// Task description sent to the model
    prompt_template: String,

    /// Pass/fail rule for the output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    criterion: Option<Criterion>,

    /// Retries on top of the first attempt
    #[serde(default = "default_max_retries")]
    max_retries: u32,

    /// Context forwarded to the next step
    #[serde(default)]
    context_mode: ContextMode,

    /// Output length cap; falls back to the model default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl StepDefinition {
    /// Create a new step with default retries, full context and no criterion
    pub fn new(order: u32, model: AllowedModel, prompt_template: impl Into<String>) -> Self {
        Self {
            order,
            name: None,
            model,
            prompt_template: prompt_template.into(),
            criterion: None,
            max_retries: DEFAULT_MAX_RETRIES,
            context_mode: ContextMode::default(),
            max_tokens: None,
        }
    }

    // Builder methods

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = Some(criterion);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_context_mode(mut self, context_mode: ContextMode) -> Self {
        self.context_mode = context_mode;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    // Getters

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn model(&self) -> AllowedModel {
        self.model
    }

    pub fn prompt_template(&self) -> &str {
        &self.prompt_template
    }

    pub fn criterion(&self) -> Option<&Criterion> {
        self.criterion.as_ref()
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn context_mode(&self) -> ContextMode {
        self.context_mode
    }

    /// Effective token cap for this step
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
            .unwrap_or_else(|| self.model.default_max_tokens())
    }

    /// Explicit token cap, if one was configured
    pub fn max_tokens_hint(&self) -> Option<u32> {
        self.max_tokens
    }
}
