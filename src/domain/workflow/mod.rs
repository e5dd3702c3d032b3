//! Workflow domain module
//!
//! A workflow is an ordered list of steps. Each step sends a prompt to a
//! model, checks the output against a criterion and, once it passes,
//! forwards a context derived from that output to the next step.

mod context;
mod entity;
mod error;
mod executor;
pub mod repository;
mod step;

pub use context::{build_prompt, derive_context, extract_first_code_block, CODE_FENCE_LANGUAGE};
pub use entity::{
    validate_steps, validate_workflow_id, validate_workflow_name, Workflow, WorkflowId,
    MAX_ID_LENGTH, MAX_NAME_LENGTH,
};
pub use error::WorkflowError;
pub use executor::WorkflowExecutor;
pub use repository::WorkflowRepository;
pub use step::{ContextMode, StepDefinition, DEFAULT_MAX_RETRIES, MAX_RETRIES_LIMIT};
