//! Run domain module
//!
//! A run is one execution of a workflow. Its attempts form an append-only
//! audit trail of every model invocation made while executing it.

mod entity;
mod repository;

pub use entity::{
    AttemptRecord, AttemptStatus, RunId, RunStatus, WorkflowRun, INTERNAL_ERROR_STEP_ORDER,
    SYSTEM_PROMPT_MARKER,
};
#[cfg(test)]
pub use repository::MockRunRepository;
pub use repository::RunRepository;
