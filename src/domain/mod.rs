//! Domain layer - Core business logic and entities

pub mod criteria;
pub mod error;
pub mod llm;
pub mod model;
pub mod run;
pub mod workflow;

pub use criteria::{evaluate, CriteriaOutcome, Criterion};
pub use error::DomainError;
pub use llm::{Completion, GatewayError, ModelGateway, Usage};
pub use model::AllowedModel;
pub use run::{AttemptRecord, AttemptStatus, RunId, RunRepository, RunStatus, WorkflowRun};
pub use workflow::{
    ContextMode, StepDefinition, Workflow, WorkflowError, WorkflowExecutor, WorkflowId,
    WorkflowRepository,
};
