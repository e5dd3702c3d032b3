//! Agentic Workflow API
//!
//! Runs ordered chains of LLM steps with:
//! - Pass/fail criteria per step (substring, regex, JSON validity)
//! - Bounded retries with a per-model network buffer
//! - Context forwarding between steps (full output or first code block)
//! - A persisted audit trail of every attempt

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::state::AppState;
use config::GatewaySettings;
use domain::criteria::Criterion;
use domain::{AllowedModel, ContextMode, ModelGateway, StepDefinition, Workflow};
use infrastructure::{
    llm::{ChatCompletionsGateway, HttpClient},
    run::InMemoryRunRepository,
    services::{CreateWorkflowRequest, RunService, WorkflowService},
    workflow::{InMemoryWorkflowRepository, WorkflowExecutorImpl},
};
use tracing::{info, warn};

/// Name of the workflow seeded by `serve --seed-demo`
pub const DEMO_WORKFLOW_NAME: &str = "Demo Workflow (Criteria + Retries)";

/// Create the application state with default configuration
pub async fn create_app_state() -> anyhow::Result<AppState> {
    create_app_state_with_config(&AppConfig::default()).await
}

/// Create the application state with custom configuration
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let gateway = create_gateway(&config.gateway)?;

    let workflows = Arc::new(InMemoryWorkflowRepository::new());
    let runs = Arc::new(InMemoryRunRepository::new());

    let executor = Arc::new(WorkflowExecutorImpl::with_config(
        workflows.clone(),
        runs.clone(),
        gateway.clone(),
        config.engine.to_executor_config(),
    ));

    let workflow_service = Arc::new(WorkflowService::new(workflows.clone(), runs.clone()));
    let run_service = Arc::new(RunService::new(workflows, runs, executor));

    info!(
        step_backoff_ms = config.engine.step_backoff_ms,
        gateway_configured = gateway.is_configured(),
        "Application state initialized"
    );

    Ok(AppState::new(workflow_service, run_service, gateway))
}

/// Build the reqwest-backed model gateway from settings
///
/// Missing endpoint or key only produces a warning; each call then fails
/// with a configuration error.
pub fn create_gateway(settings: &GatewaySettings) -> anyhow::Result<Arc<dyn ModelGateway>> {
    let client = HttpClient::new(settings.connect_timeout())?;
    let gateway_config = settings.to_gateway_config();

    let missing = gateway_config.missing_settings();
    if !missing.is_empty() {
        warn!(
            missing = %missing.join(", "),
            "Model gateway is not configured; model calls will fail until APP__GATEWAY__CHAT_URL and APP__GATEWAY__API_KEY are set"
        );
    }

    Ok(Arc::new(ChatCompletionsGateway::new(client, gateway_config)))
}

/// Store the demo workflow and return it
pub async fn seed_demo_workflow(state: &AppState) -> anyhow::Result<Workflow> {
    let workflow = state.workflow_service.create(demo_workflow_request()).await?;

    info!(workflow_id = %workflow.id(), "Seeded demo workflow");
    Ok(workflow)
}

/// Three-step demo: write a function, test it, list its requirements
pub fn demo_workflow_request() -> CreateWorkflowRequest {
    let python_block = Criterion::regex_with_flags(r"```python[\s\S]*```", "s");

    CreateWorkflowRequest::new(DEMO_WORKFLOW_NAME)
        .with_step(
            StepDefinition::new(
                1,
                AllowedModel::KimiK2p5,
                "Write Python code that defines a function add(a, b) which returns a + b.\n\
                 Return ONLY a single Python code block. No explanations.",
            )
            .with_name("Write add() function")
            .with_criterion(python_block.clone())
            .with_max_retries(1)
            .with_context_mode(ContextMode::CodeOnly)
            .with_max_tokens(250),
        )
        .with_step(
            StepDefinition::new(
                2,
                AllowedModel::KimiK2p5,
                "Using the CONTEXT code above, write EXACTLY 3 pytest test cases for add(a, b).\n\
                 Rules:\n\
                 1) Return ONLY a single Python code block.\n\
                 2) Do NOT include explanations, analysis, or any text outside the code block.\n\
                 3) Assume add() is already available. Do NOT write placeholder imports.\n",
            )
            .with_name("Write pytest tests")
            .with_criterion(python_block)
            .with_max_retries(3)
            .with_context_mode(ContextMode::CodeOnly)
            .with_max_tokens(900),
        )
        .with_step(
            StepDefinition::new(
                3,
                AllowedModel::KimiK2Instruct0905,
                "From the CONTEXT above, output requirements.txt lines ONLY.\n\
                 Rules:\n\
                 1) Output ONLY package names (one per line).\n\
                 2) Do NOT use code fences.\n\
                 3) Do NOT add explanations.\n\
                 If pytest tests exist, include pytest.\n",
            )
            .with_name("Generate requirements.txt")
            .with_criterion(Criterion::contains("pytest"))
            .with_max_retries(2)
            .with_context_mode(ContextMode::Full)
            .with_max_tokens(80),
        )
}
