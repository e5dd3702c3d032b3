//! Workflow executor implementation
//!
//! Steps run strictly in order. Each step gets
//! `max_retries + network_buffer + 1` attempts. A criteria failure retries
//! immediately, a gateway error retries after a linear backoff, and a step
//! that runs out of attempts fails the run and halts it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::domain::criteria::evaluate;
use crate::domain::run::{AttemptRecord, RunId, RunRepository, RunStatus};
use crate::domain::workflow::{build_prompt, derive_context};
use crate::domain::{
    AllowedModel, DomainError, ModelGateway, StepDefinition, WorkflowExecutor, WorkflowId,
    WorkflowRepository,
};

/// Extra attempts per model on top of the user's retries, absorbing
/// transient network trouble
#[derive(Debug, Clone)]
pub struct NetworkBufferPolicy {
    default_buffer: u32,
    overrides: HashMap<AllowedModel, u32>,
}

impl Default for NetworkBufferPolicy {
    fn default() -> Self {
        Self::uniform(1).with_override(AllowedModel::KimiK2Instruct0905, 2)
    }
}

impl NetworkBufferPolicy {
    /// Same buffer for every model
    pub fn uniform(buffer: u32) -> Self {
        Self {
            default_buffer: buffer,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, model: AllowedModel, buffer: u32) -> Self {
        self.overrides.insert(model, buffer);
        self
    }

    pub fn buffer_for(&self, model: AllowedModel) -> u32 {
        self.overrides
            .get(&model)
            .copied()
            .unwrap_or(self.default_buffer)
    }

    /// Attempts allotted to a step
    pub fn total_attempts(&self, step: &StepDefinition) -> u32 {
        step.max_retries() + self.buffer_for(step.model()) + 1
    }
}

/// Configuration for the workflow executor
#[derive(Debug, Clone)]
pub struct WorkflowExecutorConfig {
    /// Base delay after a gateway error; multiplied by the attempt number
    pub step_backoff: Duration,

    pub network_buffer: NetworkBufferPolicy,
}

impl Default for WorkflowExecutorConfig {
    fn default() -> Self {
        Self {
            step_backoff: Duration::from_millis(800),
            network_buffer: NetworkBufferPolicy::default(),
        }
    }
}

impl WorkflowExecutorConfig {
    /// No delay between attempts
    pub fn immediate() -> Self {
        Self {
            step_backoff: Duration::ZERO,
            ..Default::default()
        }
    }

    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        self.step_backoff * attempt
    }
}

/// How one step ended
enum StepOutcome {
    Passed { output: String },
    Exhausted,
    Fatal,
}

/// Workflow executor implementation
pub struct WorkflowExecutorImpl {
    workflows: Arc<dyn WorkflowRepository>,
    runs: Arc<dyn RunRepository>,
    gateway: Arc<dyn ModelGateway>,
    config: WorkflowExecutorConfig,
}

impl fmt::Debug for WorkflowExecutorImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowExecutorImpl")
            .field("gateway", &self.gateway)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl WorkflowExecutorImpl {
    /// Create a new executor
    pub fn new(
        workflows: Arc<dyn WorkflowRepository>,
        runs: Arc<dyn RunRepository>,
        gateway: Arc<dyn ModelGateway>,
    ) -> Self {
        Self::with_config(workflows, runs, gateway, WorkflowExecutorConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(
        workflows: Arc<dyn WorkflowRepository>,
        runs: Arc<dyn RunRepository>,
        gateway: Arc<dyn ModelGateway>,
        config: WorkflowExecutorConfig,
    ) -> Self {
        Self {
            workflows,
            runs,
            gateway,
            config,
        }
    }

    async fn drive(&self, run_id: &RunId, workflow_id: &WorkflowId) -> Result<RunStatus, DomainError> {
        let steps = self.workflows.ordered_steps(workflow_id).await?;

        if steps.is_empty() {
            warn!(run_id = %run_id, workflow_id = %workflow_id, "Workflow has no steps");
            return self.finish(run_id, RunStatus::Failed).await;
        }

        let mut context = String::new();

        for step in &steps {
            match self.run_step(run_id, step, &context).await? {
                StepOutcome::Passed { output } => {
                    context = derive_context(&output, step.context_mode());
                }
                StepOutcome::Exhausted | StepOutcome::Fatal => {
                    return self.finish(run_id, RunStatus::Failed).await;
                }
            }
        }

        self.finish(run_id, RunStatus::Completed).await
    }

    async fn run_step(
        &self,
        run_id: &RunId,
        step: &StepDefinition,
        context: &str,
    ) -> Result<StepOutcome, DomainError> {
        let prompt = build_prompt(step.prompt_template(), context);
        let model = step.model();
        let total_attempts = self.config.network_buffer.total_attempts(step);

        debug!(
            run_id = %run_id,
            step_order = step.order(),
            model = %model,
            total_attempts,
            "Starting step"
        );

        for attempt in 1..=total_attempts {
            match self.gateway.invoke(model, &prompt, step.max_tokens()).await {
                Ok(completion) => {
                    let outcome = evaluate(&completion.text, step.criterion());
                    let passed = outcome.passed;

                    debug!(
                        run_id = %run_id,
                        step_order = step.order(),
                        attempt,
                        passed,
                        reason = %outcome.reason,
                        "Attempt evaluated"
                    );

                    let record = AttemptRecord::evaluated(
                        step.order(),
                        attempt,
                        model,
                        prompt.as_str(),
                        completion.text.as_str(),
                        outcome,
                        completion.usage,
                    );
                    self.runs.append_attempt(run_id, record).await?;

                    if passed {
                        return Ok(StepOutcome::Passed {
                            output: completion.text,
                        });
                    }
                }
                Err(gateway_error) => {
                    warn!(
                        run_id = %run_id,
                        step_order = step.order(),
                        attempt,
                        model = %model,
                        error = %gateway_error,
                        "Gateway call failed"
                    );

                    let record = AttemptRecord::gateway_error(
                        step.order(),
                        attempt,
                        model,
                        prompt.as_str(),
                        gateway_error.to_string(),
                    );
                    self.runs.append_attempt(run_id, record).await?;

                    if gateway_error.is_fatal() {
                        error!(run_id = %run_id, error = %gateway_error, "Gateway misconfigured, failing run");
                        return Ok(StepOutcome::Fatal);
                    }

                    if attempt < total_attempts {
                        tokio::time::sleep(self.config.backoff_for_attempt(attempt)).await;
                    }
                }
            }
        }

        warn!(
            run_id = %run_id,
            step_order = step.order(),
            total_attempts,
            "Step exhausted its attempts"
        );

        Ok(StepOutcome::Exhausted)
    }

    async fn finish(&self, run_id: &RunId, status: RunStatus) -> Result<RunStatus, DomainError> {
        self.runs.update_status(run_id, status, Utc::now()).await?;
        Ok(status)
    }

    /// Best effort: the store itself may be what failed
    async fn record_internal_failure(&self, run_id: &RunId, failure: &DomainError) {
        let record = AttemptRecord::internal_error(failure.to_string());

        if let Err(e) = self.runs.append_attempt(run_id, record).await {
            error!(run_id = %run_id, error = %e, "Could not record internal failure");
        }

        if let Err(e) = self
            .runs
            .update_status(run_id, RunStatus::Failed, Utc::now())
            .await
        {
            error!(run_id = %run_id, error = %e, "Could not mark run as failed");
        }
    }
}

#[async_trait]
impl WorkflowExecutor for WorkflowExecutorImpl {
    async fn execute(&self, run_id: &RunId, workflow_id: &WorkflowId) -> RunStatus {
        info!(run_id = %run_id, workflow_id = %workflow_id, "Run started");

        let status = match self.drive(run_id, workflow_id).await {
            Ok(status) => status,
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Run aborted by internal error");
                self.record_internal_failure(run_id, &e).await;
                RunStatus::Failed
            }
        };

        info!(run_id = %run_id, status = %status, "Run finished");
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::criteria::Criterion;
    use crate::domain::llm::{GatewayError, MockModelGateway};
    use crate::domain::run::{AttemptStatus, MockRunRepository, WorkflowRun, INTERNAL_ERROR_STEP_ORDER};
    use crate::domain::workflow::repository::mock::MockWorkflowRepository;
    use crate::domain::workflow::ContextMode;
    use crate::domain::Workflow;
    use crate::infrastructure::run::InMemoryRunRepository;
    use crate::infrastructure::workflow::InMemoryWorkflowRepository;

    struct Harness {
        executor: WorkflowExecutorImpl,
        runs: Arc<InMemoryRunRepository>,
        gateway: Arc<MockModelGateway>,
        workflow_id: WorkflowId,
    }

    impl Harness {
        fn new(steps: Vec<StepDefinition>, gateway: MockModelGateway) -> Self {
            Self::with_config(steps, gateway, WorkflowExecutorConfig::immediate())
        }

        fn with_config(
            steps: Vec<StepDefinition>,
            gateway: MockModelGateway,
            config: WorkflowExecutorConfig,
        ) -> Self {
            let workflow = Workflow::new(WorkflowId::generate(), "test").with_steps(steps);
            let workflow_id = workflow.id().clone();

            let workflows = Arc::new(InMemoryWorkflowRepository::with_workflows(vec![workflow]));
            let runs = Arc::new(InMemoryRunRepository::new());
            let gateway = Arc::new(gateway);

            let executor = WorkflowExecutorImpl::with_config(
                workflows,
                runs.clone(),
                gateway.clone(),
                config,
            );

            Self {
                executor,
                runs,
                gateway,
                workflow_id,
            }
        }

        async fn run(&self) -> WorkflowRun {
            let run = self
                .runs
                .create(WorkflowRun::start(self.workflow_id.clone()))
                .await
                .unwrap();

            self.executor.execute(run.id(), &self.workflow_id).await;
            self.runs.get(run.id()).await.unwrap().unwrap()
        }
    }

    fn step(order: u32) -> StepDefinition {
        StepDefinition::new(order, AllowedModel::KimiK2p5, format!("task {}", order))
    }

    fn statuses(run: &WorkflowRun) -> Vec<AttemptStatus> {
        run.attempts().iter().map(|a| a.status).collect()
    }

    #[test]
    fn test_network_buffer_policy() {
        let policy = NetworkBufferPolicy::default();

        assert_eq!(policy.buffer_for(AllowedModel::KimiK2p5), 1);
        assert_eq!(policy.buffer_for(AllowedModel::KimiK2Instruct0905), 2);

        let step = StepDefinition::new(1, AllowedModel::KimiK2p5, "p").with_max_retries(2);
        assert_eq!(policy.total_attempts(&step), 4);

        let step = StepDefinition::new(1, AllowedModel::KimiK2Instruct0905, "p").with_max_retries(0);
        assert_eq!(policy.total_attempts(&step), 3);
    }

    #[test]
    fn test_linear_backoff() {
        let config = WorkflowExecutorConfig::default();
        assert_eq!(config.backoff_for_attempt(1), Duration::from_millis(800));
        assert_eq!(config.backoff_for_attempt(3), Duration::from_millis(2400));
        assert_eq!(WorkflowExecutorConfig::immediate().backoff_for_attempt(5), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_transient_errors_then_pass() {
        let gateway = MockModelGateway::new()
            .with_error(GatewayError::network("timed out"))
            .with_error(GatewayError::network("connection reset"))
            .with_error(GatewayError::from_status(503, "busy"))
            .with_reply("run pytest now");

        let harness = Harness::new(
            vec![step(1)
                .with_max_retries(2)
                .with_criterion(Criterion::contains("pytest"))],
            gateway,
        );

        let run = harness.run().await;

        assert_eq!(run.status(), RunStatus::Completed);
        assert!(run.ended_at().is_some());
        assert_eq!(
            statuses(&run),
            vec![
                AttemptStatus::Error,
                AttemptStatus::Error,
                AttemptStatus::Error,
                AttemptStatus::Passed
            ]
        );

        let attempt_numbers: Vec<u32> = run.attempts().iter().map(|a| a.attempt_number).collect();
        assert_eq!(attempt_numbers, vec![1, 2, 3, 4]);
        assert!(run.attempts()[0].output.is_none());
        assert!(run.attempts()[0].criteria_reason.is_none());
        assert_eq!(run.attempts()[3].criteria_reason.as_deref(), Some("contains: found 'pytest'"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gateway_errors_back_off_linearly() {
        let gateway = MockModelGateway::new()
            .with_reply("no")
            .with_error(GatewayError::network("timed out"))
            .with_error(GatewayError::from_status(503, "busy"))
            .with_reply("pytest");

        let harness = Harness::with_config(
            vec![step(1)
                .with_max_retries(2)
                .with_criterion(Criterion::contains("pytest"))],
            gateway,
            WorkflowExecutorConfig {
                step_backoff: Duration::from_millis(800),
                ..Default::default()
            },
        );

        let started = tokio::time::Instant::now();
        let run = harness.run().await;
        let elapsed = started.elapsed();

        assert_eq!(run.status(), RunStatus::Completed);
        assert_eq!(
            statuses(&run),
            vec![
                AttemptStatus::Failed,
                AttemptStatus::Error,
                AttemptStatus::Error,
                AttemptStatus::Passed
            ]
        );
        // no wait after the criteria miss, then 800ms * 2 and 800ms * 3
        assert!(elapsed >= Duration::from_millis(4000), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(4010), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_backoff_after_final_error() {
        let gateway = MockModelGateway::new().with_fallback(Err(GatewayError::network("down")));

        let harness = Harness::with_config(
            vec![step(1).with_max_retries(0)],
            gateway,
            WorkflowExecutorConfig {
                step_backoff: Duration::from_millis(800),
                ..Default::default()
            },
        );

        let started = tokio::time::Instant::now();
        let run = harness.run().await;
        let elapsed = started.elapsed();

        assert_eq!(run.status(), RunStatus::Failed);
        assert_eq!(statuses(&run), vec![AttemptStatus::Error, AttemptStatus::Error]);
        assert!(elapsed >= Duration::from_millis(800), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(810), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_step_exhaustion_halts_run() {
        let gateway = MockModelGateway::replying("run unittest");

        let harness = Harness::new(
            vec![
                step(1)
                    .with_max_retries(1)
                    .with_criterion(Criterion::contains("pytest")),
                step(2),
            ],
            gateway,
        );

        let run = harness.run().await;

        assert_eq!(run.status(), RunStatus::Failed);
        assert!(run.ended_at().is_some());
        // max_retries 1 + buffer 1 + 1
        assert_eq!(run.attempt_count(), 3);
        assert!(run.attempts().iter().all(|a| a.step_order == 1));
        assert!(run.attempts().iter().all(|a| a.status == AttemptStatus::Failed));
        assert_eq!(harness.gateway.call_count(), 3);
    }

    #[tokio::test]
    async fn test_criteria_failure_then_pass() {
        let gateway = MockModelGateway::new()
            .with_reply("{a:1}")
            .with_reply("{\"a\":1}");

        let harness = Harness::new(
            vec![step(1).with_criterion(Criterion::JsonValid)],
            gateway,
        );

        let run = harness.run().await;

        assert_eq!(run.status(), RunStatus::Completed);
        assert_eq!(statuses(&run), vec![AttemptStatus::Failed, AttemptStatus::Passed]);
    }

    #[tokio::test]
    async fn test_context_flows_between_steps() {
        let gateway = MockModelGateway::new()
            .with_reply("Here:\n```py\ndef add(a, b):\n    return a + b\n```")
            .with_reply("tests written");

        let harness = Harness::new(
            vec![
                step(1).with_context_mode(ContextMode::CodeOnly),
                StepDefinition::new(2, AllowedModel::KimiK2Instruct0905, "Write tests"),
            ],
            gateway,
        );

        let run = harness.run().await;
        assert_eq!(run.status(), RunStatus::Completed);

        let calls = harness.gateway.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].prompt, "task 1");
        assert_eq!(calls[0].max_tokens, 300);
        assert_eq!(
            calls[1].prompt,
            "### CONTEXT (output from previous step)\n```python\ndef add(a, b):\n    return a + b\n```\n\n### CURRENT TASK\nWrite tests"
        );
        assert_eq!(calls[1].model, AllowedModel::KimiK2Instruct0905);
        assert_eq!(calls[1].max_tokens, 160);
        assert_eq!(run.attempts()[1].prompt, calls[1].prompt);
    }

    #[tokio::test]
    async fn test_full_context_is_previous_output() {
        let gateway = MockModelGateway::new()
            .with_reply("pytest\nrequests")
            .with_reply("done");

        let harness = Harness::new(vec![step(1), step(2)], gateway);
        harness.run().await;

        let calls = harness.gateway.calls();
        assert!(calls[1].prompt.contains("pytest\nrequests"));
    }

    #[tokio::test]
    async fn test_steps_run_in_order() {
        let gateway = MockModelGateway::replying("ok");
        let harness = Harness::new(vec![step(30), step(10), step(20)], gateway);

        let run = harness.run().await;

        let orders: Vec<u32> = run.attempts().iter().map(|a| a.step_order).collect();
        assert_eq!(orders, vec![10, 20, 30]);
        assert_eq!(harness.gateway.calls()[0].prompt, "task 10");
    }

    #[tokio::test]
    async fn test_max_tokens_hint_passed_through() {
        let harness = Harness::new(
            vec![step(1).with_max_tokens(42)],
            MockModelGateway::replying("ok"),
        );

        harness.run().await;

        assert_eq!(harness.gateway.calls()[0].max_tokens, 42);
    }

    #[tokio::test]
    async fn test_configuration_error_fails_run_immediately() {
        let gateway = MockModelGateway::new()
            .with_fallback(Err(GatewayError::configuration("missing gateway setting(s): api_key")));

        let harness = Harness::new(vec![step(1).with_max_retries(5), step(2)], gateway);

        let run = harness.run().await;

        assert_eq!(run.status(), RunStatus::Failed);
        assert_eq!(statuses(&run), vec![AttemptStatus::Error]);
        assert!(run.attempts()[0]
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("api_key"));
        assert_eq!(harness.gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_gateway_errors_exhaust_step() {
        let gateway = MockModelGateway::new().with_fallback(Err(GatewayError::Exhausted {
            attempts: 3,
            message: "timed out".to_string(),
        }));

        let harness = Harness::new(vec![step(1).with_max_retries(0), step(2)], gateway);

        let run = harness.run().await;

        assert_eq!(run.status(), RunStatus::Failed);
        assert_eq!(statuses(&run), vec![AttemptStatus::Error, AttemptStatus::Error]);
    }

    #[tokio::test]
    async fn test_empty_workflow_fails() {
        let harness = Harness::new(vec![], MockModelGateway::replying("unused"));

        let run = harness.run().await;

        assert_eq!(run.status(), RunStatus::Failed);
        assert_eq!(run.attempt_count(), 0);
        assert_eq!(harness.gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_workflow_records_internal_error() {
        let harness = Harness::new(vec![step(1)], MockModelGateway::replying("ok"));
        let run = harness
            .runs
            .create(WorkflowRun::start(harness.workflow_id.clone()))
            .await
            .unwrap();

        let status = harness
            .executor
            .execute(run.id(), &WorkflowId::generate())
            .await;

        assert_eq!(status, RunStatus::Failed);

        let run = harness.runs.get(run.id()).await.unwrap().unwrap();
        assert_eq!(run.status(), RunStatus::Failed);
        assert_eq!(run.attempt_count(), 1);
        assert_eq!(run.attempts()[0].step_order, INTERNAL_ERROR_STEP_ORDER);
        assert_eq!(run.attempts()[0].prompt, "(system)");
    }

    #[tokio::test]
    async fn test_workflow_store_failure_records_internal_error() {
        let runs = Arc::new(InMemoryRunRepository::new());
        let executor = WorkflowExecutorImpl::with_config(
            Arc::new(MockWorkflowRepository::new().with_error("database unavailable")),
            runs.clone(),
            Arc::new(MockModelGateway::replying("ok")),
            WorkflowExecutorConfig::immediate(),
        );

        let workflow_id = WorkflowId::generate();
        let run = runs.create(WorkflowRun::start(workflow_id.clone())).await.unwrap();

        assert_eq!(executor.execute(run.id(), &workflow_id).await, RunStatus::Failed);

        let run = runs.get(run.id()).await.unwrap().unwrap();
        let record = &run.attempts()[0];
        assert_eq!(record.status, AttemptStatus::Error);
        assert!(record.error.as_deref().unwrap_or_default().contains("database unavailable"));
    }

    #[tokio::test]
    async fn test_append_failure_is_caught_at_top_level() {
        let workflow = Workflow::new(WorkflowId::generate(), "wf").with_step(step(1));
        let workflow_id = workflow.id().clone();
        let run_id = RunId::generate();

        let mut runs = MockRunRepository::new();
        runs.expect_append_attempt()
            .withf(|_, record| record.step_order == 1)
            .times(1)
            .returning(|_, _| Err(DomainError::storage("disk full")));
        runs.expect_append_attempt()
            .withf(|_, record| {
                record.step_order == INTERNAL_ERROR_STEP_ORDER
                    && record.error.as_deref() == Some("Storage error: disk full")
            })
            .times(1)
            .returning(|_, _| Ok(()));
        runs.expect_update_status()
            .withf(|_, status, _| *status == RunStatus::Failed)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let gateway = Arc::new(MockModelGateway::replying("ok"));
        let executor = WorkflowExecutorImpl::with_config(
            Arc::new(InMemoryWorkflowRepository::with_workflows(vec![workflow])),
            Arc::new(runs),
            gateway.clone(),
            WorkflowExecutorConfig::immediate(),
        );

        let status = executor.execute(&run_id, &workflow_id).await;

        assert_eq!(status, RunStatus::Failed);
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_disjoint() {
        let harness = Arc::new(Harness::new(
            vec![step(1).with_max_retries(3).with_criterion(Criterion::contains("yes")), step(2)],
            MockModelGateway::new()
                .with_reply("no")
                .with_reply("no")
                .with_reply("no")
                .with_fallback(Ok(crate::domain::Completion::new("yes"))),
        ));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let harness = harness.clone();
                tokio::spawn(async move { harness.run().await })
            })
            .collect();

        let runs = futures::future::join_all(handles).await;

        let mut ids = Vec::new();
        for run in runs {
            let run = run.unwrap();
            assert_eq!(run.status(), RunStatus::Completed);

            for step_order in [1, 2] {
                let numbers: Vec<u32> = run
                    .attempts()
                    .iter()
                    .filter(|a| a.step_order == step_order)
                    .map(|a| a.attempt_number)
                    .collect();
                let expected: Vec<u32> = (1..=numbers.len() as u32).collect();
                assert_eq!(numbers, expected);
            }
            ids.push(run.id().clone());
        }

        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }
}
