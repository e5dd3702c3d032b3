//! Gateway to an OpenAI-compatible chat-completions endpoint

use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::http_client::HttpClientTrait;
use crate::domain::llm::{
    extract_completion_text, extract_usage, ChatRequest, Completion, GatewayError, ModelGateway,
};
use crate::domain::model::AllowedModel;

const USER_AGENT: &str = "agentic-workflow/1.0";

/// Longest slice of an error body kept in error messages
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Per-model minimum request timeouts
///
/// The effective timeout for a call is the larger of the configured global
/// timeout and the model's entry here.
#[derive(Debug, Clone)]
pub struct ModelTimeouts {
    table: HashMap<AllowedModel, Duration>,
}

impl Default for ModelTimeouts {
    fn default() -> Self {
        Self::empty()
            .with(AllowedModel::KimiK2p5, Duration::from_secs(60))
            .with(AllowedModel::KimiK2Instruct0905, Duration::from_secs(120))
    }
}

impl ModelTimeouts {
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    pub fn with(mut self, model: AllowedModel, timeout: Duration) -> Self {
        self.table.insert(model, timeout);
        self
    }

    pub fn effective(&self, model: AllowedModel, global: Duration) -> Duration {
        self.table
            .get(&model)
            .map_or(global, |per_model| global.max(*per_model))
    }
}

/// Retry policy for transient failures: linear backoff plus random jitter
#[derive(Debug, Clone)]
pub struct GatewayRetryPolicy {
    /// Total attempts per invoke, including the first
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_jitter: Duration,
}

impl Default for GatewayRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(600),
            backoff_jitter: Duration::from_millis(250),
        }
    }
}

impl GatewayRetryPolicy {
    /// No sleeping between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff_base: Duration::ZERO,
            backoff_jitter: Duration::ZERO,
        }
    }

    /// Delay after the given failed attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.backoff_base * attempt;
        let jitter_ms = self.backoff_jitter.as_millis() as u64;

        if jitter_ms == 0 {
            return base;
        }

        base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// Endpoint, credential and timing for [`ChatCompletionsGateway`]
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub chat_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub model_timeouts: ModelTimeouts,
    pub retry: GatewayRetryPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            chat_url: None,
            api_key: None,
            timeout: Duration::from_secs(60),
            model_timeouts: ModelTimeouts::default(),
            retry: GatewayRetryPolicy::default(),
        }
    }
}

impl GatewayConfig {
    pub fn new(chat_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            chat_url: Some(chat_url.into()),
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    pub fn with_retry(mut self, retry: GatewayRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Names of the settings that are missing or blank
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let blank = |value: &Option<String>| value.as_deref().is_none_or(|v| v.trim().is_empty());

        let mut missing = Vec::new();
        if blank(&self.chat_url) {
            missing.push("chat_url");
        }
        if blank(&self.api_key) {
            missing.push("api_key");
        }
        missing
    }

    fn endpoint(&self) -> Result<(&str, &str), GatewayError> {
        match (self.chat_url.as_deref(), self.api_key.as_deref()) {
            (Some(url), Some(key)) if !url.trim().is_empty() && !key.trim().is_empty() => {
                Ok((url.trim(), key.trim()))
            }
            _ => Err(GatewayError::configuration(format!(
                "missing gateway setting(s): {}",
                self.missing_settings().join(", ")
            ))),
        }
    }
}

/// [`ModelGateway`] over an OpenAI-compatible chat-completions API
#[derive(Debug)]
pub struct ChatCompletionsGateway<C: HttpClientTrait> {
    client: C,
    config: GatewayConfig,
}

impl<C: HttpClientTrait> ChatCompletionsGateway<C> {
    pub fn new(client: C, config: GatewayConfig) -> Self {
        Self { client, config }
    }

    async fn send_once(
        &self,
        url: &str,
        auth_header: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<Completion, GatewayError> {
        let headers = vec![
            ("Authorization", auth_header),
            ("Content-Type", "application/json"),
            ("Accept", "application/json"),
            ("User-Agent", USER_AGENT),
        ];

        let response = self.client.post_json(url, headers, body, timeout).await?;

        if response.status >= 400 {
            return Err(GatewayError::from_status(
                response.status,
                truncate(&response.body, MAX_ERROR_BODY_CHARS),
            ));
        }

        let json: serde_json::Value = serde_json::from_str(&response.body).map_err(|e| {
            GatewayError::invalid_response(format!(
                "body is not JSON ({}): {}",
                e,
                truncate(&response.body, MAX_ERROR_BODY_CHARS)
            ))
        })?;

        let text = extract_completion_text(&json).ok_or_else(|| {
            GatewayError::invalid_response(format!(
                "could not find completion text in {}",
                truncate(&json.to_string(), MAX_ERROR_BODY_CHARS)
            ))
        })?;

        Ok(Completion::new(text).with_usage(extract_usage(&json)))
    }
}

#[async_trait]
impl<C: HttpClientTrait> ModelGateway for ChatCompletionsGateway<C> {
    async fn invoke(
        &self,
        model: AllowedModel,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<Completion, GatewayError> {
        let (url, api_key) = self.config.endpoint()?;
        let auth_header = format!("Bearer {}", api_key);

        let request = ChatRequest::single_turn(model, prompt, max_tokens);
        let body = serde_json::to_value(&request)
            .map_err(|e| GatewayError::invalid_response(format!("Failed to encode request: {}", e)))?;

        let timeout = self.config.model_timeouts.effective(model, self.config.timeout);
        let retry = &self.config.retry;
        let max_attempts = retry.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            debug!(model = %model, attempt, timeout_ms = timeout.as_millis() as u64, "Calling model");

            match self.send_once(url, &auth_header, &body, timeout).await {
                Ok(completion) => return Ok(completion),
                Err(error) if error.is_transient() => {
                    if attempt < max_attempts {
                        let delay = retry.delay_for_attempt(attempt);
                        warn!(
                            model = %model,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "Transient gateway failure, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(error);
                }
                Err(error) => return Err(error),
            }
        }

        Err(GatewayError::Exhausted {
            attempts: max_attempts,
            message: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    fn is_configured(&self) -> bool {
        self.config.endpoint().is_ok()
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
