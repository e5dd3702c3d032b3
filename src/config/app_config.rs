use std::time::Duration;

use serde::Deserialize;

use crate::infrastructure::llm::{GatewayConfig, GatewayRetryPolicy, ModelTimeouts};
use crate::infrastructure::workflow::WorkflowExecutorConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub gateway: GatewaySettings,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Chat-completions endpoint settings
///
/// `chat_url` and `api_key` may be absent; calls then fail with a
/// configuration error instead of the process refusing to start.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub chat_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_jitter_ms: u64,
}

/// Step-level retry settings of the workflow engine
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub step_backoff_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            chat_url: None,
            api_key: None,
            timeout_seconds: 60,
            connect_timeout_seconds: 20,
            max_attempts: 3,
            backoff_base_ms: 600,
            backoff_jitter_ms: 250,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_backoff_ms: 800,
        }
    }
}

impl GatewaySettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn to_gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            chat_url: self.chat_url.clone(),
            api_key: self.api_key.clone(),
            timeout: Duration::from_secs(self.timeout_seconds),
            model_timeouts: ModelTimeouts::default(),
            retry: GatewayRetryPolicy {
                max_attempts: self.max_attempts,
                backoff_base: Duration::from_millis(self.backoff_base_ms),
                backoff_jitter: Duration::from_millis(self.backoff_jitter_ms),
            },
        }
    }
}

impl EngineConfig {
    pub fn to_executor_config(&self) -> WorkflowExecutorConfig {
        WorkflowExecutorConfig {
            step_backoff: Duration::from_millis(self.step_backoff_ms),
            ..Default::default()
        }
    }
}

impl AppConfig {
    /// Load from `config/` files and `APP__*` process environment
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_env(None)
    }

    /// Load with `env` standing in for the process environment when given
    pub fn load_from_env(
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;

        config.try_deserialize()
    }
}
