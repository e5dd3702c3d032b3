use thiserror::Error;

/// Failures of a single model invocation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Endpoint URL or credential missing
    #[error("Gateway not configured: {message}")]
    Configuration { message: String },

    /// Timeout, connection reset or read failure
    #[error("Network error: {message}")]
    Network { message: String },

    /// HTTP status the provider documents as retryable
    #[error("Transient HTTP {status}: {body}")]
    Transient { status: u16, body: String },

    /// Any other HTTP error status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Body was not JSON, held no usable text, or the redirect chain broke
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    /// Transient failures persisted past the retry cap
    #[error("Gateway gave up after {attempts} attempts: {message}")]
    Exhausted { attempts: u32, message: String },
}

impl GatewayError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Classify an HTTP error status
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        if is_retryable_status(status) {
            Self::Transient { status, body }
        } else {
            Self::Status { status, body }
        }
    }

    /// Worth retrying inside the gateway
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Transient { .. })
    }

    /// No later attempt can succeed without operator action
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

/// 429 and the gateway-side 5xx family
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503 | 504)
}
