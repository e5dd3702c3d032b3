use async_trait::async_trait;
use std::time::Duration;

use crate::domain::llm::GatewayError;

/// Status and raw body of an HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok_json(body: &serde_json::Value) -> Self {
        Self::new(200, body.to_string())
    }
}

/// Trait for HTTP client operations (for mocking)
///
/// Error statuses are returned as responses; only transport failures
/// surface as `Err`.
#[async_trait]
pub trait HttpClientTrait: Send + Sync + std::fmt::Debug {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<HttpResponse, GatewayError>;
}

/// Real HTTP client using reqwest
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Build a client forced to HTTP/1.1 without keep-alive pooling
    pub fn new(connect_timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .http1_only()
            .pool_max_idle_per_host(0)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| GatewayError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClientTrait for HttpClient {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<HttpResponse, GatewayError> {
        let mut request = self.client.post(url).timeout(timeout);

        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request.json(body).send().await.map_err(classify_transport_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_transport_error)?;

        Ok(HttpResponse { status, body })
    }
}

fn classify_transport_error(error: reqwest::Error) -> GatewayError {
    if error.is_builder() {
        return GatewayError::configuration(format!("Invalid request: {}", error));
    }

    // Repeating the call lands on the same redirect chain or the same bytes
    if error.is_redirect() {
        return GatewayError::invalid_response(format!("redirect failed: {}", error));
    }
    if error.is_decode() {
        return GatewayError::invalid_response(format!("undecodable body: {}", error));
    }

    let kind = if error.is_timeout() {
        "timed out"
    } else if error.is_connect() {
        "connection failed"
    } else {
        "transport error"
    };

    GatewayError::network(format!("{}: {}", kind, error))
}
