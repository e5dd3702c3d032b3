//! Model gateway implementations

mod chat_gateway;
mod http_client;

pub use chat_gateway::{ChatCompletionsGateway, GatewayConfig, GatewayRetryPolicy, ModelTimeouts};
pub use http_client::{HttpClient, HttpClientTrait, HttpResponse};
