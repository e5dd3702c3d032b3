//! Model gateway boundary: chat types, completion and errors

mod error;
mod gateway;
mod message;
mod request;
mod response;

pub use error::{is_retryable_status, GatewayError};
pub use gateway::ModelGateway;
pub use message::{Message, MessageRole};
pub use request::{ChatRequest, DEFAULT_TEMPERATURE};
pub use response::{extract_completion_text, extract_usage, Completion, Usage};

#[cfg(test)]
pub use gateway::mock::{MockModelGateway, RecordedCall};
