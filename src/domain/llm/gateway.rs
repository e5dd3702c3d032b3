use async_trait::async_trait;
use std::fmt::Debug;

use super::error::GatewayError;
use super::response::Completion;
use crate::domain::model::AllowedModel;

/// Boundary to the model provider
///
/// One call is one logical invocation. Implementations may retry transient
/// failures internally; whatever they return is final for that call.
#[async_trait]
pub trait ModelGateway: Send + Sync + Debug {
    /// Send a single-turn prompt and return the generated text
    async fn invoke(
        &self,
        model: AllowedModel,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<Completion, GatewayError>;

    /// Whether endpoint and credential are present
    fn is_configured(&self) -> bool;
}
