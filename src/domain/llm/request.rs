use serde::{Deserialize, Serialize};

use super::Message;
use crate::domain::model::AllowedModel;

/// Sampling temperature used for every workflow call
pub const DEFAULT_TEMPERATURE: f64 = 0.2;

/// Body of an OpenAI-compatible chat-completions request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub stream: bool,
}

impl ChatRequest {
    /// Single user turn, non-streaming
    pub fn single_turn(model: AllowedModel, prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.as_str().to_string(),
            messages: vec![Message::user(prompt)],
            temperature: DEFAULT_TEMPERATURE,
            max_tokens,
            stream: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}
