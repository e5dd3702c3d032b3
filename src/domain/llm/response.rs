use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token usage statistics; any field the provider omits defaults to zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Text produced by a single model call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    #[serde(default)]
    pub usage: Usage,
}

impl Completion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: Usage::default(),
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }
}

/// Pull the generated text out of a provider response body
///
/// Looks at `choices[0].message.content` first, then the top-level
/// `output`, `text` and `response` fields. The first non-blank string wins
/// and is returned as sent. Returns `None` when none of them holds text.
pub fn extract_completion_text(body: &Value) -> Option<String> {
    let candidates = [
        body.pointer("/choices/0/message/content"),
        body.get("output"),
        body.get("text"),
        body.get("response"),
    ];

    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find(|text| !text.trim().is_empty())
        .map(str::to_string)
}

/// Usage block of a provider response, if present and well-formed
pub fn extract_usage(body: &Value) -> Usage {
    body.get("usage")
        .cloned()
        .and_then(|usage| serde_json::from_value(usage).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_usage_calculation() {
        let usage = Usage::new(10, 20);
        assert_eq!(usage.total_tokens, 30);
    }

    #[test]
    fn test_extract_from_choices() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "  hello \n"}}]
        });
        assert_eq!(extract_completion_text(&body), Some("  hello \n".to_string()));
    }

    #[test]
    fn test_extract_fallback_fields() {
        assert_eq!(
            extract_completion_text(&json!({"output": "a"})),
            Some("a".to_string())
        );
        assert_eq!(
            extract_completion_text(&json!({"text": "b"})),
            Some("b".to_string())
        );
        assert_eq!(
            extract_completion_text(&json!({"response": "c"})),
            Some("c".to_string())
        );
    }

    #[test]
    fn test_extract_skips_blank_choice() {
        let body = json!({
            "choices": [{"message": {"content": "   "}}],
            "output": "fallback"
        });
        assert_eq!(extract_completion_text(&body), Some("fallback".to_string()));
    }

    #[test]
    fn test_extract_nothing() {
        assert_eq!(extract_completion_text(&json!({})), None);
        assert_eq!(extract_completion_text(&json!({"choices": []})), None);
        assert_eq!(
            extract_completion_text(&json!({"choices": [{"message": {"content": null}}]})),
            None
        );
    }

    #[test]
    fn test_extract_usage_partial() {
        let usage = extract_usage(&json!({"usage": {"prompt_tokens": 7}}));
        assert_eq!(usage.prompt_tokens, 7);
        assert_eq!(usage.completion_tokens, 0);

        assert_eq!(extract_usage(&json!({"usage": "bogus"})), Usage::default());
    }
}
