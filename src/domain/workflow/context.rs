//! Context propagation between steps
//!
//! A passing step's output becomes context for the next step. The next
//! step's prompt is then assembled as:
//!
//! ```text
//! ### CONTEXT (output from previous step)
//! <context>
//!
//! ### CURRENT TASK
//! <task>
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use super::step::ContextMode;

/// Language tag used when re-wrapping an extracted code block
pub const CODE_FENCE_LANGUAGE: &str = "python";

const FENCE: &str = "```";

/// First fenced block, with an optional language tag on the opening fence
static CODE_BLOCK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:\w+)?\s*([\s\S]*?)```").unwrap());

/// Language tag line directly after an unclosed opening fence
static LEADING_TAG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+\s*\n").unwrap());

/// Assemble the prompt actually sent for a step
pub fn build_prompt(task_prompt: &str, prior_context: &str) -> String {
    if prior_context.trim().is_empty() {
        return task_prompt.trim().to_string();
    }

    format!(
        "### CONTEXT (output from previous step)\n{}\n\n### CURRENT TASK\n{}",
        prior_context.trim(),
        task_prompt.trim()
    )
}

/// Derive the context handed to the next step
pub fn derive_context(output: &str, mode: ContextMode) -> String {
    match mode {
        ContextMode::Full => output.to_string(),
        ContextMode::CodeOnly => match extract_first_code_block(output) {
            Some(code) => format!("{}{}\n{}\n{}", FENCE, CODE_FENCE_LANGUAGE, code, FENCE),
            None => output.to_string(),
        },
    }
}

/// Inner content of the first fenced block, trimmed
///
/// Falls back to everything after an unclosed opening fence. Returns `None`
/// when there is no fence or the extracted content is blank.
pub fn extract_first_code_block(text: &str) -> Option<String> {
    if let Some(caps) = CODE_BLOCK_PATTERN.captures(text) {
        let code = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        return non_blank(code);
    }

    let start = text.find(FENCE)?;
    let after = &text[start + FENCE.len()..];
    let after = LEADING_TAG_PATTERN.replace(after, "");

    non_blank(after.trim())
}

fn non_blank(code: &str) -> Option<String> {
    if code.is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}
