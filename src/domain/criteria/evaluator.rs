//! Criteria evaluation
//!
//! Evaluation is total: every input produces a [`CriteriaOutcome`]. Bad
//! patterns, missing parameters and parse errors all turn into a failing
//! outcome with a reason.

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::criterion::Criterion;

/// Result of checking an output against a criterion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriteriaOutcome {
    pub passed: bool,
    pub reason: String,
}

impl CriteriaOutcome {
    pub fn pass(reason: impl Into<String>) -> Self {
        Self {
            passed: true,
            reason: reason.into(),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: reason.into(),
        }
    }
}

/// Check `output` against an optional criterion
pub fn evaluate(output: &str, criterion: Option<&Criterion>) -> CriteriaOutcome {
    match criterion {
        None | Some(Criterion::None) => CriteriaOutcome::pass("no_criteria"),
        Some(Criterion::Contains { keyword }) => evaluate_contains(output, keyword),
        Some(Criterion::Regex { pattern, flags }) => evaluate_regex(output, pattern, flags),
        Some(Criterion::JsonValid) => evaluate_json(output),
        Some(Criterion::Unknown { kind }) => {
            CriteriaOutcome::fail(format!("unknown criteria type: {}", kind))
        }
    }
}

fn evaluate_contains(output: &str, keyword: &str) -> CriteriaOutcome {
    if keyword.is_empty() {
        return CriteriaOutcome::fail("contains: missing keyword");
    }

    if output.contains(keyword) {
        CriteriaOutcome::pass(format!("contains: found '{}'", keyword))
    } else {
        CriteriaOutcome::fail(format!("contains: missing '{}'", keyword))
    }
}

/// Linear-time `regex` dialect: lookaround and backreferences do not compile
fn evaluate_regex(output: &str, pattern: &str, flags: &str) -> CriteriaOutcome {
    if pattern.is_empty() {
        return CriteriaOutcome::fail("regex: missing pattern");
    }

    let compiled = RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build();

    let regex = match compiled {
        Ok(regex) => regex,
        Err(regex::Error::CompiledTooBig(_)) => {
            return CriteriaOutcome::fail("regex: invalid pattern (CompiledTooBig)");
        }
        Err(_) => return CriteriaOutcome::fail("regex: invalid pattern (Syntax)"),
    };

    if regex.is_match(output) {
        CriteriaOutcome::pass("regex: matched")
    } else {
        CriteriaOutcome::fail("regex: no match")
    }
}

fn evaluate_json(output: &str) -> CriteriaOutcome {
    match serde_json::from_str::<Value>(output) {
        Ok(_) => CriteriaOutcome::pass("json_valid: parsed"),
        Err(e) => CriteriaOutcome::fail(format!(
            "json_valid: parse failed ({:?})",
            e.classify()
        )),
    }
}
