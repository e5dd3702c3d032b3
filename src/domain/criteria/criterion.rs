//! Pass/fail rule attached to a workflow step

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Criterion applied to a step's model output
///
/// On the wire a criterion is a descriptor `{"kind": "...", ...parameters}`.
/// Unrecognised kinds are kept as [`Criterion::Unknown`] so evaluation can
/// fail them explicitly instead of rejecting the whole payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CriterionDescriptor", into = "CriterionDescriptor")]
pub enum Criterion {
    /// Always passes
    None,

    /// Output must contain `keyword` as a literal substring
    Contains { keyword: String },

    /// Output must contain at least one match of `pattern`
    ///
    /// `flags` may contain `i` (case-insensitive), `m` (multi-line) and
    /// `s` (dot matches newline).
    Regex { pattern: String, flags: String },

    /// Output must be one complete JSON document
    JsonValid,

    /// Any kind this build does not know about
    Unknown { kind: String },
}

impl Criterion {
    pub fn contains(keyword: impl Into<String>) -> Self {
        Self::Contains {
            keyword: keyword.into(),
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::Regex {
            pattern: pattern.into(),
            flags: String::new(),
        }
    }

    pub fn regex_with_flags(pattern: impl Into<String>, flags: impl Into<String>) -> Self {
        Self::Regex {
            pattern: pattern.into(),
            flags: flags.into(),
        }
    }

    /// The descriptor tag for this criterion
    pub fn kind(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Contains { .. } => "contains",
            Self::Regex { .. } => "regex",
            Self::JsonValid => "json_valid",
            Self::Unknown { kind } => kind,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown { .. })
    }
}

/// Wire representation: a kind tag plus free-form parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CriterionDescriptor {
    kind: String,
    #[serde(flatten)]
    parameters: Map<String, Value>,
}

impl CriterionDescriptor {
    fn string_param(&self, name: &str) -> String {
        self.parameters
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }
}

impl From<CriterionDescriptor> for Criterion {
    fn from(descriptor: CriterionDescriptor) -> Self {
        match descriptor.kind.as_str() {
            "none" => Criterion::None,
            "contains" => Criterion::Contains {
                keyword: descriptor.string_param("keyword"),
            },
            "regex" => Criterion::Regex {
                pattern: descriptor.string_param("pattern"),
                flags: descriptor.string_param("flags"),
            },
            "json_valid" => Criterion::JsonValid,
            _ => Criterion::Unknown {
                kind: descriptor.kind,
            },
        }
    }
}

impl From<Criterion> for CriterionDescriptor {
    fn from(criterion: Criterion) -> Self {
        let kind = criterion.kind().to_string();
        let mut parameters = Map::new();

        match criterion {
            Criterion::Contains { keyword } => {
                parameters.insert("keyword".to_string(), Value::String(keyword));
            }
            Criterion::Regex { pattern, flags } => {
                parameters.insert("pattern".to_string(), Value::String(pattern));

                if !flags.is_empty() {
                    parameters.insert("flags".to_string(), Value::String(flags));
                }
            }
            Criterion::None | Criterion::JsonValid | Criterion::Unknown { .. } => {}
        }

        Self { kind, parameters }
    }
}
