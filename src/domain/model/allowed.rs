//! Closed allow-list of models a workflow step may target

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Models the gateway is allowed to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AllowedModel {
    /// Fast general-purpose model
    KimiK2p5,

    /// Instruct model; slower and flakier on the network
    KimiK2Instruct0905,
}

impl AllowedModel {
    pub const ALL: [AllowedModel; 2] = [AllowedModel::KimiK2p5, AllowedModel::KimiK2Instruct0905];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KimiK2p5 => "kimi-k2p5",
            Self::KimiK2Instruct0905 => "kimi-k2-instruct-0905",
        }
    }

    /// Token cap used when a step does not set one
    pub fn default_max_tokens(&self) -> u32 {
        match self {
            Self::KimiK2p5 => 300,
            Self::KimiK2Instruct0905 => 160,
        }
    }

    /// Comma-separated, sorted list of valid identifiers
    pub fn valid_options() -> String {
        let mut names: Vec<&str> = Self::ALL.iter().map(|m| m.as_str()).collect();
        names.sort_unstable();
        names.join(", ")
    }
}

impl FromStr for AllowedModel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "Unsupported model '{}'. Choose from: {}",
                    s,
                    Self::valid_options()
                ))
            })
    }
}

impl TryFrom<String> for AllowedModel {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AllowedModel> for String {
    fn from(model: AllowedModel) -> Self {
        model.as_str().to_string()
    }
}

impl fmt::Display for AllowedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
