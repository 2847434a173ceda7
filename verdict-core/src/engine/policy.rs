use crate::conf::types::PolicyConfig;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// What to do when the reputation service has no usable answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DefaultOutcome {
    #[default]
    Allow,
    Deny,
}

#[derive(Debug, Error)]
#[error("invalid default outcome '{0}': expected allow|deny (or OK|ERR)")]
pub struct ParseDefaultOutcomeError(String);

impl FromStr for DefaultOutcome {
    type Err = ParseDefaultOutcomeError;

    /// The one place a default outcome is parsed, for config files and flags alike.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" | "ok" => Ok(DefaultOutcome::Allow),
            "deny" | "err" => Ok(DefaultOutcome::Deny),
            _ => Err(ParseDefaultOutcomeError(s.to_string())),
        }
    }
}

impl TryFrom<String> for DefaultOutcome {
    type Error = ParseDefaultOutcomeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DefaultOutcome> for String {
    fn from(value: DefaultOutcome) -> Self {
        value.to_string()
    }
}

impl Display for DefaultOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DefaultOutcome::Allow => f.write_str("allow"),
            DefaultOutcome::Deny => f.write_str("deny"),
        }
    }
}

/// Process-wide decision policy.
///
/// Built once before serving starts and shared read-only (behind an `Arc`)
/// by every request pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub default_outcome: DefaultOutcome,
    pub block_page: String,
    /// Base URL of the reputation service, without a trailing slash.
    pub lookup_base_url: String,
    pub lookup_timeout: Duration,
    pub debug: bool,
}

impl Policy {
    pub fn from_config(cfg: &PolicyConfig) -> Self {
        Self {
            default_outcome: cfg.default_outcome,
            block_page: cfg.block_page.clone(),
            lookup_base_url: cfg.lookup_base_url.trim_end_matches('/').to_string(),
            lookup_timeout: Duration::from_millis(cfg.lookup_timeout_ms),
            debug: cfg.debug,
        }
    }
}
