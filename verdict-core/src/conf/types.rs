use crate::engine::DefaultOutcome;
use crate::icap::DEFAULT_ICAP_PORT;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level `verdict.hcl` document.
///
/// Every block and field is optional; a missing file yields the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerdictConfig {
    pub server: ServerConfig,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// ICAP listen address, `host:port`.
    pub listen: String,

    /// Optional number of worker threads - default is decided by Pingora.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,

    /// Optional pid file path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid_file: Option<PathBuf>,

    /// ICAP URI path of the filtering service. Every other path is bypassed.
    pub filter_path: String,

    /// Advertised to clients in OPTIONS responses.
    pub max_connections: u32,

    /// Idle keep-alive connections are closed after this many seconds.
    pub idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: format!("127.0.0.1:{DEFAULT_ICAP_PORT}"),
            threads: None,
            pid_file: None,
            filter_path: "/filter".to_string(),
            max_connections: 4000,
            idle_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    pub default_outcome: DefaultOutcome,
    pub block_page: String,
    pub lookup_base_url: String,
    pub lookup_timeout_ms: u64,
    pub debug: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_outcome: DefaultOutcome::Allow,
            block_page: "http://ngtech.co.il/block_page/".to_string(),
            lookup_base_url: "http://filterdb:8080/sb/01".to_string(),
            lookup_timeout_ms: 5000,
            debug: false,
        }
    }
}
