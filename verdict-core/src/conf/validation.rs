use crate::conf::error::ConfigError;
use crate::conf::types::{PolicyConfig, ServerConfig, VerdictConfig};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use url::Url;

/// Lookups slower than this stall the proxy noticeably.
const SLOW_LOOKUP_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    /// Dotted config path, e.g. `policy.block_page`.
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_violations(&self) -> bool {
        !self.errors.is_empty() || !self.warnings.is_empty()
    }

    fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            severity: Severity::Error,
            field: field.to_string(),
            message: message.into(),
        });
    }

    fn warning(&mut self, field: &str, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            severity: Severity::Warning,
            field: field.to_string(),
            message: message.into(),
        });
    }
}

impl Display for ValidationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for issue in self.errors.iter().chain(self.warnings.iter()) {
            let severity = match issue.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
            };
            writeln!(f, "  {severity}: {}: {}", issue.field, issue.message)?;
        }
        Ok(())
    }
}

/// A config that passed validation, with any warnings it produced.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub config: VerdictConfig,
    pub report: ValidationReport,
}

/// Validate everything in a parsed config, collecting every error.
pub fn validate_config(config: VerdictConfig) -> Result<ValidatedConfig, ConfigError> {
    let mut report = ValidationReport::default();

    validate_server(&config.server, &mut report);
    validate_policy(&config.policy, &mut report);

    if report.is_valid() {
        Ok(ValidatedConfig { config, report })
    } else {
        Err(ConfigError::Validation { report })
    }
}

fn validate_server(server: &ServerConfig, report: &mut ValidationReport) {
    if server.listen.parse::<SocketAddr>().is_err() {
        report.error(
            "server.listen",
            format!("'{}' is not a socket address (ip:port)", server.listen),
        );
    }

    if let Some(threads) = server.threads
        && !(1..=1024).contains(&threads)
    {
        report.error(
            "server.threads",
            format!("{threads} is out of range (1..=1024)"),
        );
    }

    if !server.filter_path.starts_with('/') {
        report.error(
            "server.filter_path",
            format!("'{}' must start with '/'", server.filter_path),
        );
    } else if server.filter_path == "/" {
        report.warning(
            "server.filter_path",
            "filtering on '/' leaves the default service unreachable for bare ICAP URIs",
        );
    }

    if server.max_connections == 0 {
        report.error("server.max_connections", "must be greater than zero");
    }

    if server.idle_timeout_secs == 0 {
        report.error("server.idle_timeout_secs", "must be greater than zero");
    }

    if let Some(pid_file) = &server.pid_file
        && pid_file.as_os_str().is_empty()
    {
        report.error("server.pid_file", "must not be empty");
    }
}

fn validate_policy(policy: &PolicyConfig, report: &mut ValidationReport) {
    validate_http_url("policy.block_page", &policy.block_page, report);
    validate_http_url("policy.lookup_base_url", &policy.lookup_base_url, report);

    if policy.lookup_timeout_ms == 0 {
        report.error("policy.lookup_timeout_ms", "must be greater than zero");
    } else if policy.lookup_timeout_ms > SLOW_LOOKUP_TIMEOUT_MS {
        report.warning(
            "policy.lookup_timeout_ms",
            format!(
                "{} ms holds proxy requests for a long time when the reputation service hangs",
                policy.lookup_timeout_ms
            ),
        );
    }
}

fn validate_http_url(field: &str, value: &str, report: &mut ValidationReport) {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
        Ok(url) => report.error(
            field,
            format!("'{value}' must be an absolute http(s) URL (scheme '{}')", url.scheme()),
        ),
        Err(e) => report.error(field, format!("'{value}' is not a valid URL: {e}")),
    }
}
