use crate::conf::validation::Severity;
use crate::conf::{ConfigError, VerdictConfig, validate_config};
use pretty_assertions::assert_eq;

fn errors_for(cfg: VerdictConfig) -> Vec<String> {
    match validate_config(cfg) {
        Ok(_) => Vec::new(),
        Err(ConfigError::Validation { report }) => {
            report.errors.into_iter().map(|issue| issue.field).collect()
        }
        Err(other) => panic!("unexpected error: {other}"),
    }
}

#[test]
fn defaults_are_valid() {
    let validated = validate_config(VerdictConfig::default()).unwrap();

    assert!(!validated.report.has_violations());
}

#[test]
fn every_error_is_reported_at_once() {
    // Arrange
    let mut cfg = VerdictConfig::default();
    cfg.server.listen = "localhost".to_string();
    cfg.server.threads = Some(0);
    cfg.server.filter_path = "filter".to_string();
    cfg.server.idle_timeout_secs = 0;
    cfg.policy.block_page = "ftp://block.example/".to_string();
    cfg.policy.lookup_base_url = "not a url".to_string();
    cfg.policy.lookup_timeout_ms = 0;

    // Act
    let fields = errors_for(cfg);

    // Assert
    assert_eq!(
        fields,
        vec![
            "server.listen",
            "server.threads",
            "server.filter_path",
            "server.idle_timeout_secs",
            "policy.block_page",
            "policy.lookup_base_url",
            "policy.lookup_timeout_ms",
        ]
    );
}

#[test]
fn too_many_threads_is_an_error() {
    let mut cfg = VerdictConfig::default();
    cfg.server.threads = Some(4096);

    assert_eq!(errors_for(cfg), vec!["server.threads"]);
}

#[test]
fn relative_url_is_an_error() {
    let mut cfg = VerdictConfig::default();
    cfg.policy.block_page = "/block_page/".to_string();

    assert_eq!(errors_for(cfg), vec!["policy.block_page"]);
}

#[test]
fn long_lookup_timeout_is_only_a_warning() {
    // Arrange
    let mut cfg = VerdictConfig::default();
    cfg.policy.lookup_timeout_ms = 60_000;

    // Act
    let validated = validate_config(cfg).unwrap();

    // Assert
    assert_eq!(validated.report.warnings.len(), 1);
    assert_eq!(validated.report.warnings[0].severity, Severity::Warning);
    assert_eq!(validated.report.warnings[0].field, "policy.lookup_timeout_ms");
}

#[test]
fn report_renders_one_line_per_issue() {
    let mut cfg = VerdictConfig::default();
    cfg.server.max_connections = 0;

    let Err(err) = validate_config(cfg) else {
        panic!("expected validation failure");
    };

    assert_eq!(
        err.to_string(),
        "config validation failed:\n  error: server.max_connections: must be greater than zero\n"
    );
}
