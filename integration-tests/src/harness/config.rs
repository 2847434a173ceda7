use std::path::PathBuf;
use verdict_core::conf::{VerdictConfig, load_config_file, validate_config};

/// Load `fixtures/config/<name>.hcl` and point it at test ports.
pub fn fixture_config(name: &str, listen_port: u16, lookup_base_url: &str) -> VerdictConfig {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join("config")
        .join(format!("{name}.hcl"));

    assert!(path.exists(), "fixture config does not exist: {path:?}");

    let mut cfg = load_config_file(&path).expect("failed to load fixture config");
    cfg.server.listen = format!("127.0.0.1:{listen_port}");
    cfg.policy.lookup_base_url = lookup_base_url.to_string();

    validate_config(cfg)
        .expect("fixture config failed validation")
        .config
}
