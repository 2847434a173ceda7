use crate::conf::error::ConfigError;
use crate::conf::types::VerdictConfig;
use crate::conf::validation::{ValidatedConfig, validate_config};
use std::fs;
use std::path::Path;

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "verdict.hcl";

/// Parse HCL source. `path` is only used for error reporting.
pub fn parse_config(src: &str, path: &Path) -> Result<VerdictConfig, ConfigError> {
    hcl::from_str(src).map_err(|e| ConfigError::parse(path, e))
}

/// Read and parse a config file without validating it.
pub fn load_config_file(path: &Path) -> Result<VerdictConfig, ConfigError> {
    let src = fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    parse_config(&src, path)
}

/// Read, parse and validate a config file.
///
/// All semantic errors are collected before failing.
pub fn load_config(path: &Path) -> Result<ValidatedConfig, ConfigError> {
    //--------------------------------------------------------------------------
    // Hard fail: IO and parsing
    //--------------------------------------------------------------------------
    let config = load_config_file(path)?;

    //--------------------------------------------------------------------------
    // Semantic validation (aggregate all errors)
    //--------------------------------------------------------------------------
    validate_config(config)
}
