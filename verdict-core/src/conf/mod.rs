mod error;
mod loader;
pub mod types;
pub mod validation;

#[cfg(test)]
mod tests;

pub use error::ConfigError;
pub use loader::{DEFAULT_CONFIG_FILE, load_config, load_config_file, parse_config};
pub use types::{PolicyConfig, ServerConfig, VerdictConfig};
pub use validation::{ValidatedConfig, ValidationIssue, ValidationReport, validate_config};
