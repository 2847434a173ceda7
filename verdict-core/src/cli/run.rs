use crate::conf::{
    ConfigError, DEFAULT_CONFIG_FILE, ValidatedConfig, VerdictConfig, load_config_file,
    validate_config,
};
use crate::engine::DefaultOutcome;
use crate::logging::init_logging;
use crate::server;
use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

/// Options of `verdict run`. Flags override values from the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Path to the Verdict config file (defaults to ./verdict.hcl when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Emit debug diagnostics for every lookup
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// ICAP listen address
    #[arg(short = 'p', long = "listen", value_name = "ADDR")]
    pub listen: Option<String>,

    /// Block page the client is redirected to
    #[arg(short = 'b', long, value_name = "URL")]
    pub block_page: Option<String>,

    /// Base URL of the reputation service
    #[arg(short = 'u', long = "lookup-url", value_name = "URL")]
    pub lookup_base_url: Option<String>,

    /// Outcome when the reputation service has no answer (allow|deny, OK|ERR)
    #[arg(short = 'a', long, value_name = "OUTCOME")]
    pub default_outcome: Option<DefaultOutcome>,
}

impl RunArgs {
    fn apply(&self, config: &mut VerdictConfig) {
        if self.debug {
            config.policy.debug = true;
        }
        if let Some(listen) = &self.listen {
            config.server.listen = listen.clone();
        }
        if let Some(block_page) = &self.block_page {
            config.policy.block_page = block_page.clone();
        }
        if let Some(url) = &self.lookup_base_url {
            config.policy.lookup_base_url = url.clone();
        }
        if let Some(outcome) = self.default_outcome {
            config.policy.default_outcome = outcome;
        }
    }
}

/// Load the config file (if any), apply flag overrides, then validate.
pub fn resolve_run_config(args: &RunArgs) -> Result<ValidatedConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => load_config_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            load_config_file(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => VerdictConfig::default(),
    };

    args.apply(&mut config);

    validate_config(config)
}

pub fn run(args: RunArgs) -> Result<()> {
    let validated = resolve_run_config(&args).context("failed to load Verdict config")?;

    init_logging(validated.config.policy.debug);

    for issue in &validated.report.warnings {
        tracing::warn!(field = %issue.field, "{}", issue.message);
    }

    server::run(validated.config)
}
