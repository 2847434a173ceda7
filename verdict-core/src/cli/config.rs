use crate::conf::{ConfigError, DEFAULT_CONFIG_FILE, load_config};
use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum ConfigCmd {
    /// Validate configuration and exit
    Check {
        /// Path to config file
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,
    },

    /// Print resolved configuration
    Dump {
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,

        /// Output as JSON
        #[arg(long, conflicts_with = "yaml")]
        json: bool,

        /// Output as YAML
        #[arg(long)]
        yaml: bool,
    },
}

pub fn check(path: PathBuf) -> Result<()> {
    match load_config(&path) {
        Ok(validated) => {
            let cfg = &validated.config;
            println!("✔ Config loaded successfully");
            println!("✔ listening on {}", cfg.server.listen);
            println!("✔ filter service at {}", cfg.server.filter_path);
            println!("✔ reputation service {}", cfg.policy.lookup_base_url);
            println!("✔ default outcome {}", cfg.policy.default_outcome);

            if !validated.report.warnings.is_empty() {
                println!();
                print!("{}", validated.report);
            }
            Ok(())
        }
        Err(err) => {
            print_config_error(&err);
            std::process::exit(1);
        }
    }
}

pub fn dump(path: PathBuf, json: bool, yaml: bool) -> Result<()> {
    let validated = load_config(&path)?;

    if yaml {
        dump_yaml(&validated.config)?;
    } else if json || !yaml {
        // default: json
        dump_json(&validated.config)?;
    }

    Ok(())
}

fn print_config_error(err: &ConfigError) {
    eprintln!("✘ {err}");
    if let Some(hint) = config_error_hint(err) {
        eprintln!();
        eprintln!("{hint}");
    }
}

pub fn config_error_hint(err: &ConfigError) -> Option<&'static str> {
    match err {
        ConfigError::ReadFile { .. } => Some(
            "The config file is optional for `verdict run`; every field has a default.\n\
             Pass an existing file or create one, e.g.:\n\
             \n\
             policy {\n  \
               lookup_base_url = \"http://filterdb:8080/sb/01\"\n\
             }",
        ),
        ConfigError::Parse { .. } => Some(
            "Verdict config files are HCL with two optional blocks: `server { ... }` and `policy { ... }`.",
        ),
        ConfigError::Validation { .. } => None,
    }
}

fn dump_json<T: Serialize>(value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    println!("{s}");
    Ok(())
}

fn dump_yaml<T: Serialize>(value: &T) -> Result<()> {
    let s = serde_yaml::to_string(value)?;
    println!("{s}");
    Ok(())
}
