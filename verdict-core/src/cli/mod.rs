mod config;
mod run;


pub use config::{ConfigCmd, check, dump};
pub use run::{RunArgs, resolve_run_config, run};
