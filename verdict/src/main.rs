use clap::{Parser, Subcommand};
use verdict_core::cli::{self, ConfigCmd, RunArgs};

#[derive(Parser, Debug)]
#[command(
    name = "verdict",
    version,
    about = "Verdict: ICAP URL filtering service backed by a reputation lookup"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Flags for the default `run` command
    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the ICAP service (default)
    Run(RunArgs),

    /// Configuration tooling
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
}

fn main() {
    let args = Cli::parse();

    let result = match args.command {
        Some(Command::Config { cmd }) => match cmd {
            ConfigCmd::Check { path } => cli::check(path),
            ConfigCmd::Dump { path, json, yaml } => cli::dump(path, json, yaml),
        },
        Some(Command::Run(run)) => cli::run(run),
        None => cli::run(args.run),
    };

    if let Err(e) = result {
        eprintln!("verdict: {e:#}");
        std::process::exit(1);
    }
}
