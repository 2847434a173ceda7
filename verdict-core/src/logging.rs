use tracing_subscriber::{EnvFilter, fmt};

/// Initialize the logging system with JSON formatting and environment-based filtering
///
/// - `RUST_LOG` wins when set; otherwise the level is `info`, or `debug` when
///   the policy asks for debug diagnostics.
/// - Event fields are flattened into the top-level JSON object.
pub fn init_normal_logging(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    fmt()
        .with_env_filter(filter)
        .json()
        .flatten_event(true)
        .init();
}

pub fn init_logging(debug: bool) {
    // tokio-console installs its own subscriber
    if std::env::var("TOKIO_CONSOLE").is_ok() {
        init_console_logging();
    } else {
        init_normal_logging(debug);
    }
}

fn init_console_logging() {
    console_subscriber::init();
}

fn default_directive(debug: bool) -> &'static str {
    if debug { "debug" } else { "info" }
}
