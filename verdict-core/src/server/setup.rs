use crate::conf::VerdictConfig;
use crate::engine::{Dispatcher, HttpLookupClient, Policy, ServiceOptions};
use crate::icap::CodecLimits;
use crate::server::app::IcapApp;
use crate::server::pid;
use anyhow::{Context, Result};
use pingora::server::Server;
use pingora::server::configuration::ServerConf;
use pingora::services::listening::Service;
use std::sync::Arc;
use std::time::Duration;

/// Run the Pingora server with the given configuration.
pub fn run(config: VerdictConfig) -> Result<()> {
    // Attempt to write pid file (best-effort)
    if let Some(pid_file) = &config.server.pid_file {
        if let Err(e) = pid::write_pid(pid_file) {
            tracing::warn!(error = %e, pid_file = %pid_file.display(), "failed to write pid file; continuing");
        } else {
            tracing::info!(pid_file = %pid_file.display(), "pid file written");
        }
    }

    let server = build_pingora_server(&config)?;

    // Ensure pid file cleanup on shutdown
    if let Some(pid_file) = config.server.pid_file.clone() {
        ctrlc::set_handler(move || {
            tracing::info!("shutdown requested, removing pid file");
            pid::remove_pid(&pid_file);
            std::process::exit(0);
        })?;
    }

    tracing::info!(
        listen = %config.server.listen,
        filter_path = %config.server.filter_path,
        lookup_base_url = %config.policy.lookup_base_url,
        default_outcome = %config.policy.default_outcome,
        block_page = %config.policy.block_page,
        "starting ICAP service"
    );

    server.run_forever();
}

/// Build the Pingora server with the ICAP listener registered.
pub fn build_pingora_server(config: &VerdictConfig) -> Result<Server> {
    let mut server = if let Some(threads) = config.server.threads {
        tracing::debug!(
            threads,
            "Creating Pingora server with overridden worker threads"
        );
        let mut conf = ServerConf::new().context("could not construct pingora server configuration")?;
        conf.threads = threads;
        Server::new_with_opt_and_conf(None, conf)
    } else {
        // "None" is required here to truly tell Pingora to use its default settings.
        Server::new(None)?
    };

    server.bootstrap();

    let app = build_icap_app(config)?;

    let mut svc = Service::new("ICAP adaptation service".to_string(), app);
    svc.add_tcp(&config.server.listen);

    server.add_service(svc);

    Ok(server)
}

/// Wire policy, lookup client and dispatcher into the listener logic.
pub fn build_icap_app(config: &VerdictConfig) -> Result<IcapApp> {
    let policy = Arc::new(Policy::from_config(&config.policy));

    let oracle = HttpLookupClient::new(&policy).context("failed to build reputation client")?;

    let dispatcher = Dispatcher::new(
        policy,
        Arc::new(oracle),
        ServiceOptions::from(&config.server),
    );

    Ok(IcapApp::new(
        Arc::new(dispatcher),
        CodecLimits::default(),
        Duration::from_secs(config.server.idle_timeout_secs),
        config.server.max_connections as usize,
    ))
}
