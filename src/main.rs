//! echo-town: A line-oriented TCP echo server
//!
//! Each connected client gets its own session that:
//! - echoes every line back behind a server tag
//! - answers `/time`, `/quit`, `/echo` and `/help` commands
//! - replies to a few scripted phrases (`hello`, `bye`, blank input)
//! - rejects oversized, non-printable or non-UTF-8 input
//! - disconnects after 30 seconds of silence
//!
//! Configuration via CLI arguments or TOML file.

mod config;
mod logging;
mod protocol;
mod routing;
mod server;
mod session;
mod transcript;
mod validate;

use config::Config;
use routing::Router;
use server::Server;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration; an invalid port exits before anything is opened
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let log_path = logging::init(&config.log_level, &config.log_dir)?;

    info!(
        host = %config.host,
        port = config.port,
        idle_timeout_secs = config.idle_timeout.as_secs(),
        log = %log_path.display(),
        "Starting Echo Town server"
    );

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(workers) = config.workers {
        builder.worker_threads(workers);
    }
    let runtime = builder.enable_all().build()?;

    runtime.block_on(run(config))
}

/// Serve until the listener fails or a shutdown signal arrives
async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let server = Server::new(config, Router::standard());

    tokio::select! {
        result = server.run() => result,
        _ = shutdown_signal() => {
            info!("Echo Town server stopped");
            Ok(())
        }
    }
}

/// Resolve on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
