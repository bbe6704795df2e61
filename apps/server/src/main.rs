//! Toolgate server binary
//!
//! Loads `.env`, installs console and rolling-file logging, reads the gateway
//! configuration from the environment and serves until Ctrl-C.

use std::path::{Path, PathBuf};

use anyhow::Context;
use toolgate_core::{branding, config::vars, GatewayConfig};
use toolgate_gateway::{DependenciesBuilder, GatewayServer};
use tracing::{info, warn};

/// Log directory from `LOG_DIR`, falling back to the platform data dir
fn logs_dir() -> PathBuf {
    std::env::var(vars::LOG_DIR)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(branding::default_logs_dir)
}

/// Initialize tracing with console and file logging
///
/// - Console: colored, compact format
/// - File: daily rotation, e.g. `toolgate.2026-01-22.log`
fn init_tracing(logs_dir: &Path) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("failed to create logs directory {}", logs_dir.display()))?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(branding::LOG_PREFIX)
        .filename_suffix("log")
        .build(logs_dir)
        .context("failed to create log file appender")?;
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG takes precedence
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            "info,toolgate_gateway=debug,toolgate_core=debug,toolgate_storage=debug,\
             tower_http=info,hyper=warn,reqwest=warn",
        )
    });

    let console_layer = fmt::layer()
        .with_ansi(true)
        .compact()
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    // Must be kept alive for the duration of the program
    Ok(guard)
}

async fn shutdown_signal() {
    wait_for_signal(tokio::signal::ctrl_c()).await
}

/// Resolves when `signal` fires. If the listener cannot be installed the
/// server keeps running instead of shutting down at once.
async fn wait_for_signal<F>(signal: F)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("[Gateway] Ctrl-C received, shutting down"),
        Err(e) => {
            warn!("[Gateway] Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Development convenience; a missing .env is fine
    dotenvy::dotenv().ok();

    let logs_dir = logs_dir();
    let _guard = init_tracing(&logs_dir)?;

    info!(
        "{} v{} starting (logs in {})",
        branding::DISPLAY_NAME,
        env!("CARGO_PKG_VERSION"),
        logs_dir.display()
    );

    let config = GatewayConfig::from_env().context("invalid gateway configuration")?;
    let dependencies = DependenciesBuilder::new().build();
    let server = GatewayServer::new(config, dependencies)?;

    server.run(shutdown_signal()).await
}
