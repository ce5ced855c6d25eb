#![forbid(unsafe_code)]

//! `agent-bridge`: loopback JSON-RPC/SSE bridge binary.
//!
//! Loads configuration, starts the bridge server, advertises it through a
//! discovery lock file, and shuts down cleanly on Ctrl-C or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use agent_bridge::bridge::BridgeHandler;
use agent_bridge::config::BridgeConfig;
use agent_bridge::discovery::{self, LockFile};
use agent_bridge::server::Server;
use agent_bridge::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "agent-bridge", about = "Loopback JSON-RPC/SSE bridge", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the listening port (0 picks an ephemeral port).
    #[arg(long)]
    port: Option<u16>,

    /// Override the workspace root.
    #[arg(long)]
    workspace: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("agent-bridge bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match args.config {
        Some(ref path) => BridgeConfig::load_from_path(path)?,
        None => BridgeConfig::default(),
    };

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(workspace) = args.workspace {
        config.workspace = workspace;
    }
    config.validate()?;
    info!(workspace = %config.workspace.display(), "configuration loaded");

    // ── Start server ────────────────────────────────────
    let handler = Arc::new(BridgeHandler::new(&config));
    let server = Server::start(&config, handler)?;

    // ── Advertise ───────────────────────────────────────
    let lock = LockFile::for_current_process(server.port(), &config.workspace);
    let lock_path = match discovery::write(&config.discovery_dir, &lock) {
        Ok(path) => Some(path),
        Err(err) => {
            error!(%err, "failed to write discovery lock file");
            None
        }
    };

    info!(port = server.port(), "bridge ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");

    server.shutdown().await;

    if let Some(path) = lock_path {
        if let Err(err) = discovery::remove(&path) {
            error!(%err, "failed to remove discovery lock file");
        }
    }

    info!("agent-bridge shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
