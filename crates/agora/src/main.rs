//! # agora
//!
//! Agora realtime gateway binary: loads settings, wires the server, and
//! runs until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use agora_server::AgoraServer;
use agora_server::shutdown::ShutdownCoordinator;
use agora_settings::AgoraSettings;
use anyhow::{Context, Result};
use clap::Parser;

/// Agora realtime gateway.
#[derive(Parser, Debug)]
#[command(name = "agora", about = "Agora realtime change-notification gateway")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.agora/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level filter (overrides settings; `RUST_LOG` still wins).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Fold CLI flags over loaded settings.
    fn apply(&self, settings: &mut AgoraSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

fn load_settings(cli: &Cli) -> Result<AgoraSettings> {
    let path = cli
        .settings
        .clone()
        .unwrap_or_else(agora_settings::settings_path);
    let mut settings = agora_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    agora_core::logging::init_subscriber(&settings.logging.level, settings.logging.format);
    let metrics = agora_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let server = AgoraServer::from_settings(&settings, metrics);
    let addr = server.listen().await.context("Failed to bind listener")?;
    tracing::info!(
        %addr,
        name = %settings.name,
        routes = settings.routes.len(),
        tokens = settings.auth.tokens.len(),
        ingest_open = settings.auth.ingest_token.is_none(),
        "agora listening"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    let report = server
        .shutdown()
        .graceful_shutdown(ShutdownCoordinator::DEFAULT_TIMEOUT)
        .await;
    if report.is_clean() {
        tracing::info!("Shutdown complete");
    } else {
        tracing::warn!(failed = ?report.failed, aborted = ?report.aborted, "Shutdown incomplete");
    }
    Ok(())
}
