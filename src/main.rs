//! # serialws
//!
//! Serial port to WebSocket bridge: loads settings, opens the listener and
//! runs until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serialws_serial::{HardwareTransport, SerialSession};
use serialws_server::ServerConfig;
use serialws_settings::{LogFormat, SerialWsSettings};

/// Serial port to WebSocket bridge.
#[derive(Parser, Debug)]
#[command(name = "serialws", version, about = "Bridge a serial port to WebSocket clients")]
struct Cli {
    /// Settings file (defaults to `~/.serialws/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Log filter directive (`RUST_LOG` still wins).
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format: `pretty` or `json`.
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    /// Command-line flags override every other settings layer.
    fn apply(&self, settings: &mut SerialWsSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if let Some(format) = self.log_format {
            settings.logging.format = format;
        }
    }

    fn load_settings(&self) -> Result<SerialWsSettings> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(serialws_settings::settings_path);
        let mut settings = serialws_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        self.apply(&mut settings);
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.load_settings()?;

    serialws_logging::init_logging(&settings.logging).context("Failed to initialise logging")?;

    let transport = HardwareTransport::with_read_timeout(settings.serial.read_timeout());
    let session =
        SerialSession::with_default_baud_rate(Arc::new(transport), settings.serial.default_baud_rate);

    let server = serialws_server::start(ServerConfig::from_settings(&settings), session.clone())
        .await
        .context("Failed to bind server")?;

    tracing::info!(
        "serialws listening on ws://{} (default baud {})",
        server.local_addr(),
        session.default_baud_rate()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown(Some(Duration::from_secs(5))).await;
    session.shutdown().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
