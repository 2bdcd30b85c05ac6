//! Stellarium ↔ RCI bridge: entry point.
//!
//! Stellarium's "telescope control" plugin speaks a small binary protocol
//! over TCP.  This binary accepts those connections, reports where the mount
//! is pointing, and turns goto requests into azimuth/elevation commands for
//! the RCI control server.
//!
//! # Usage
//!
//! ```text
//! stellarium-bridge [OPTIONS]
//!
//! Options:
//!   --config <FILE>          TOML configuration file
//!   --bind <ADDR>            Listen address [default: 0.0.0.0]
//!   --port <PORT>            Listen port [default: 10001]
//!   --rci-url <URL>          RCI WebSocket URL [default: ws://localhost:8502/api/ws]
//!   --rci-password <PASS>    RCI password
//!   --client-name <NAME>     Name reported to the RCI server [default: Stellarium]
//!   --log-level <FILTER>     Log filter when RUST_LOG is unset [default: info]
//! ```
//!
//! # Configuration precedence
//!
//! Built-in defaults, then the `--config` file, then flags / environment
//! variables.  A flag beats its environment variable.
//!
//! | Variable            | Flag             |
//! |---------------------|------------------|
//! | `STELLARIUM_BIND`   | `--bind`         |
//! | `STELLARIUM_PORT`   | `--port`         |
//! | `RCI_ADDRESS`       | `--rci-url`      |
//! | `RCI_PASSWORD`      | `--rci-password` |
//! | `RCI_CLIENT_NAME`   | `--client-name`  |

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stellarium_bridge::application::ControlService;
use stellarium_bridge::domain::BridgeConfig;
use stellarium_bridge::infrastructure::{run_server, ConfigFile, RciClient};
use stellarium_core::coords::{CoordinateTransform, SiderealTransform};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Stellarium telescope-server bridge for RCI-controlled mounts.
#[derive(Debug, Parser)]
#[command(
    name = "stellarium-bridge",
    about = "Bridges Stellarium's telescope protocol to an RCI control server",
    version
)]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// IP address for the Stellarium listener.
    #[arg(long, env = "STELLARIUM_BIND")]
    bind: Option<String>,

    /// TCP port Stellarium connects to.
    #[arg(long, env = "STELLARIUM_PORT")]
    port: Option<u16>,

    /// WebSocket URL of the RCI control server.
    #[arg(long, env = "RCI_ADDRESS")]
    rci_url: Option<String>,

    /// Password for the RCI control server.
    #[arg(long, env = "RCI_PASSWORD", hide_env_values = true)]
    rci_password: Option<String>,

    /// Client name reported to the RCI server.
    #[arg(long, env = "RCI_CLIENT_NAME")]
    client_name: Option<String>,

    /// Log filter used when `RUST_LOG` is not set (e.g. `debug`).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Layers the config file (if any) and then the flags over the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or the
    /// resulting listen address or queue capacity is invalid.
    fn into_bridge_config(self) -> anyhow::Result<BridgeConfig> {
        let mut file = match &self.config {
            Some(path) => ConfigFile::load(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?,
            None => ConfigFile::default(),
        };

        if let Some(bind) = self.bind {
            file.server.bind_address = bind;
        }
        if let Some(port) = self.port {
            file.server.port = port;
        }
        if let Some(url) = self.rci_url {
            file.rci.url = url;
        }
        if let Some(password) = self.rci_password {
            file.rci.password = Some(password);
        }
        if let Some(name) = self.client_name {
            file.rci.client_name = name;
        }
        if let Some(level) = self.log_level {
            file.logging.level = level;
        }

        file.into_bridge_config()
            .context("invalid bridge configuration")
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_bridge_config()?;

    // `RUST_LOG` wins; otherwise use the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "Stellarium bridge starting: listen={}, rci={}",
        config.listen_addr, config.rci_url
    );

    let control: Arc<dyn ControlService> = Arc::new(
        RciClient::connect(
            &config.rci_url,
            config.rci_password.as_deref(),
            &config.client_name,
        )
        .await?,
    );
    let transform: Arc<dyn CoordinateTransform> = Arc::new(SiderealTransform::new());

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, control, transform, running).await?;

    info!("Stellarium bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
