//! # Battery Relay
//!
//! Relay battery telemetry from a Modbus-TCP gateway to a serial display.
//!
//! This application joins the gateway's wireless network, polls the battery
//! registers, and cycles short text frames out to the display.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use battery_relay::config::{Config, LoggingConfig};
use battery_relay::link::{LinkManager, NmcliBackend};
use battery_relay::mode::select_mode;
use battery_relay::supervisor::{HostComponents, Supervisor};

/// Configuration used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// File name prefix for daily-rotated logs
const LOG_FILE_NAME: &str = "battery-relay.log";

#[derive(Parser, Debug)]
#[command(name = "battery-relay", version, about = "Relay battery telemetry to a serial display")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Use the synthetic telemetry generator instead of the gateway
    #[arg(long)]
    synthetic: bool,

    /// List visible wireless networks and exit
    #[arg(long)]
    scan: bool,
}

/// Main entry point for Battery Relay
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Parse the command line and load the configuration
///    - Set up logging (stdout, plus a daily file when `logging.dir` is set)
///    - Sample the mode select input once
///
/// 2. **Supervisor**
///    - Start the link, telemetry source and display publisher
///    - Poll until Ctrl+C or SIGTERM
///
/// 3. **Graceful Shutdown**
///    - Close the telemetry source, the display link and the network link
///
/// # Errors
///
/// Returns error if:
/// - The configuration cannot be loaded
/// - The wireless network or the gateway cannot be reached at startup
///
/// # Examples
///
/// ```bash
/// battery-relay config/default.toml
/// battery-relay --synthetic
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    let _log_guard = init_logging(&config.logging);
    info!("Battery Relay v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", cli.config.display());

    if cli.scan {
        let backend = NmcliBackend::new(config.network.interface.clone());
        LinkManager::new(Box::new(backend))
            .scan()
            .await
            .context("Wireless scan failed")?;
        return Ok(());
    }

    let mode = select_mode(cli.synthetic, &config.mode);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut components = HostComponents;
    let mut supervisor = tokio::select! {
        result = Supervisor::start(config, mode, &mut components) => {
            result.context("Startup failed")?
        }
        _ = &mut shutdown => {
            info!("Interrupted during startup");
            return Ok(());
        }
    };

    info!("Press Ctrl+C to exit");
    supervisor.run(shutdown).await;

    Ok(())
}

/// Install the tracing subscriber
///
/// `RUST_LOG` overrides `logging.level`. The returned guard flushes the
/// file writer on drop and must live until exit.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    match &config.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
            None
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        let cli = Cli::try_parse_from(["battery-relay"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(!cli.synthetic);
        assert!(!cli.scan);
    }

    #[test]
    fn test_config_path_and_flags() {
        let cli =
            Cli::try_parse_from(["battery-relay", "/etc/battery-relay.toml", "--synthetic"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/battery-relay.toml"));
        assert!(cli.synthetic);
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(Cli::try_parse_from(["battery-relay", "--demo"]).is_err());
    }

    #[test]
    fn test_shipped_config_is_valid() {
        // The default file must load as shipped
        let config = Config::load(DEFAULT_CONFIG_PATH).unwrap();
        assert_eq!(config.gateway.unit_id, 100);
        assert_eq!(config.registers.voltage, 840);
    }
}
