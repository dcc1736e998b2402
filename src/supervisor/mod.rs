//! # Polling Supervisor
//!
//! The long-running control loop that keeps the wireless link, the register
//! session and the display link alive and moves telemetry from one end to the
//! other.
//!
//! # Control Flow
//!
//! 1. **Startup** (each step must succeed before the next starts)
//!    - Live mode: drop any stale association, join the network
//!    - Open the telemetry source
//!    - Open the display publisher (optional; failure only disables it)
//!
//! 2. **Polling** (forever)
//!    - Live mode: restore the network link and the register session if
//!      either dropped
//!    - Read one snapshot and log the status line
//!    - Dispatch one message from the rotation
//!    - Sleep 1 s when publishing, otherwise the poll interval
//!
//! 3. **Shutdown** (on operator interrupt)
//!    - Close the telemetry source, then the publisher, then the link
//!
//! A fault inside one iteration is logged, followed by a single backoff
//! sleep, and the loop carries on. Only the shutdown signal ends it.

pub mod components;
pub mod rotation;
pub mod status;

use chrono::Local;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::display::{DisplayPublisher, LinkStatus, PublisherStats};
use crate::error::{BridgeError, Result};
use crate::link::LinkManager;
use crate::telemetry::{SourceMode, TelemetrySource};

pub use components::{ComponentFactory, HostComponents};
pub use rotation::{MessageSlot, Rotation, SlotContext, SLOT_TABLE};

/// Supervisor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Init,
    LinkConnecting,
    TelemetryConnecting,
    PublisherInit,
    Polling,
    ShuttingDown,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SupervisorState::Init => "init",
            SupervisorState::LinkConnecting => "link connecting",
            SupervisorState::TelemetryConnecting => "telemetry connecting",
            SupervisorState::PublisherInit => "publisher init",
            SupervisorState::Polling => "polling",
            SupervisorState::ShuttingDown => "shutting down",
        };
        f.write_str(name)
    }
}

fn enter(state: SupervisorState) -> SupervisorState {
    debug!("Supervisor state: {}", state);
    state
}

/// Owner of every collaborator and of the poll loop
pub struct Supervisor {
    config: Config,
    mode: SourceMode,
    state: SupervisorState,
    /// `None` in synthetic mode
    link: Option<LinkManager>,
    source: Box<dyn TelemetrySource>,
    /// `None` when disabled or when the port failed to open
    publisher: Option<DisplayPublisher>,
    rotation: Rotation,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("link", &self.link)
            .field("publisher", &self.publisher)
            .field("rotation", &self.rotation)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    /// Bring up every collaborator in order
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The wireless network cannot be joined (live mode)
    /// - The telemetry source cannot be opened; the link is released first
    ///
    /// A display port that fails to open is not an error: publishing is
    /// disabled and polling continues without it.
    pub async fn start(
        config: Config,
        mode: SourceMode,
        factory: &mut dyn ComponentFactory,
    ) -> Result<Self> {
        enter(SupervisorState::Init);
        info!("Starting supervisor in {} mode", mode);

        let mut link = None;
        if !mode.is_synthetic() {
            enter(SupervisorState::LinkConnecting);
            let net = &config.network;
            let mut manager = LinkManager::new(factory.link_backend(net));

            if let Err(e) = manager.disconnect().await {
                warn!("Failed to drop stale wireless association: {}", e);
            }

            if !manager.connect(&net.ssid, &net.password, net.connect_timeout()).await {
                error!("Failed to connect to wireless network '{}'", net.ssid);
                return Err(BridgeError::LinkUnavailable {
                    ssid: net.ssid.clone(),
                    timeout_s: net.connect_timeout_s,
                });
            }
            link = Some(manager);
        }

        enter(SupervisorState::TelemetryConnecting);
        let mut source = factory.telemetry_source(mode, &config);
        if !source.connect().await {
            if let Some(manager) = link.as_mut() {
                if let Err(e) = manager.disconnect().await {
                    warn!("Failed to disconnect wireless network: {}", e);
                }
            }
            return Err(match mode {
                SourceMode::Live => BridgeError::GatewayUnavailable {
                    address: config.gateway.address(),
                },
                SourceMode::Synthetic => {
                    BridgeError::Telemetry("synthetic source failed to start".to_string())
                }
            });
        }
        info!("Telemetry source ready ({})", mode);

        let state = enter(SupervisorState::PublisherInit);
        let publisher = if config.serial.enabled {
            match factory.publisher(&config.serial) {
                Ok(publisher) => {
                    info!("Display publishing enabled on {}", config.serial.port);
                    Some(publisher)
                }
                Err(e) => {
                    warn!("Display publishing disabled: {}", e);
                    None
                }
            }
        } else {
            info!("Display publishing disabled in configuration");
            None
        };

        Ok(Self {
            config,
            mode,
            state,
            link,
            source,
            publisher,
            rotation: Rotation::new(),
        })
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn mode(&self) -> SourceMode {
        self.mode
    }

    pub fn is_publishing(&self) -> bool {
        self.publisher.is_some()
    }

    pub fn publisher_stats(&self) -> Option<PublisherStats> {
        self.publisher.as_ref().map(DisplayPublisher::stats)
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Poll until `shutdown` completes, then shut down in order
    ///
    /// The shutdown future is raced against every iteration and every
    /// sleep, so an interrupt during a slow connect or read is honored
    /// without waiting for it to finish.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.state = enter(SupervisorState::Polling);
        info!("Polling started");

        loop {
            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                outcome = self.iterate() => outcome,
            };

            let pause = match outcome {
                Ok(pause) => pause,
                Err(e) => {
                    let backoff = self.config.polling.fault_backoff();
                    error!("Poll iteration failed: {} (retrying in {}s)", e, backoff.as_secs());
                    backoff
                }
            };

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = sleep(pause) => {}
            }
        }

        info!("Shutdown requested");
        self.shutdown().await;
    }

    /// One pass of the poll loop
    ///
    /// Returns how long to sleep before the next pass. An `Err` means the
    /// pass was abandoned and the caller should back off.
    pub async fn iterate(&mut self) -> Result<Duration> {
        if let Some(link) = self.link.as_mut() {
            let retry = self.config.polling.link_retry();

            if !link.is_connected() {
                let net = &self.config.network;
                warn!("Wireless link lost, reconnecting to '{}'", net.ssid);

                if !link.connect(&net.ssid, &net.password, net.connect_timeout()).await {
                    warn!("Wireless reconnect failed, retrying in {}s", retry.as_secs());
                    return Ok(retry);
                }
                if !self.source.connect().await {
                    warn!(
                        "Failed to reopen session with gateway at {}, retrying in {}s",
                        self.config.gateway.address(),
                        retry.as_secs()
                    );
                    return Ok(retry);
                }
                info!("Upstream links restored");
            } else if !self.source.is_connected() {
                // Network is up but the register session dropped
                warn!("Session with gateway at {} lost, reopening", self.config.gateway.address());
                if !self.source.connect().await {
                    warn!("Failed to reopen gateway session, retrying in {}s", retry.as_secs());
                    return Ok(retry);
                }
                info!("Gateway session restored");
            }
        }

        let snapshot = self.source.read_snapshot().await?;
        info!("{}", status::render_status(&snapshot, self.mode, Local::now().time()));

        let Some(publisher) = self.publisher.as_mut() else {
            return Ok(self.config.polling.interval());
        };

        let link_status = match self.link.as_mut() {
            Some(link) => LinkStatus::from_connected(link.is_connected()),
            None => LinkStatus::Skipped,
        };
        let ctx = SlotContext {
            snapshot: &snapshot,
            link_status,
            synthetic: self.mode.is_synthetic(),
        };

        let slot = self.rotation.current();
        if !slot.dispatch(publisher, &ctx).await {
            warn!("Display: {} not sent", slot);
        }
        self.rotation.advance();

        Ok(self.config.polling.publish_interval())
    }

    /// Release everything in order: telemetry source, publisher, link
    ///
    /// Every step runs even when an earlier one fails.
    pub async fn shutdown(&mut self) {
        self.state = enter(SupervisorState::ShuttingDown);

        if let Err(e) = self.source.close().await {
            warn!("Failed to close telemetry source: {}", e);
        }

        if let Some(publisher) = self.publisher.as_mut() {
            if let Err(e) = publisher.close().await {
                warn!("Failed to close display publisher: {}", e);
            }
        }

        if let Some(link) = self.link.as_mut() {
            if let Err(e) = link.disconnect().await {
                warn!("Failed to disconnect wireless network: {}", e);
            }
        }

        info!("Shutdown complete");
    }
}
