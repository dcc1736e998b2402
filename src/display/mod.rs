//! # Display Publisher Module
//!
//! Sends battery data to the companion display over the one-way serial link.
//!
//! Every `send_*` call is independent: it validates its own input, formats a
//! single frame, and writes it once. Nothing is retried here; a failed frame
//! is simply counted and the caller moves on.

pub mod frame;

use std::fmt;
use tracing::{debug, info, warn};

use crate::config::SerialConfig;
use crate::error::Result;
use crate::serial::{self, SerialPortIO};

pub use frame::LinkStatus;

/// Transmission counters since process start
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PublisherStats {
    pub sent: u64,
    pub errors: u64,
}

impl PublisherStats {
    /// `errors / max(1, sent)`
    pub fn error_rate(&self) -> f64 {
        self.errors as f64 / self.sent.max(1) as f64
    }
}

impl fmt::Display for PublisherStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sent, {} errors ({:.1}% error rate)",
            self.sent,
            self.errors,
            self.error_rate() * 100.0
        )
    }
}

/// Frame publisher for the display link
pub struct DisplayPublisher {
    port: Option<Box<dyn SerialPortIO>>,
    label: String,
    stats: PublisherStats,
    debug_frames: bool,
}

impl fmt::Debug for DisplayPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayPublisher")
            .field("label", &self.label)
            .field("open", &self.port.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}

impl DisplayPublisher {
    /// Wrap an already-open port
    pub fn new(port: Box<dyn SerialPortIO>, label: impl Into<String>) -> Self {
        Self {
            port: Some(port),
            label: label.into(),
            stats: PublisherStats::default(),
            debug_frames: false,
        }
    }

    /// Open the configured serial device
    ///
    /// # Errors
    ///
    /// Returns error if the serial device cannot be opened
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = serial::open_port(&config.port, config.baud_rate)?;
        Ok(Self::new(Box::new(port), config.port.clone()).with_debug(config.debug))
    }

    /// Log every frame at info level
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug_frames = enabled;
        self
    }

    pub fn stats(&self) -> PublisherStats {
        self.stats
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Send `BATTERY:<soc>`. `None` is skipped.
    pub async fn send_state_of_charge(&mut self, soc: Option<i32>) -> bool {
        let Some(soc) = soc else {
            return self.skip("state of charge");
        };
        self.send_frame(frame::encode_state_of_charge(soc)).await
    }

    /// Send `BATSYS:<v>,<i>,<t>`. Skipped unless all three are present.
    pub async fn send_battery_system(
        &mut self,
        voltage: Option<f64>,
        current: Option<f64>,
        temperature: Option<f64>,
    ) -> bool {
        let (Some(v), Some(i), Some(t)) = (voltage, current, temperature) else {
            return self.skip("battery system");
        };
        self.send_frame(frame::encode_battery_system(v, i, t)).await
    }

    /// Send `CHARGING:<0|1>`. `None` is skipped.
    pub async fn send_charging_state(&mut self, state: Option<u8>) -> bool {
        let Some(state) = state else {
            return self.skip("charging state");
        };
        self.send_frame(frame::encode_charging_state(state)).await
    }

    /// Send `WIFI:<0|1|2>`
    pub async fn send_link_status(&mut self, status: LinkStatus) -> bool {
        self.send_frame(frame::encode_link_status(status)).await
    }

    /// Send `DEMO:<0|1>`
    pub async fn send_source_mode(&mut self, synthetic: bool) -> bool {
        self.send_frame(frame::encode_source_mode(synthetic)).await
    }

    fn skip(&self, what: &str) -> bool {
        debug!("Display: skipping send ({} unavailable)", what);
        false
    }

    /// Write one frame; success only if every byte is accepted in one call
    async fn send_frame(&mut self, message: String) -> bool {
        let Some(port) = self.port.as_mut() else {
            warn!("Display: port {} is closed, dropping {}", self.label, message.trim_end());
            return false;
        };

        let bytes = message.as_bytes();
        match port.write(bytes).await {
            Ok(written) if written == bytes.len() => {
                self.stats.sent += 1;
                if self.debug_frames {
                    info!("Display TX: {} ({} bytes)", message.trim_end(), written);
                }
                true
            }
            Ok(written) => {
                self.stats.errors += 1;
                warn!("Display: incomplete write ({}/{} bytes)", written, bytes.len());
                false
            }
            Err(e) => {
                self.stats.errors += 1;
                warn!("Display send error: {}", e);
                false
            }
        }
    }

    /// Log final counters and release the port
    pub async fn close(&mut self) -> Result<()> {
        let Some(mut port) = self.port.take() else {
            return Ok(());
        };

        info!("Display link {} closing: {}", self.label, self.stats);
        port.close().await?;
        Ok(())
    }
}
