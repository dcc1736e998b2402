//! # Live Telemetry Source
//!
//! Reads battery state from the gateway's input registers, one register per
//! field. A failed read leaves only that field empty. If the session drops
//! partway through a snapshot it is reopened once so the remaining fields
//! are still read.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::decode::{decode_current, decode_state_of_charge, decode_temperature, decode_voltage};
use super::{SourceMode, TelemetrySnapshot, TelemetrySource};
use crate::config::RegisterMap;
use crate::error::Result;
use crate::gateway::TelemetryLink;

/// Telemetry source reading registers through a [`TelemetryLink`]
#[derive(Debug)]
pub struct LiveSource {
    link: TelemetryLink,
    registers: RegisterMap,
    /// Set while a mid-snapshot reopen is still allowed
    reopen_pending: bool,
}

impl LiveSource {
    pub fn new(link: TelemetryLink, registers: RegisterMap) -> Self {
        Self {
            link,
            registers,
            reopen_pending: false,
        }
    }

    pub fn link(&self) -> &TelemetryLink {
        &self.link
    }

    /// First word of a single-register read
    async fn read_word(&mut self, address: u16) -> Option<u16> {
        if self.reopen_pending && !self.link.is_connected() {
            self.reopen_pending = false;
            warn!("Register session dropped, reopening before register {}", address);
            self.link.connect().await;
        }

        let words = self.link.read_register(address, 1).await?;
        let word = words.first().copied();
        if word.is_none() {
            debug!("Empty response for input register {}", address);
        }
        word
    }
}

#[async_trait]
impl TelemetrySource for LiveSource {
    fn mode(&self) -> SourceMode {
        SourceMode::Live
    }

    async fn connect(&mut self) -> bool {
        self.link.connect().await
    }

    fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    async fn read_snapshot(&mut self) -> Result<TelemetrySnapshot> {
        let regs = self.registers;
        // Only a drop during this snapshot is retried here; a session that
        // was already down is left to the caller
        self.reopen_pending = self.link.is_connected();

        let current = self.read_word(regs.current).await.map(decode_current);
        let voltage = self.read_word(regs.voltage).await.map(decode_voltage);
        let temperature = self.read_word(regs.temperature).await.map(decode_temperature);
        let state_of_charge = self
            .read_word(regs.state_of_charge)
            .await
            .map(decode_state_of_charge);

        Ok(TelemetrySnapshot::new(voltage, current, temperature, state_of_charge))
    }

    async fn close(&mut self) -> Result<()> {
        self.link.close().await;
        Ok(())
    }
}
