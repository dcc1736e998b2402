//! Construction of the supervisor's collaborators.
//!
//! The supervisor asks a [`ComponentFactory`] for each component at the point
//! in startup where it is needed, so tests can substitute scripted doubles
//! without touching the network or a serial device.

use crate::config::{Config, NetworkConfig, SerialConfig};
use crate::display::DisplayPublisher;
use crate::error::Result;
use crate::gateway::{ModbusTcpSession, TelemetryLink};
use crate::link::{NmcliBackend, WirelessBackend};
use crate::telemetry::{LiveSource, SourceMode, SyntheticSource, TelemetrySource};

/// Builds the collaborators for one supervisor
pub trait ComponentFactory {
    /// Wireless backend for the link manager (live mode only)
    fn link_backend(&mut self, config: &NetworkConfig) -> Box<dyn WirelessBackend>;

    /// Telemetry source for the selected mode
    fn telemetry_source(&mut self, mode: SourceMode, config: &Config) -> Box<dyn TelemetrySource>;

    /// Open the display publisher
    fn publisher(&mut self, config: &SerialConfig) -> Result<DisplayPublisher>;
}

/// Real hardware: NetworkManager, Modbus TCP and a UART
#[derive(Debug, Default)]
pub struct HostComponents;

impl ComponentFactory for HostComponents {
    fn link_backend(&mut self, config: &NetworkConfig) -> Box<dyn WirelessBackend> {
        Box::new(NmcliBackend::new(config.interface.clone()))
    }

    fn telemetry_source(&mut self, mode: SourceMode, config: &Config) -> Box<dyn TelemetrySource> {
        match mode {
            SourceMode::Synthetic => Box::new(SyntheticSource::new()),
            SourceMode::Live => {
                let session = ModbusTcpSession::from_config(&config.gateway);
                let link = TelemetryLink::new(
                    Box::new(session),
                    config.gateway.connect_timeout(),
                    config.gateway.read_timeout(),
                );
                Box::new(LiveSource::new(link, config.registers))
            }
        }
    }

    fn publisher(&mut self, config: &SerialConfig) -> Result<DisplayPublisher> {
        DisplayPublisher::open(config)
    }
}
