//! # Telemetry Module
//!
//! Battery telemetry acquisition.
//!
//! This module handles:
//! - The per-cycle [`TelemetrySnapshot`] value
//! - The [`TelemetrySource`] capability shared by the live and synthetic sources
//! - Decoding raw register words into engineering units

pub mod decode;
pub mod live;
pub mod synthetic;

use async_trait::async_trait;
use std::fmt;

use crate::error::Result;

pub use live::LiveSource;
pub use synthetic::SyntheticSource;

/// Where telemetry comes from for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// Register reads from the gateway over the wireless link
    Live,
    /// Deterministic time-based generator, no network
    Synthetic,
}

impl SourceMode {
    pub fn is_synthetic(self) -> bool {
        matches!(self, SourceMode::Synthetic)
    }
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceMode::Live => write!(f, "live"),
            SourceMode::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// One poll cycle's worth of battery state
///
/// Every field is independently optional: a failed read of one register
/// never hides the others. The charging state is not stored; it is always
/// derived from `current` of the same snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetrySnapshot {
    /// Battery voltage in volts
    pub voltage: Option<f64>,
    /// Battery current in amps, positive while charging
    pub current: Option<f64>,
    /// Battery temperature in °C
    pub temperature: Option<f64>,
    /// State of charge, 0-100 %
    pub state_of_charge: Option<u8>,
}

impl TelemetrySnapshot {
    pub fn new(
        voltage: Option<f64>,
        current: Option<f64>,
        temperature: Option<f64>,
        state_of_charge: Option<u8>,
    ) -> Self {
        Self {
            voltage,
            current,
            temperature,
            state_of_charge,
        }
    }

    /// `Some(1)` while charging (`current > 0`), `Some(0)` otherwise,
    /// `None` when the current is unknown.
    pub fn charging_state(&self) -> Option<u8> {
        self.current.map(charging_state_from_current)
    }

    /// True when no field could be read this cycle
    pub fn is_empty(&self) -> bool {
        self.voltage.is_none()
            && self.current.is_none()
            && self.temperature.is_none()
            && self.state_of_charge.is_none()
    }
}

/// Positive current means the battery is charging. Zero is not charging.
pub fn charging_state_from_current(current: f64) -> u8 {
    if current > 0.0 {
        1
    } else {
        0
    }
}

/// Capability shared by every telemetry source
///
/// Expected failures (unreachable gateway, failed register read) are reported
/// as `false` or as absent snapshot fields. An `Err` from
/// [`read_snapshot`](TelemetrySource::read_snapshot) means something
/// unanticipated happened and the caller should abandon the current cycle.
#[async_trait]
pub trait TelemetrySource: Send {
    /// Which kind of source this is
    fn mode(&self) -> SourceMode;

    /// Open (or re-open) the underlying data session
    async fn connect(&mut self) -> bool;

    /// Whether the data session is currently open
    fn is_connected(&self) -> bool;

    /// Read the current battery state
    async fn read_snapshot(&mut self) -> Result<TelemetrySnapshot>;

    /// Release the data session
    async fn close(&mut self) -> Result<()>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charging_state_positive_current() {
        let snapshot = TelemetrySnapshot::new(None, Some(0.1), None, None);
        assert_eq!(snapshot.charging_state(), Some(1));
    }

    #[test]
    fn test_charging_state_zero_current_is_not_charging() {
        let snapshot = TelemetrySnapshot::new(None, Some(0.0), None, None);
        assert_eq!(snapshot.charging_state(), Some(0));
    }

    #[test]
    fn test_charging_state_negative_current() {
        let snapshot = TelemetrySnapshot::new(Some(50.0), Some(-12.5), None, None);
        assert_eq!(snapshot.charging_state(), Some(0));
    }

    #[test]
    fn test_charging_state_absent_without_current() {
        let snapshot = TelemetrySnapshot::new(Some(50.0), None, Some(25.0), Some(70));
        assert_eq!(snapshot.charging_state(), None);
    }

    #[test]
    fn test_is_empty() {
        assert!(TelemetrySnapshot::default().is_empty());
        assert!(!TelemetrySnapshot::new(None, None, None, Some(1)).is_empty());
    }

    #[test]
    fn test_source_mode_display() {
        assert_eq!(SourceMode::Live.to_string(), "live");
        assert_eq!(SourceMode::Synthetic.to_string(), "synthetic");
        assert!(SourceMode::Synthetic.is_synthetic());
        assert!(!SourceMode::Live.is_synthetic());
    }
}
