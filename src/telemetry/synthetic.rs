//! # Synthetic Telemetry Source
//!
//! Generates plausible, slowly changing battery data without any hardware.
//!
//! Each field is a deterministic function of the seconds elapsed since
//! [`connect`](SyntheticSource::connect), with a distinct period so the display
//! shows every value moving independently:
//!
//! | Field | Period | Range |
//! |-------|--------|-------|
//! | Voltage | 60 s | 48.0 - 52.0 V |
//! | Current | 120 s | +5..+25 A for 60 s, then -5..-15 A for 60 s |
//! | Temperature | 180 s | 25.0 - 30.0 °C |
//! | State of charge | 300 s | 20 - 95 % |

use async_trait::async_trait;
use std::f64::consts::PI;
use tokio::time::Instant;
use tracing::info;

use super::decode::round1;
use super::{SourceMode, TelemetrySnapshot, TelemetrySource};
use crate::error::Result;

const VOLTAGE_PERIOD_S: f64 = 60.0;
const CURRENT_PERIOD_S: f64 = 120.0;
const TEMPERATURE_PERIOD_S: f64 = 180.0;
const SOC_PERIOD_S: f64 = 300.0;

const SOC_MIN: f64 = 20.0;
const SOC_MAX: f64 = 95.0;

/// Synthetic voltage: 50 V ± 2 V
pub fn voltage_at(elapsed_s: f64) -> f64 {
    round1(50.0 + 2.0 * (elapsed_s * 2.0 * PI / VOLTAGE_PERIOD_S).sin())
}

/// Synthetic current: a charge half-cycle followed by a discharge half-cycle
pub fn current_at(elapsed_s: f64) -> f64 {
    let cycle_pos = elapsed_s.rem_euclid(CURRENT_PERIOD_S) / CURRENT_PERIOD_S;

    let current = if cycle_pos < 0.5 {
        15.0 + 10.0 * (cycle_pos * 4.0 * PI).sin()
    } else {
        -10.0 - 5.0 * ((cycle_pos - 0.5) * 4.0 * PI).sin()
    };

    round1(current)
}

/// Synthetic temperature: 27.5 °C ± 2.5 °C
pub fn temperature_at(elapsed_s: f64) -> f64 {
    round1(27.5 + 2.5 * (elapsed_s * 2.0 * PI / TEMPERATURE_PERIOD_S).sin())
}

/// Synthetic state of charge: slow drift clamped to 20-95 %
pub fn state_of_charge_at(elapsed_s: f64) -> u8 {
    let base = 57.5 + 37.5 * (elapsed_s * 2.0 * PI / SOC_PERIOD_S).sin();
    base.clamp(SOC_MIN, SOC_MAX) as u8
}

/// Full snapshot at a given elapsed time
pub fn snapshot_at(elapsed_s: f64) -> TelemetrySnapshot {
    TelemetrySnapshot::new(
        Some(voltage_at(elapsed_s)),
        Some(current_at(elapsed_s)),
        Some(temperature_at(elapsed_s)),
        Some(state_of_charge_at(elapsed_s)),
    )
}

/// Telemetry source backed by the synthetic generator
///
/// Reads before `connect()` or after `close()` yield an empty snapshot.
#[derive(Debug, Default)]
pub struct SyntheticSource {
    started: Option<Instant>,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds since `connect()`, or `None` while disconnected
    pub fn elapsed_s(&self) -> Option<f64> {
        self.started.map(|start| start.elapsed().as_secs_f64())
    }
}

#[async_trait]
impl TelemetrySource for SyntheticSource {
    fn mode(&self) -> SourceMode {
        SourceMode::Synthetic
    }

    async fn connect(&mut self) -> bool {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
        info!("Synthetic telemetry source started");
        true
    }

    fn is_connected(&self) -> bool {
        self.started.is_some()
    }

    async fn read_snapshot(&mut self) -> Result<TelemetrySnapshot> {
        Ok(self.elapsed_s().map(snapshot_at).unwrap_or_default())
    }

    async fn close(&mut self) -> Result<()> {
        if self.started.take().is_some() {
            info!("Synthetic telemetry source stopped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_values_at_zero() {
        let s = snapshot_at(0.0);
        assert_eq!(s.voltage, Some(50.0));
        assert_eq!(s.current, Some(15.0));
        assert_eq!(s.temperature, Some(27.5));
        assert_eq!(s.state_of_charge, Some(57));
        assert_eq!(s.charging_state(), Some(1));
    }

    #[test]
    fn test_values_at_30s() {
        let s = snapshot_at(30.0);
        assert_eq!(s.voltage, Some(50.0));
        assert_eq!(s.current, Some(15.0));
        assert_eq!(s.temperature, Some(29.7));
        assert_eq!(s.state_of_charge, Some(79));
    }

    #[test]
    fn test_values_at_60s() {
        let s = snapshot_at(60.0);
        assert_eq!(s.voltage, Some(50.0));
        assert_eq!(s.current, Some(-10.0));
        assert_eq!(s.temperature, Some(29.7));
        assert_eq!(s.state_of_charge, Some(93));
        assert_eq!(s.charging_state(), Some(0));
    }

    #[test]
    fn test_values_at_90s() {
        let s = snapshot_at(90.0);
        assert_eq!(s.voltage, Some(50.0));
        assert_eq!(s.current, Some(-10.0));
        assert_eq!(s.temperature, Some(27.5));
        assert_eq!(s.state_of_charge, Some(93));
    }

    #[test]
    fn test_values_at_120s() {
        let s = snapshot_at(120.0);
        assert_eq!(s.voltage, Some(50.0));
        assert_eq!(s.current, Some(15.0));
        assert_eq!(s.temperature, Some(25.3));
        assert_eq!(s.state_of_charge, Some(79));
    }

    #[test]
    fn test_current_phase_extremes() {
        assert_eq!(current_at(15.0), 25.0);
        assert_eq!(current_at(45.0), 5.0);
        assert_eq!(current_at(75.0), -15.0);
        assert_eq!(current_at(105.0), -5.0);
    }

    #[test]
    fn test_voltage_extremes() {
        assert_eq!(voltage_at(15.0), 52.0);
        assert_eq!(voltage_at(45.0), 48.0);
    }

    #[test]
    fn test_ranges_hold_over_full_cycle() {
        for tenth in 0..6000 {
            let t = tenth as f64 / 10.0;
            let s = snapshot_at(t);

            let v = s.voltage.unwrap();
            assert!((48.0..=52.0).contains(&v), "voltage {} at t={}", v, t);

            let c = s.current.unwrap();
            if (t % 120.0) < 60.0 {
                assert!((5.0..=25.0).contains(&c), "charge current {} at t={}", c, t);
            } else {
                assert!((-15.0..=-5.0).contains(&c), "discharge current {} at t={}", c, t);
            }

            let temp = s.temperature.unwrap();
            assert!((25.0..=30.0).contains(&temp), "temperature {} at t={}", temp, t);

            let soc = s.state_of_charge.unwrap();
            assert!((20..=95).contains(&soc), "soc {} at t={}", soc, t);

            assert_eq!(s.charging_state(), Some(u8::from(c > 0.0)));
        }
    }

    #[test]
    fn test_soc_rises_then_falls() {
        let rising: Vec<u8> = (0..=75).map(|t| state_of_charge_at(t as f64)).collect();
        assert!(rising.windows(2).all(|w| w[0] <= w[1]));

        let falling: Vec<u8> = (75..=225).map(|t| state_of_charge_at(t as f64)).collect();
        assert!(falling.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_soc_clamped_at_floor() {
        // Trough of the drift is 20.0 exactly at t = 225 s
        assert_eq!(state_of_charge_at(225.0), 20);
    }

    #[tokio::test]
    async fn test_read_before_connect_is_empty() {
        let mut source = SyntheticSource::new();
        let snapshot = source.read_snapshot().await.unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.charging_state(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_follows_elapsed_time() {
        let mut source = SyntheticSource::new();
        assert!(source.connect().await);

        tokio::time::advance(Duration::from_secs(60)).await;
        let snapshot = source.read_snapshot().await.unwrap();
        assert_eq!(snapshot, snapshot_at(60.0));
    }

    #[tokio::test]
    async fn test_close_stops_generator() {
        let mut source = SyntheticSource::new();
        source.connect().await;
        assert!(source.is_connected());
        source.close().await.unwrap();
        assert!(!source.is_connected());
        assert!(source.read_snapshot().await.unwrap().is_empty());
        assert_eq!(source.mode(), SourceMode::Synthetic);
    }
}
