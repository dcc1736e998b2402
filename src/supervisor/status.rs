//! Human-readable status line logged once per poll iteration.

use chrono::NaiveTime;

use crate::telemetry::{SourceMode, TelemetrySnapshot};

/// Render one status line, omitting fields that were not read
///
/// ```
/// use battery_relay::supervisor::status::render_status;
/// use battery_relay::telemetry::{SourceMode, TelemetrySnapshot};
/// use chrono::NaiveTime;
///
/// let snapshot = TelemetrySnapshot::new(Some(51.2), Some(-4.5), None, Some(80));
/// let time = NaiveTime::from_hms_opt(9, 5, 7).unwrap();
/// assert_eq!(
///     render_status(&snapshot, SourceMode::Live, time),
///     "[09:05:07] 51.2 V | 4.5 A (Discharging) | SOC 80% | Not Charging"
/// );
/// ```
pub fn render_status(snapshot: &TelemetrySnapshot, mode: SourceMode, time: NaiveTime) -> String {
    let mut fields = Vec::with_capacity(5);

    if let Some(voltage) = snapshot.voltage {
        fields.push(format!("{:.1} V", voltage));
    }
    if let Some(current) = snapshot.current {
        let direction = if current > 0.0 { "Charging" } else { "Discharging" };
        fields.push(format!("{:.1} A ({})", current.abs(), direction));
    }
    if let Some(temperature) = snapshot.temperature {
        fields.push(format!("{:.1} °C", temperature));
    }
    if let Some(soc) = snapshot.state_of_charge {
        fields.push(format!("SOC {}%", soc));
    }
    if let Some(state) = snapshot.charging_state() {
        fields.push(if state == 1 { "Charging" } else { "Not Charging" }.to_string());
    }

    let prefix = if mode.is_synthetic() { "[DEMO] " } else { "" };
    let body = if fields.is_empty() {
        "no battery data".to_string()
    } else {
        fields.join(" | ")
    };

    format!("{}[{}] {}", prefix, time.format("%H:%M:%S"), body)
}
