//! # Display Frame Encoder
//!
//! Text frames understood by the companion display. Each frame is one line
//! of `TAG:payload` terminated by `\n`; floats always carry exactly one
//! fractional digit.
//!
//! | Frame | Example |
//! |-------|---------|
//! | State of charge | `BATTERY:87\n` |
//! | Battery system | `BATSYS:51.2,-12.5,26.0\n` |
//! | Charging state | `CHARGING:1\n` |
//! | Link status | `WIFI:1\n` |
//! | Synthetic mode | `DEMO:0\n` |

/// Wireless link status as reported to the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Disconnected = 0,
    Connected = 1,
    /// No network in use (synthetic mode)
    Skipped = 2,
}

impl LinkStatus {
    pub fn from_connected(connected: bool) -> Self {
        if connected {
            LinkStatus::Connected
        } else {
            LinkStatus::Disconnected
        }
    }
}

/// `BATTERY:<0-100>`, clamped
pub fn encode_state_of_charge(soc: i32) -> String {
    format!("BATTERY:{}\n", soc.clamp(0, 100))
}

/// `BATSYS:<voltage>,<current>,<temperature>`
pub fn encode_battery_system(voltage: f64, current: f64, temperature: f64) -> String {
    format!("BATSYS:{:.1},{:.1},{:.1}\n", voltage, current, temperature)
}

/// `CHARGING:<0|1>`, any non-zero state is charging
pub fn encode_charging_state(state: u8) -> String {
    format!("CHARGING:{}\n", u8::from(state != 0))
}

/// `WIFI:<0|1|2>`
pub fn encode_link_status(status: LinkStatus) -> String {
    format!("WIFI:{}\n", status as u8)
}

/// `DEMO:<0|1>`
pub fn encode_source_mode(synthetic: bool) -> String {
    format!("DEMO:{}\n", u8::from(synthetic))
}
