//! # Register Decoding
//!
//! Pure conversions from raw 16-bit input register words to engineering units.
//!
//! | Field | Register unit | Result |
//! |-------|---------------|--------|
//! | Voltage | 0.1 V, unsigned | volts |
//! | Current | 0.1 A, two's complement | amps, positive = charging |
//! | Temperature | 0.01 K, unsigned | °C, one decimal |
//! | State of charge | 1 %, unsigned | percent, capped at 100 |

/// Absolute zero offset for Kelvin to Celsius
const KELVIN_OFFSET: f64 = 273.15;

/// Reinterpret an unsigned register word as a two's-complement signed value
pub fn to_signed(raw: u16) -> i32 {
    let value = i32::from(raw);
    if value > 32767 {
        value - 65536
    } else {
        value
    }
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Battery voltage in volts
pub fn decode_voltage(raw: u16) -> f64 {
    f64::from(raw) / 10.0
}

/// Battery current in amps (signed)
///
/// ```
/// use battery_relay::telemetry::decode::decode_current;
///
/// assert_eq!(decode_current(1), 0.1);
/// assert_eq!(decode_current(65535), -0.1);
/// ```
pub fn decode_current(raw: u16) -> f64 {
    f64::from(to_signed(raw)) / 10.0
}

/// Battery temperature in °C, rounded to one decimal
pub fn decode_temperature(raw: u16) -> f64 {
    round1(f64::from(raw) / 100.0 - KELVIN_OFFSET)
}

/// State of charge in percent
pub fn decode_state_of_charge(raw: u16) -> u8 {
    raw.min(100) as u8
}
