//! # Serial Communication Module
//!
//! Opens the one-way UART link to the companion display.
//!
//! This module handles:
//! - Opening the serial device at the configured baud rate, 8-N-1
//! - The [`SerialPortIO`] seam used by the publisher and its tests

pub mod port_trait;

use tokio_serial::SerialPortBuilderExt;
use tracing::info;

use crate::error::{BridgeError, Result};

pub use port_trait::{SerialPortIO, TokioSerialPort};

/// Open a serial device with 8 data bits, no parity, 1 stop bit
///
/// # Errors
///
/// Returns `BridgeError::Serial` if the device cannot be opened
///
/// # Examples
///
/// ```no_run
/// use battery_relay::serial::open_port;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let port = open_port("/dev/ttyAMA0", 115200)?;
///     Ok(())
/// }
/// ```
pub fn open_port(path: &str, baud_rate: u32) -> Result<TokioSerialPort> {
    let port = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| BridgeError::Serial(format!("Failed to open {}: {}", path, e)))?;

    info!("Serial port {} opened at {} baud (8N1)", path, baud_rate);
    Ok(TokioSerialPort::new(port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_port_with_invalid_path_returns_error() {
        let result = open_port("/dev/nonexistent_serial_device_12345", 115200);

        match result {
            Err(BridgeError::Serial(msg)) => {
                assert!(msg.contains("/dev/nonexistent_serial_device_12345"));
                assert!(msg.contains("Failed to open"));
            }
            Err(other) => panic!("Expected Serial error, got: {:?}", other),
            Ok(_) => panic!("Expected Serial error, got an open port"),
        }
    }
}
