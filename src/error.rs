//! # Error Types
//!
//! Custom error types for Battery Relay using `thiserror`.

use thiserror::Error;

/// Main error type for Battery Relay
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// Wireless link backend errors
    #[error("Link error: {0}")]
    Link(String),

    /// Network association could not be established at startup
    #[error("Failed to join wireless network '{ssid}' within {timeout_s}s")]
    LinkUnavailable { ssid: String, timeout_s: u64 },

    /// Register session could not be opened at startup
    #[error("Failed to open register session with gateway at {address}")]
    GatewayUnavailable { address: String },

    /// Unexpected fault while producing telemetry
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

/// Result type alias for Battery Relay
pub type Result<T> = std::result::Result<T, BridgeError>;
