//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! The configuration is loaded once at startup and handed to each component
//! by reference. Every section and field has a default, so an empty file is a
//! valid (if not very useful) configuration.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub registers: RegisterMap,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub mode: ModeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Wireless network credentials
#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    #[serde(default = "default_ssid")]
    pub ssid: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_interface")]
    pub interface: String,

    #[serde(default = "default_network_timeout_s")]
    pub connect_timeout_s: u64,
}

/// Register gateway (Modbus TCP) connection settings
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    #[serde(default = "default_gateway_timeout_s")]
    pub connect_timeout_s: u64,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// Input register addresses, one register per field
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMap {
    #[serde(default = "default_voltage_register")]
    pub voltage: u16,

    #[serde(default = "default_current_register")]
    pub current: u16,

    #[serde(default = "default_temperature_register")]
    pub temperature: u16,

    #[serde(default = "default_soc_register")]
    pub state_of_charge: u16,
}

/// Display serial link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_enabled")]
    pub enabled: bool,

    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Log every transmitted frame
    #[serde(default)]
    pub debug: bool,
}

/// Loop cadence and backoff timings
#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval_s")]
    pub interval_s: u64,

    #[serde(default = "default_publish_interval_ms")]
    pub publish_interval_ms: u64,

    #[serde(default = "default_link_retry_s")]
    pub link_retry_s: u64,

    #[serde(default = "default_fault_backoff_s")]
    pub fault_backoff_s: u64,
}

/// Telemetry source selection
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ModeConfig {
    #[serde(default)]
    pub synthetic: bool,

    /// Digital input read once at startup. A value of `0` selects synthetic mode.
    #[serde(default)]
    pub select_path: Option<String>,
}

/// Log output configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily-rotated log files; stdout only when unset
    #[serde(default)]
    pub dir: Option<String>,
}

// Default value functions
fn default_ssid() -> String { "venus-gateway".to_string() }
fn default_interface() -> String { "wlan0".to_string() }
fn default_network_timeout_s() -> u64 { 30 }

fn default_gateway_host() -> String { "172.24.24.1".to_string() }
fn default_gateway_port() -> u16 { 502 }
fn default_unit_id() -> u8 { 100 }
fn default_gateway_timeout_s() -> u64 { 10 }
fn default_read_timeout_ms() -> u64 { 2000 }

fn default_voltage_register() -> u16 { 840 }
fn default_current_register() -> u16 { 841 }
fn default_temperature_register() -> u16 { 842 }
fn default_soc_register() -> u16 { 843 }

fn default_serial_enabled() -> bool { true }
fn default_serial_port() -> String { "/dev/ttyAMA0".to_string() }
fn default_baud_rate() -> u32 { 115200 }

fn default_poll_interval_s() -> u64 { 5 }
fn default_publish_interval_ms() -> u64 { 1000 }
fn default_link_retry_s() -> u64 { 10 }
fn default_fault_backoff_s() -> u64 { 5 }

fn default_log_level() -> String { "info".to_string() }

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ssid: default_ssid(),
            password: String::new(),
            interface: default_interface(),
            connect_timeout_s: default_network_timeout_s(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            unit_id: default_unit_id(),
            connect_timeout_s: default_gateway_timeout_s(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self {
            voltage: default_voltage_register(),
            current: default_current_register(),
            temperature: default_temperature_register(),
            state_of_charge: default_soc_register(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            enabled: default_serial_enabled(),
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            debug: false,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_s: default_poll_interval_s(),
            publish_interval_ms: default_publish_interval_ms(),
            link_retry_s: default_link_retry_s(),
            fault_backoff_s: default_fault_backoff_s(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

impl NetworkConfig {
    /// Association timeout as a `Duration`
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_s)
    }
}

impl GatewayConfig {
    /// `host:port` form used for logging and address resolution
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_s)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_s)
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }

    pub fn link_retry(&self) -> Duration {
        Duration::from_secs(self.link_retry_s)
    }

    pub fn fault_backoff(&self) -> Duration {
        Duration::from_secs(self.fault_backoff_s)
    }
}

fn invalid(msg: impl std::fmt::Display) -> BridgeError {
    BridgeError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use battery_relay::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.network.ssid.is_empty() {
            return Err(invalid("network ssid cannot be empty"));
        }

        if self.network.interface.is_empty() {
            return Err(invalid("network interface cannot be empty"));
        }

        if self.network.connect_timeout_s == 0 || self.network.connect_timeout_s > 300 {
            return Err(invalid("network connect_timeout_s must be between 1 and 300"));
        }

        if self.gateway.host.is_empty() {
            return Err(invalid("gateway host cannot be empty"));
        }

        if self.gateway.port == 0 {
            return Err(invalid("gateway port must be non-zero"));
        }

        if self.gateway.connect_timeout_s == 0 || self.gateway.connect_timeout_s > 120 {
            return Err(invalid("gateway connect_timeout_s must be between 1 and 120"));
        }

        if self.gateway.read_timeout_ms == 0 || self.gateway.read_timeout_ms > 60000 {
            return Err(invalid("gateway read_timeout_ms must be between 1 and 60000"));
        }

        let regs = [
            self.registers.voltage,
            self.registers.current,
            self.registers.temperature,
            self.registers.state_of_charge,
        ];
        for (i, a) in regs.iter().enumerate() {
            if regs[i + 1..].contains(a) {
                return Err(invalid(format!("register address {} is mapped more than once", a)));
            }
        }

        if self.serial.enabled && self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty when enabled"));
        }

        if ![9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600].contains(&self.serial.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600",
            ));
        }

        if self.polling.interval_s == 0 || self.polling.interval_s > 3600 {
            return Err(invalid("polling interval_s must be between 1 and 3600"));
        }

        if self.polling.publish_interval_ms == 0 || self.polling.publish_interval_ms > 60000 {
            return Err(invalid("polling publish_interval_ms must be between 1 and 60000"));
        }

        if self.polling.link_retry_s == 0 || self.polling.link_retry_s > 3600 {
            return Err(invalid("polling link_retry_s must be between 1 and 3600"));
        }

        if self.polling.fault_backoff_s == 0 || self.polling.fault_backoff_s > 3600 {
            return Err(invalid("polling fault_backoff_s must be between 1 and 3600"));
        }

        if let Some(path) = &self.mode.select_path {
            if path.is_empty() {
                return Err(invalid("mode select_path cannot be empty when set"));
            }
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("logging level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}
