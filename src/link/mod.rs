//! # Network Link Module
//!
//! Wireless association with the gateway's access point.
//!
//! This module handles:
//! - Joining the network with a bounded wait
//! - Idempotent disconnect
//! - Cheap connectivity checks for the poll loop
//! - Network scans for diagnostics
//!
//! The OS-facing half lives behind [`WirelessBackend`]; [`LinkManager`] owns
//! the connect/timeout policy and the connection state.

pub mod nmcli;

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::gateway::ConnectionState;

pub use nmcli::NmcliBackend;

/// Longest pause between readiness checks while joining a network
pub const ASSOCIATION_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A network seen during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub ssid: String,
    pub channel: u16,
    /// Signal quality, 0-100
    pub signal: u8,
}

/// Addressing of the joined network
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionInfo {
    pub address: Option<String>,
    pub gateway: Option<String>,
    pub dns: Option<String>,
}

/// OS wireless interface operations
#[async_trait]
pub trait WirelessBackend: Send {
    /// Ask the OS to join `ssid`. Returns once the request is issued, not
    /// once the network is joined.
    async fn request_association(&mut self, ssid: &str, password: &str) -> Result<()>;

    /// Whether the interface is currently joined. Must not block.
    fn is_associated(&self) -> bool;

    /// Leave the current network
    async fn disassociate(&mut self) -> Result<()>;

    /// List visible networks
    async fn scan(&mut self) -> Result<Vec<NetworkInfo>>;

    /// Address details of the joined network, if available
    async fn connection_info(&mut self) -> Option<ConnectionInfo>;
}

/// Wireless association lifecycle
pub struct LinkManager {
    backend: Box<dyn WirelessBackend>,
    state: ConnectionState,
}

impl std::fmt::Debug for LinkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkManager")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl LinkManager {
    pub fn new(backend: Box<dyn WirelessBackend>) -> Self {
        let state = if backend.is_associated() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        };
        Self { backend, state }
    }

    /// Last known connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Join `ssid`, waiting up to `timeout`
    ///
    /// Returns `true` immediately when already joined. On timeout the
    /// pending attempt is left as is and `false` is returned.
    pub async fn connect(&mut self, ssid: &str, password: &str, timeout: Duration) -> bool {
        if self.backend.is_associated() {
            info!("Already connected to wireless network");
            self.state = ConnectionState::Connected;
            self.log_connection_info().await;
            return true;
        }

        info!("Connecting to wireless network: {}", ssid);
        self.state = ConnectionState::Connecting;

        if let Err(e) = self.backend.request_association(ssid, password).await {
            warn!("Association request for '{}' failed: {}", ssid, e);
            self.state = ConnectionState::Disconnected;
            return false;
        }

        let start = Instant::now();
        while !self.backend.is_associated() {
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                warn!("Wireless connection timeout after {}s", timeout.as_secs());
                self.state = ConnectionState::Disconnected;
                return false;
            }
            debug!("Waiting for association ({}s elapsed)", elapsed.as_secs());
            sleep(ASSOCIATION_POLL_INTERVAL.min(timeout - elapsed)).await;
        }

        self.state = ConnectionState::Connected;
        info!("Wireless network connected after {:.1}s", start.elapsed().as_secs_f64());
        self.log_connection_info().await;
        true
    }

    /// Leave the network. No-op when neither joined nor joining.
    ///
    /// An association still in progress (a connect that was interrupted
    /// before it finished) is cancelled.
    pub async fn disconnect(&mut self) -> Result<()> {
        let joining = self.state == ConnectionState::Connecting;
        if !joining && !self.backend.is_associated() {
            self.state = ConnectionState::Disconnected;
            return Ok(());
        }

        let result = self.backend.disassociate().await;
        self.state = ConnectionState::Disconnected;
        if result.is_ok() {
            info!("Wireless network disconnected");
        }
        result
    }

    /// Non-blocking connectivity check
    ///
    /// Also records a detected drop in the tracked state.
    pub fn is_connected(&mut self) -> bool {
        let connected = self.backend.is_associated();
        if !connected && self.state == ConnectionState::Connected {
            self.state = ConnectionState::Disconnected;
        }
        connected
    }

    /// List visible networks, logging each one
    pub async fn scan(&mut self) -> Result<Vec<NetworkInfo>> {
        info!("Scanning for wireless networks...");
        let networks = self.backend.scan().await?;
        info!("Found {} networks", networks.len());
        for net in &networks {
            info!("  {:32} Channel: {:3} Signal: {:3}%", net.ssid, net.channel, net.signal);
        }
        Ok(networks)
    }

    async fn log_connection_info(&mut self) {
        if let Some(info) = self.backend.connection_info().await {
            let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
            info!("  IP Address:  {}", show(&info.address));
            info!("  Gateway:     {}", show(&info.gateway));
            info!("  DNS Server:  {}", show(&info.dns));
        }
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::error::BridgeError;
    use std::sync::{Arc, Mutex};

    /// Controllable wireless backend
    ///
    /// `associate_after` is the number of readiness checks after a request
    /// before the interface reports joined; `None` never joins.
    #[derive(Clone)]
    pub struct MockBackend {
        pub associated: Arc<Mutex<bool>>,
        pub associate_after: Arc<Mutex<Option<u32>>>,
        pub pending: Arc<Mutex<Option<u32>>>,
        pub requests: Arc<Mutex<u32>>,
        pub fail_disassociate: bool,
        pub events: Arc<Mutex<Vec<String>>>,
    }

    impl MockBackend {
        pub fn new(events: Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                associated: Arc::new(Mutex::new(false)),
                associate_after: Arc::new(Mutex::new(Some(0))),
                pending: Arc::new(Mutex::new(None)),
                requests: Arc::new(Mutex::new(0)),
                fail_disassociate: false,
                events,
            }
        }

        pub fn set_associated(&self, value: bool) {
            *self.associated.lock().unwrap() = value;
        }

        pub fn set_associate_after(&self, checks: Option<u32>) {
            *self.associate_after.lock().unwrap() = checks;
        }

        pub fn requests(&self) -> u32 {
            *self.requests.lock().unwrap()
        }
    }

    #[async_trait]
    impl WirelessBackend for MockBackend {
        async fn request_association(&mut self, _ssid: &str, _password: &str) -> Result<()> {
            self.events.lock().unwrap().push("link.request".to_string());
            *self.requests.lock().unwrap() += 1;
            *self.pending.lock().unwrap() = *self.associate_after.lock().unwrap();
            Ok(())
        }

        fn is_associated(&self) -> bool {
            let mut pending = self.pending.lock().unwrap();
            if let Some(remaining) = *pending {
                if remaining == 0 {
                    *pending = None;
                    *self.associated.lock().unwrap() = true;
                } else {
                    *pending = Some(remaining - 1);
                }
            }
            *self.associated.lock().unwrap()
        }

        async fn disassociate(&mut self) -> Result<()> {
            self.events.lock().unwrap().push("link.disconnect".to_string());
            *self.associated.lock().unwrap() = false;
            if self.fail_disassociate {
                return Err(BridgeError::Link("mock disassociate failure".to_string()));
            }
            Ok(())
        }

        async fn scan(&mut self) -> Result<Vec<NetworkInfo>> {
            Ok(vec![NetworkInfo {
                ssid: "venus-test".to_string(),
                channel: 6,
                signal: 72,
            }])
        }

        async fn connection_info(&mut self) -> Option<ConnectionInfo> {
            None
        }
    }
}
