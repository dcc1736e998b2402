//! # Gateway Module
//!
//! Register session with the battery management gateway.
//!
//! This module handles:
//! - Opening the Modbus TCP session over an already-joined network
//! - Reading input and holding registers with a bounded timeout
//! - Translating every transport failure into "no data" for the caller
//!
//! [`TelemetryLink`] is the only type the rest of the crate talks to; the
//! wire protocol lives behind the [`RegisterSession`] trait.

pub mod modbus;

use async_trait::async_trait;
use std::fmt;
use std::io;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub use modbus::ModbusTcpSession;

/// Lifecycle state shared by the network link and the register session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(label)
    }
}

/// Register-level transport to the gateway
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegisterSession: Send {
    /// Human-readable peer address for logs
    fn peer(&self) -> String;

    /// Open the session
    async fn open(&mut self) -> io::Result<()>;

    /// Read `count` input registers (function 0x04) starting at `address`
    async fn read_input_registers(&mut self, address: u16, count: u16) -> io::Result<Vec<u16>>;

    /// Read `count` holding registers (function 0x03) starting at `address`
    async fn read_holding_registers(&mut self, address: u16, count: u16) -> io::Result<Vec<u16>>;

    /// Drop the session
    async fn close(&mut self) -> io::Result<()>;
}

/// Register session lifecycle on top of a connected network link
///
/// All read failures (timeout, dropped connection, exception response,
/// not connected) come back as `None` after being logged.
pub struct TelemetryLink {
    session: Box<dyn RegisterSession>,
    state: ConnectionState,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl fmt::Debug for TelemetryLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryLink")
            .field("peer", &self.session.peer())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl TelemetryLink {
    pub fn new(
        session: Box<dyn RegisterSession>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Self {
        Self {
            session,
            state: ConnectionState::Disconnected,
            connect_timeout,
            read_timeout,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Open the register session
    ///
    /// An existing session is dropped first, so this doubles as reconnect.
    /// Returns `false` on failure or timeout; never returns an error.
    pub async fn connect(&mut self) -> bool {
        if self.state == ConnectionState::Connected {
            self.close().await;
        }

        let peer = self.session.peer();
        self.state = ConnectionState::Connecting;
        debug!("Opening register session with {}", peer);

        match timeout(self.connect_timeout, self.session.open()).await {
            Ok(Ok(())) => {
                self.state = ConnectionState::Connected;
                info!("Connected to gateway at {}", peer);
                true
            }
            Ok(Err(e)) => {
                self.state = ConnectionState::Disconnected;
                warn!("Failed to connect to gateway at {}: {}", peer, e);
                false
            }
            Err(_) => {
                self.state = ConnectionState::Disconnected;
                warn!(
                    "Connection to gateway at {} timed out after {:?}",
                    peer, self.connect_timeout
                );
                false
            }
        }
    }

    /// Read input registers, `None` on any failure
    pub async fn read_register(&mut self, address: u16, count: u16) -> Option<Vec<u16>> {
        if !self.is_connected() {
            debug!("Skipping read of input register {}: session not connected", address);
            return None;
        }

        let result = timeout(
            self.read_timeout,
            self.session.read_input_registers(address, count),
        )
        .await;
        self.finish_read("input", address, result)
    }

    /// Read holding registers, `None` on any failure
    pub async fn read_holding_register(&mut self, address: u16, count: u16) -> Option<Vec<u16>> {
        if !self.is_connected() {
            debug!("Skipping read of holding register {}: session not connected", address);
            return None;
        }

        let result = timeout(
            self.read_timeout,
            self.session.read_holding_registers(address, count),
        )
        .await;
        self.finish_read("holding", address, result)
    }

    fn finish_read(
        &mut self,
        kind: &str,
        address: u16,
        result: std::result::Result<io::Result<Vec<u16>>, tokio::time::error::Elapsed>,
    ) -> Option<Vec<u16>> {
        match result {
            Ok(Ok(words)) => Some(words),
            Ok(Err(e)) => {
                warn!("Error reading {} register {}: {}", kind, address, e);
                if is_connection_lost(&e) {
                    self.state = ConnectionState::Disconnected;
                }
                None
            }
            Err(_) => {
                warn!(
                    "Timed out reading {} register {} after {:?}",
                    kind, address, self.read_timeout
                );
                None
            }
        }
    }

    /// Close the session. Idempotent.
    pub async fn close(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        if let Err(e) = self.session.close().await {
            debug!("Error while closing register session: {}", e);
        }
        self.state = ConnectionState::Disconnected;
        info!("Disconnected from gateway at {}", self.session.peer());
    }
}

fn is_connection_lost(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    fn link_with(session: MockRegisterSession) -> TelemetryLink {
        TelemetryLink::new(
            Box::new(session),
            Duration::from_secs(10),
            Duration::from_secs(2),
        )
    }

    fn session() -> MockRegisterSession {
        let mut session = MockRegisterSession::new();
        session.expect_peer().return_const("172.24.24.1:502".to_string());
        session
    }

    #[tokio::test]
    async fn test_connect_success() {
        let mut session = session();
        session.expect_open().times(1).returning(|| Ok(()));

        let mut link = link_with(session);
        assert_eq!(link.state(), ConnectionState::Disconnected);
        assert!(link.connect().await);
        assert_eq!(link.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported_not_raised() {
        let mut session = session();
        session
            .expect_open()
            .returning(|| Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")));

        let mut link = link_with(session);
        assert!(!link.connect().await);
        assert_eq!(link.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_read_when_not_connected_is_absent() {
        let mut session = session();
        session.expect_read_input_registers().never();

        let mut link = link_with(session);
        assert_eq!(link.read_register(840, 1).await, None);
    }

    #[tokio::test]
    async fn test_read_returns_words() {
        let mut session = session();
        session.expect_open().returning(|| Ok(()));
        session
            .expect_read_input_registers()
            .with(eq(841), eq(1))
            .times(1)
            .returning(|_, _| Ok(vec![65535]));

        let mut link = link_with(session);
        link.connect().await;
        assert_eq!(link.read_register(841, 1).await, Some(vec![65535]));
    }

    #[tokio::test]
    async fn test_read_error_is_absent() {
        let mut session = session();
        session.expect_open().returning(|| Ok(()));
        session
            .expect_read_input_registers()
            .returning(|_, _| Err(io::Error::new(io::ErrorKind::InvalidData, "exception 0x02")));

        let mut link = link_with(session);
        link.connect().await;
        assert_eq!(link.read_register(843, 1).await, None);
        // A protocol error does not tear down the session
        assert!(link.is_connected());
    }

    #[tokio::test]
    async fn test_broken_connection_marks_disconnected() {
        let mut session = session();
        session.expect_open().returning(|| Ok(()));
        session
            .expect_read_input_registers()
            .returning(|_, _| Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe")));

        let mut link = link_with(session);
        link.connect().await;
        assert_eq!(link.read_register(840, 1).await, None);
        assert_eq!(link.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_holding_register_read() {
        let mut session = session();
        session.expect_open().returning(|| Ok(()));
        session
            .expect_read_holding_registers()
            .with(eq(800), eq(6))
            .returning(|_, count| Ok(vec![0; count as usize]));

        let mut link = link_with(session);
        link.connect().await;
        assert_eq!(link.read_holding_register(800, 6).await.map(|w| w.len()), Some(6));
    }

    #[tokio::test]
    async fn test_reconnect_closes_previous_session() {
        let mut session = session();
        session.expect_open().times(2).returning(|| Ok(()));
        session.expect_close().times(1).returning(|| Ok(()));

        let mut link = link_with(session);
        assert!(link.connect().await);
        assert!(link.connect().await);
        assert!(link.is_connected());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut session = session();
        session.expect_open().returning(|| Ok(()));
        session.expect_close().times(1).returning(|| Ok(()));

        let mut link = link_with(session);
        link.connect().await;
        link.close().await;
        link.close().await;
        assert_eq!(link.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
    }
}
