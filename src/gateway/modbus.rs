//! Modbus TCP implementation of [`RegisterSession`] using `tokio-modbus`.

use async_trait::async_trait;
use std::io;
use tokio::net::lookup_host;
use tokio_modbus::client::{tcp, Context, Reader};
use tokio_modbus::slave::Slave;
use tracing::debug;

use super::RegisterSession;
use crate::config::GatewayConfig;

/// Modbus TCP client session against a single unit on the gateway
pub struct ModbusTcpSession {
    host: String,
    port: u16,
    unit_id: u8,
    ctx: Option<Context>,
}

impl std::fmt::Debug for ModbusTcpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModbusTcpSession")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("unit_id", &self.unit_id)
            .field("open", &self.ctx.is_some())
            .finish()
    }
}

impl ModbusTcpSession {
    pub fn new(host: impl Into<String>, port: u16, unit_id: u8) -> Self {
        Self {
            host: host.into(),
            port,
            unit_id,
            ctx: None,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.host.clone(), config.port, config.unit_id)
    }

    fn context(&mut self) -> io::Result<&mut Context> {
        self.ctx
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "register session not open"))
    }
}

#[async_trait]
impl RegisterSession for ModbusTcpSession {
    fn peer(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn open(&mut self) -> io::Result<()> {
        let peer = self.peer();
        let socket_addr = lookup_host(peer.as_str()).await?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, format!("cannot resolve {}", peer))
        })?;

        debug!("Connecting to Modbus TCP unit {} at {}", self.unit_id, socket_addr);
        let ctx = tcp::connect_slave(socket_addr, Slave(self.unit_id)).await?;
        self.ctx = Some(ctx);
        Ok(())
    }

    async fn read_input_registers(&mut self, address: u16, count: u16) -> io::Result<Vec<u16>> {
        self.context()?.read_input_registers(address, count).await
    }

    async fn read_holding_registers(&mut self, address: u16, count: u16) -> io::Result<Vec<u16>> {
        self.context()?.read_holding_registers(address, count).await
    }

    async fn close(&mut self) -> io::Result<()> {
        match self.ctx.take() {
            Some(mut ctx) => ctx.disconnect().await,
            None => Ok(()),
        }
    }
}
