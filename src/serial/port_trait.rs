//! Trait abstraction for serial port operations to enable testing

use async_trait::async_trait;
use std::io;

/// Trait for serial port I/O operations
#[async_trait]
pub trait SerialPortIO: Send {
    /// Write `data` in a single call, returning how many bytes were accepted
    async fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Flush pending output and release the port
    async fn close(&mut self) -> io::Result<()>;
}

/// Wrapper around tokio_serial::SerialStream that implements SerialPortIO
pub struct TokioSerialPort {
    port: tokio_serial::SerialStream,
}

impl TokioSerialPort {
    pub fn new(port: tokio_serial::SerialStream) -> Self {
        Self { port }
    }
}

#[async_trait]
impl SerialPortIO for TokioSerialPort {
    async fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        use tokio::io::AsyncWriteExt;
        self.port.write(data).await
    }

    async fn close(&mut self) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.shutdown().await
    }
}
