//! 串口传输实现
//!
//! 通过 USB/串口直连网关，固定 8N1，波特率可配置（OTGW 默认 9600）。

use crate::error::TransportError;
use crate::transport::{Transport, read_chunk};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::info;

/// 串口传输
pub struct SerialTransport {
    device: String,
    baudrate: u32,
    port: Option<SerialStream>,
}

impl SerialTransport {
    pub fn new(device: impl Into<String>, baudrate: u32) -> Self {
        Self {
            device: device.into(),
            baudrate,
            port: None,
        }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        info!(
            target: "otgw.gateway",
            device = %self.device,
            baudrate = self.baudrate,
            "opening serial port"
        );
        let port = tokio_serial::new(&self.device, self.baudrate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .open_native_async()
            .map_err(|e| TransportError::Connect(format!("{}: {}", self.device, e)))?;
        self.port = Some(port);
        Ok(())
    }

    async fn close(&mut self) {
        // 串口句柄在 drop 时释放
        self.port = None;
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotConnected)?;
        port.write_all(data).await?;
        port.flush().await?;
        Ok(())
    }

    async fn read(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotConnected)?;
        read_chunk(port, timeout).await
    }

    fn describe(&self) -> String {
        format!("serial:{}@{}", self.device, self.baudrate)
    }
}
