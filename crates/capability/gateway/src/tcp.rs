//! TCP 传输实现
//!
//! 连接网关的原始 TCP 端口（如 ser2net 或 OTGW 固件自带的串口转发）。

use crate::error::TransportError;
use crate::transport::{Transport, read_chunk};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{info, warn};

/// TCP 传输
pub struct TcpTransport {
    host: String,
    port: u16,
    connect_timeout: Duration,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    pub fn new(host: impl Into<String>, port: u16, connect_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout,
            stream: None,
        }
    }

    pub(crate) fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 带超时建立 TCP 连接
pub(crate) async fn connect(addr: &str, timeout: Duration) -> Result<TcpStream, TransportError> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| TransportError::Connect(format!("timeout connecting to {}", addr)))?
        .map_err(|e| TransportError::Connect(format!("{}: {}", addr, e)))?;
    if let Err(e) = stream.set_nodelay(true) {
        warn!(target: "otgw.gateway", error = %e, "failed to set tcp nodelay");
    }
    Ok(stream)
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        let addr = self.address();
        info!(target: "otgw.gateway", "connecting to otgw at tcp {}", addr);
        self.stream = Some(connect(&addr, self.connect_timeout).await?);
        info!(target: "otgw.gateway", "connected to otgw at tcp {}", addr);
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                warn!(target: "otgw.gateway", error = %e, "failed to close tcp connection");
            }
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn read(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        read_chunk(stream, timeout).await
    }

    fn describe(&self) -> String {
        format!("tcp:{}", self.address())
    }
}
