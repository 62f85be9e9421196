//! telnet 传输实现
//!
//! 在 TCP 之上处理 telnet 控制序列：入站流中的 IAC 序列被剥离，
//! 对端的 DO/WILL 选项协商一律拒绝（WONT/DONT），子协商被跳过。
//! 序列可能跨越多次读取，因此过滤器保留状态。

use crate::error::TransportError;
use crate::tcp::connect;
use crate::transport::{Transport, read_chunk};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterState {
    Data,
    Iac,
    Negotiate(u8),
    Subnegotiation,
    SubnegotiationIac,
}

/// telnet 入站过滤器
#[derive(Debug)]
pub struct TelnetFilter {
    state: FilterState,
}

impl Default for TelnetFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl TelnetFilter {
    pub fn new() -> Self {
        Self {
            state: FilterState::Data,
        }
    }

    /// 过滤一块入站数据，返回 (应用数据, 需要回复给对端的协商字节)
    pub fn feed(&mut self, input: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut data = Vec::with_capacity(input.len());
        let mut replies = Vec::new();

        for &byte in input {
            self.state = match self.state {
                FilterState::Data if byte == IAC => FilterState::Iac,
                FilterState::Data => {
                    data.push(byte);
                    FilterState::Data
                }
                FilterState::Iac => match byte {
                    IAC => {
                        data.push(IAC);
                        FilterState::Data
                    }
                    DO | DONT | WILL | WONT => FilterState::Negotiate(byte),
                    SB => FilterState::Subnegotiation,
                    _ => FilterState::Data,
                },
                FilterState::Negotiate(command) => {
                    match command {
                        DO => replies.extend_from_slice(&[IAC, WONT, byte]),
                        WILL => replies.extend_from_slice(&[IAC, DONT, byte]),
                        _ => {}
                    }
                    FilterState::Data
                }
                FilterState::Subnegotiation if byte == IAC => FilterState::SubnegotiationIac,
                FilterState::Subnegotiation => FilterState::Subnegotiation,
                FilterState::SubnegotiationIac if byte == SE => FilterState::Data,
                FilterState::SubnegotiationIac => FilterState::Subnegotiation,
            };
        }

        (data, replies)
    }

    pub fn reset(&mut self) {
        self.state = FilterState::Data;
    }
}

/// 出站数据中的 0xFF 需要转义为 `IAC IAC`
pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(data.len());
    for &byte in data {
        escaped.push(byte);
        if byte == IAC {
            escaped.push(IAC);
        }
    }
    escaped
}

/// telnet 传输
pub struct TelnetTransport {
    host: String,
    port: u16,
    connect_timeout: Duration,
    stream: Option<TcpStream>,
    filter: TelnetFilter,
}

impl TelnetTransport {
    pub fn new(host: impl Into<String>, port: u16, connect_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout,
            stream: None,
            filter: TelnetFilter::new(),
        }
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[async_trait]
impl Transport for TelnetTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        let addr = self.address();
        info!(target: "otgw.gateway", "connecting via telnet to {}", addr);
        self.stream = Some(connect(&addr, self.connect_timeout).await?);
        self.filter.reset();
        info!(target: "otgw.gateway", "connecting via telnet to {} successful", addr);
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                warn!(target: "otgw.gateway", error = %e, "failed to close telnet connection");
            }
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        stream.write_all(&escape(data)).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn read(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        let chunk = read_chunk(stream, timeout).await?;
        let (data, replies) = self.filter.feed(&chunk);
        if !replies.is_empty() {
            debug!(target: "otgw.gateway", replies = ?replies, "refusing telnet options");
            stream.write_all(&replies).await?;
        }
        Ok(data)
    }

    fn describe(&self) -> String {
        format!("telnet:{}", self.address())
    }
}
