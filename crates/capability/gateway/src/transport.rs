//! 传输层抽象
//!
//! 网关客户端只依赖 [`Transport`] 的四个操作，具体的串口、TCP、telnet
//! 实现由 [`build`] 按配置构造。

use crate::error::{GatewayError, TransportError};
use crate::serial::SerialTransport;
use crate::tcp::TcpTransport;
use crate::telnet::TelnetTransport;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

/// 与网关设备之间的字节传输
#[async_trait]
pub trait Transport: Send {
    /// 建立连接，返回后即可读写
    async fn open(&mut self) -> Result<(), TransportError>;

    /// 释放连接；重复调用安全，错误只记日志
    async fn close(&mut self);

    /// 原样写出字节
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// 读取 `timeout` 内可用的字节，超时返回空；只有连接中断才返回错误
    async fn read(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    /// 为一条命令加上该传输要求的行结束符
    fn frame_command(&self, command: &str) -> Vec<u8> {
        let mut framed = command.trim_end_matches(['\r', '\n']).as_bytes().to_vec();
        framed.extend_from_slice(b"\r\n");
        framed
    }

    /// 日志中使用的描述（设备路径或地址）
    fn describe(&self) -> String;
}

/// 单次读取的最大字节数
pub(crate) const READ_CHUNK: usize = 128;

/// 在超时内读一块数据；超时返回空，流结束视为连接中断
pub(crate) async fn read_chunk<R>(reader: &mut R, timeout: Duration) -> Result<Vec<u8>, TransportError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = [0u8; READ_CHUNK];
    match tokio::time::timeout(timeout, reader.read(&mut buf)).await {
        Err(_) => Ok(Vec::new()),
        Ok(Ok(0)) => Err(TransportError::ConnectionLost(
            "stream closed by peer".to_string(),
        )),
        Ok(Ok(n)) => Ok(buf[..n].to_vec()),
        Ok(Err(e)) => Err(TransportError::Io(e)),
    }
}

/// 传输配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    /// 串口
    Serial {
        device: String,
        #[serde(default = "default_baudrate")]
        baudrate: u32,
    },
    /// 原始 TCP
    Tcp {
        host: String,
        #[serde(default = "default_port")]
        port: u16,
        #[serde(default = "default_connect_timeout")]
        connect_timeout_ms: u64,
    },
    /// telnet（TCP + 选项协商过滤）
    Telnet {
        host: String,
        #[serde(default = "default_port")]
        port: u16,
        #[serde(default = "default_connect_timeout")]
        connect_timeout_ms: u64,
    },
}

fn default_baudrate() -> u32 {
    9600
}

fn default_port() -> u16 {
    25238
}

fn default_connect_timeout() -> u64 {
    5000
}

impl TransportConfig {
    /// 从 JSON 配置字符串解析
    pub fn from_json(json: &str) -> Result<Self, GatewayError> {
        serde_json::from_str(json).map_err(|e| GatewayError::ConfigParse(e.to_string()))
    }
}

/// 按配置构造传输实例
pub fn build(config: &TransportConfig) -> Box<dyn Transport> {
    match config {
        TransportConfig::Serial { device, baudrate } => {
            Box::new(SerialTransport::new(device.clone(), *baudrate))
        }
        TransportConfig::Tcp {
            host,
            port,
            connect_timeout_ms,
        } => Box::new(TcpTransport::new(
            host.clone(),
            *port,
            Duration::from_millis(*connect_timeout_ms),
        )),
        TransportConfig::Telnet {
            host,
            port,
            connect_timeout_ms,
        } => Box::new(TelnetTransport::new(
            host.clone(),
            *port,
            Duration::from_millis(*connect_timeout_ms),
        )),
    }
}
