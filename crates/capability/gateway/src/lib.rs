//! # OTGW 网关客户端模块
//!
//! 负责与 OpenTherm 网关设备通信：
//! - **传输层**：[`Transport`] 抽象，提供串口、TCP、telnet 三种实现
//! - **客户端**：[`GatewayClient`] 在独立任务中运行收发循环，
//!   分帧、解码后把事件交给 [`EventListener`]，断线后自动重连
//!
//! ## 架构设计
//!
//! ```text
//! TransportConfig
//!       │ transport::build
//!       ▼
//! Box<dyn Transport> ──► GatewayClient ──► EventListener（如 MQTT 发布）
//!                             ▲
//!                             │ send("CH=1")
//!                          调用方
//! ```
//!
//! ## 配置格式
//!
//! ```json
//! { "type": "serial", "device": "/dev/ttyUSB0", "baudrate": 9600 }
//! { "type": "tcp", "host": "192.168.1.50", "port": 25238 }
//! { "type": "telnet", "host": "192.168.1.50", "port": 23 }
//! ```

mod client;
mod error;
mod serial;
mod tcp;
mod telnet;
pub mod transport;

pub use client::{EventListener, GatewayClient, GatewayClientConfig, RunState};
pub use error::{GatewayError, ListenerError, TransportError};
pub use serial::SerialTransport;
pub use tcp::TcpTransport;
pub use telnet::{TelnetFilter, TelnetTransport};
pub use transport::{Transport, TransportConfig};
