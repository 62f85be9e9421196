//! # OpenTherm 网关协议模块
//!
//! 处理 OTGW 文本状态协议：
//! - **分帧**：把任意分块的字节流重组为协议行（[`LineBuffer`]）
//! - **解析**：按固定词法解析报文（[`ProtocolMessage`]）
//! - **解码**：按数据 ID 表把报文映射为事件（[`decode`]）
//!
//! ## 数据流
//!
//! ```text
//! 传输层字节块
//!       │
//!       ▼
//! LineBuffer ──► "B40181400"
//!       │
//!       ▼
//! ProtocolMessage { source: Boiler, msg_type: ReadAck, id: 24, data: 0x1400 }
//!       │
//!       ▼
//! [Event { topic: "room_temperature", value: Float(20.0) }]
//! ```
//!
//! ## 报文格式
//!
//! ```text
//! B 4 0 18 1400
//! │ │ │ │  └─ 16 位数据
//! │ │ │ └──── 数据 ID
//! │ │ └────── 保留
//! │ └──────── 消息类型（最高位为奇偶校验，忽略）
//! └────────── 来源：B 锅炉 / T 温控器 / A 网关应答 / R 网关请求
//! ```

mod decoder;
mod framing;
mod types;

pub use decoder::{decode, decode_message};
pub use framing::{DEFAULT_MAX_LINE_LEN, LineBuffer};
pub use types::*;
