//! 网关事件模型：协议层与消息总线之间共享的数据结构。

pub mod data;

pub use data::{Event, EventValue};
