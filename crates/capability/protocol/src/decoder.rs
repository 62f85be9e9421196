//! 报文解码
//!
//! 把一行协议报文映射为零到多个事件。纯函数，无 I/O，不会失败：
//! 无法识别的行只记 debug 日志并返回空结果。

use crate::types::{DecodeKind, FLAME_STATUS, ProtocolMessage, lookup};
use domain::Event;
use tracing::debug;

/// 状态字派生事件：(主题后缀, 位)
const FLAME_STATUS_BITS: [(&str, u16); 3] = [
    ("flame_status_ch", 1),
    ("flame_status_dhw", 2),
    ("flame_status_bit", 3),
];

/// 解码一行报文
pub fn decode(line: &str) -> Vec<Event> {
    let Some(message) = ProtocolMessage::parse(line) else {
        if !line.is_empty() {
            debug!(target: "otgw.protocol", line = %line, "line_not_understood");
        }
        return Vec::new();
    };
    decode_message(&message)
}

/// 解码已解析的报文
pub fn decode_message(message: &ProtocolMessage) -> Vec<Event> {
    if !message.source.is_decoded() || !message.msg_type.is_decoded() {
        return Vec::new();
    }
    let Some(identifier) = lookup(message.id) else {
        return Vec::new();
    };

    let data = message.data;
    match identifier.kind {
        DecodeKind::Flags => {
            let mut events = vec![Event::int(identifier.name, data)];
            if identifier.name == FLAME_STATUS {
                events.extend(
                    FLAME_STATUS_BITS
                        .iter()
                        .map(|&(topic, bit)| Event::flag(topic, data & (1 << bit) != 0)),
                );
            }
            events
        }
        DecodeKind::FixedPoint => vec![Event::float(identifier.name, fixed_point(data))],
        DecodeKind::Counter => vec![Event::int(identifier.name, data)],
    }
}

/// f8.8 定点数转浮点，保留两位小数（银行家舍入）
fn fixed_point(raw: u16) -> f64 {
    let value = f64::from(raw) / 256.0;
    (value * 100.0).round_ties_even() / 100.0
}
