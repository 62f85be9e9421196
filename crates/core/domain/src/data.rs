use std::fmt;

/// 事件值的数据类型。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventValue {
    Bool(bool),
    Float(f64),
    Int(u16),
}

impl fmt::Display for EventValue {
    /// 渲染为消息总线负载文本。浮点数总是带小数部分（`20.0` 而不是 `20`）。
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{}", value),
            Self::Float(value) => write!(f, "{:?}", value),
            Self::Int(value) => write!(f, "{}", value),
        }
    }
}

/// 解码后的网关事件。
///
/// `topic` 只是主题后缀（如 `room_temperature`），命名空间由消费方在发布时拼接。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub topic: &'static str,
    pub value: EventValue,
}

impl Event {
    pub fn new(topic: &'static str, value: EventValue) -> Self {
        Self { topic, value }
    }

    pub fn flag(topic: &'static str, value: bool) -> Self {
        Self::new(topic, EventValue::Bool(value))
    }

    pub fn float(topic: &'static str, value: f64) -> Self {
        Self::new(topic, EventValue::Float(value))
    }

    pub fn int(topic: &'static str, value: u16) -> Self {
        Self::new(topic, EventValue::Int(value))
    }

    /// 在给定命名空间下的完整主题。
    pub fn topic_in(&self, namespace: &str) -> String {
        let namespace = namespace.trim_end_matches('/');
        if namespace.is_empty() {
            self.topic.to_string()
        } else {
            format!("{}/{}", namespace, self.topic)
        }
    }
}
