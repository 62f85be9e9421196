//! 网关错误类型定义

/// 传输层错误
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// 尚未打开
    #[error("transport not connected")]
    NotConnected,

    /// 建立连接失败
    #[error("connect failed: {0}")]
    Connect(String),

    /// 连接中断（对端关闭、设备拔出等）
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 网关客户端错误（调用方可见的状态错误）
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// 已在运行
    #[error("gateway client already running")]
    AlreadyRunning,

    /// 未在运行
    #[error("gateway client not running")]
    NotRunning,

    /// 不在 tokio 运行时内
    #[error("no tokio runtime available")]
    NoRuntime,

    /// 配置解析错误
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// 运行循环异常退出
    #[error("run loop terminated abnormally: {0}")]
    Join(String),
}

/// 事件监听器错误
#[derive(Debug, thiserror::Error)]
#[error("listener error: {0}")]
pub struct ListenerError(pub String);

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
