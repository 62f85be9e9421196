//! 日志初始化与网关运行指标。

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

/// 网关指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connects: u64,
    pub connect_failures: u64,
    pub connection_losses: u64,
    pub lines_received: u64,
    pub lines_ignored: u64,
    pub events_dispatched: u64,
    pub listener_failures: u64,
    pub commands_sent: u64,
    pub commands_dropped: u64,
}

/// 网关指标（每个客户端一份）。
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    connects: AtomicU64,
    connect_failures: AtomicU64,
    connection_losses: AtomicU64,
    lines_received: AtomicU64,
    lines_ignored: AtomicU64,
    events_dispatched: AtomicU64,
    listener_failures: AtomicU64,
    commands_sent: AtomicU64,
    commands_dropped: AtomicU64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connects: self.connects.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            connection_losses: self.connection_losses.load(Ordering::Relaxed),
            lines_received: self.lines_received.load(Ordering::Relaxed),
            lines_ignored: self.lines_ignored.load(Ordering::Relaxed),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            listener_failures: self.listener_failures.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            commands_dropped: self.commands_dropped.load(Ordering::Relaxed),
        }
    }

    /// 记录连接建立次数。
    pub fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录连接失败次数（打开传输失败）。
    pub fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录连接中断次数（读写失败触发重连）。
    pub fn record_connection_loss(&self) {
        self.connection_losses.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录收到的完整行数。
    pub fn record_line(&self) {
        self.lines_received.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录未产生事件的行数。
    pub fn record_line_ignored(&self) {
        self.lines_ignored.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录成功投递给监听器的事件数。
    pub fn record_event_dispatched(&self) {
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录监听器失败次数。
    pub fn record_listener_failure(&self) {
        self.listener_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录写入传输层的命令数。
    pub fn record_command_sent(&self) {
        self.commands_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录写入失败被丢弃的命令数。
    pub fn record_command_dropped(&self) {
        self.commands_dropped.fetch_add(1, Ordering::Relaxed);
    }
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 以结构化日志输出指标快照。
pub fn log_snapshot(snapshot: &MetricsSnapshot) {
    info!(
        target: "otgw.metrics",
        connects = snapshot.connects,
        connect_failures = snapshot.connect_failures,
        connection_losses = snapshot.connection_losses,
        lines_received = snapshot.lines_received,
        lines_ignored = snapshot.lines_ignored,
        events_dispatched = snapshot.events_dispatched,
        listener_failures = snapshot.listener_failures,
        commands_sent = snapshot.commands_sent,
        commands_dropped = snapshot.commands_dropped,
        "gateway_metrics"
    );
}
