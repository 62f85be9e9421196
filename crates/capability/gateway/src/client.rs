//! 网关客户端
//!
//! 持有一个传输实例，在独立的 tokio 任务中运行收发循环：
//!
//! ```text
//! ┌─────────────── 每个周期 ───────────────┐
//! │ 1. 发送队列中的命令（FIFO）             │
//! │ 2. 带超时读取一块数据 → LineBuffer      │
//! │ 3. 取出完整行 → decode → EventListener  │
//! └────────────────────────────────────────┘
//!        │ 读写失败
//!        ▼
//! 关闭 → 清空缓冲 → 按固定间隔重试 open，直到成功或被停止
//! ```
//!
//! `stop()` 是协作式的：循环在周期之间检查运行状态，
//! 因此停止延迟受读超时约束。重连等待会被 `stop()` 立即打断。
//!
//! 写入失败的命令直接丢弃，不会重新排队；需要送达保证的调用方
//! 应在更上层自行确认与重试。

use crate::error::{GatewayError, ListenerError, TransportError};
use crate::transport::Transport;
use async_trait::async_trait;
use domain::Event;
use futures::FutureExt;
use otgw_protocol::{LineBuffer, decode};
use otgw_telemetry::{GatewayMetrics, MetricsSnapshot};
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 解码事件的接收方
#[async_trait]
pub trait EventListener: Send + Sync {
    async fn on_event(&self, event: Event) -> Result<(), ListenerError>;
}

/// 网关客户端配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayClientConfig {
    /// 单次读取超时（毫秒），决定 `stop()` 的响应延迟
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
    /// 重连间隔（毫秒）
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u64,
}

fn default_read_timeout() -> u64 {
    500
}

fn default_reconnect_interval() -> u64 {
    10_000
}

impl Default for GatewayClientConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: default_read_timeout(),
            reconnect_interval_ms: default_reconnect_interval(),
        }
    }
}

impl GatewayClientConfig {
    /// 从 JSON 配置字符串解析
    pub fn from_json(json: &str) -> Result<Self, GatewayError> {
        serde_json::from_str(json).map_err(|e| GatewayError::ConfigParse(e.to_string()))
    }
}

/// 运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running,
    Stopping,
    Stopped,
}

/// 运行循环独占的资源；持有其锁即代表循环正在运行
struct Session {
    transport: Box<dyn Transport>,
    commands: mpsc::UnboundedReceiver<String>,
}

/// OTGW 网关客户端
pub struct GatewayClient {
    session: Arc<AsyncMutex<Session>>,
    commands: mpsc::UnboundedSender<String>,
    listener: Arc<dyn EventListener>,
    config: GatewayClientConfig,
    state: Arc<watch::Sender<RunState>>,
    connected: Arc<AtomicBool>,
    metrics: Arc<GatewayMetrics>,
    worker: Mutex<Option<JoinHandle<()>>>,
    description: String,
}

impl GatewayClient {
    /// 创建客户端（尚未启动）
    pub fn new(
        transport: Box<dyn Transport>,
        listener: Arc<dyn EventListener>,
        config: GatewayClientConfig,
    ) -> Self {
        let description = transport.describe();
        let (commands, receiver) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(RunState::NotStarted);
        Self {
            session: Arc::new(AsyncMutex::new(Session {
                transport,
                commands: receiver,
            })),
            commands,
            listener,
            config,
            state: Arc::new(state),
            connected: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(GatewayMetrics::new()),
            worker: Mutex::new(None),
            description,
        }
    }

    /// 启动运行循环（需在 tokio 运行时内调用）
    pub fn start(&self) -> Result<(), GatewayError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| GatewayError::NoRuntime)?;
        let session = Arc::clone(&self.session)
            .try_lock_owned()
            .map_err(|_| GatewayError::AlreadyRunning)?;

        let mut result = Ok(());
        self.state.send_if_modified(|state| match state {
            RunState::Running | RunState::Stopping => {
                result = Err(GatewayError::AlreadyRunning);
                false
            }
            RunState::NotStarted | RunState::Stopped => {
                *state = RunState::Running;
                true
            }
        });
        result?;

        let worker = Worker {
            session,
            listener: Arc::clone(&self.listener),
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            connected: Arc::clone(&self.connected),
            metrics: Arc::clone(&self.metrics),
            buffer: LineBuffer::new(),
            description: self.description.clone(),
            _exit: ExitGuard {
                state: Arc::clone(&self.state),
                connected: Arc::clone(&self.connected),
            },
        };
        let handle = runtime.spawn(worker.run());
        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    /// 请求停止；循环在当前周期结束后退出
    pub fn stop(&self) -> Result<(), GatewayError> {
        let mut result = Ok(());
        self.state.send_if_modified(|state| match state {
            RunState::Running => {
                *state = RunState::Stopping;
                true
            }
            RunState::Stopping => false,
            RunState::NotStarted | RunState::Stopped => {
                result = Err(GatewayError::NotRunning);
                false
            }
        });
        result
    }

    /// 命令入队，下一个周期发送
    pub fn send(&self, command: impl Into<String>) -> Result<(), GatewayError> {
        if *self.state.borrow() != RunState::Running {
            return Err(GatewayError::NotRunning);
        }
        self.commands
            .send(command.into())
            .map_err(|_| GatewayError::NotRunning)
    }

    /// 等待运行循环结束（传输已关闭）
    pub async fn join(&self) -> Result<(), GatewayError> {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return Ok(());
        };
        handle.await.map_err(|e| {
            self.connected.store(false, Ordering::SeqCst);
            self.state.send_replace(RunState::Stopped);
            GatewayError::Join(e.to_string())
        })
    }

    /// 停止并等待退出
    pub async fn shutdown(&self) -> Result<(), GatewayError> {
        self.stop()?;
        self.join().await
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl Drop for GatewayClient {
    fn drop(&mut self) {
        self.state.send_if_modified(|state| {
            if *state == RunState::Running {
                *state = RunState::Stopping;
                true
            } else {
                false
            }
        });
    }
}

/// 运行循环
///
/// 异步方法都取 `&mut self`：传输只要求 `Send`，`&Worker` 不能跨 await。
struct Worker {
    session: OwnedMutexGuard<Session>,
    listener: Arc<dyn EventListener>,
    config: GatewayClientConfig,
    state: Arc<watch::Sender<RunState>>,
    connected: Arc<AtomicBool>,
    metrics: Arc<GatewayMetrics>,
    buffer: LineBuffer,
    description: String,
    /// 必须是最后一个字段：会话锁先释放，再发布 Stopped
    _exit: ExitGuard,
}

/// 运行循环退出（包括 panic 展开）时复位连接标志并发布 Stopped
struct ExitGuard {
    state: Arc<watch::Sender<RunState>>,
    connected: Arc<AtomicBool>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
        self.state.send_replace(RunState::Stopped);
    }
}

impl Worker {
    async fn run(mut self) {
        info!(target: "otgw.gateway", transport = %self.description, "gateway_client_started");
        let read_timeout = Duration::from_millis(self.config.read_timeout_ms);

        self.connect().await;

        while self.is_running() {
            match self.flush_commands().await {
                Err(error) => self.connection_lost(error).await,
                Ok(()) => match self.session.transport.read(read_timeout).await {
                    Ok(chunk) => self.buffer.extend(&chunk),
                    Err(error) => self.connection_lost(error).await,
                },
            }
            self.dispatch_lines().await;
        }

        self.session.transport.close().await;
        self.connected.store(false, Ordering::SeqCst);
        info!(target: "otgw.gateway", transport = %self.description, "gateway_client_stopped");
    }

    fn is_running(&self) -> bool {
        *self.state.borrow() == RunState::Running
    }

    /// 打开传输，失败则按固定间隔重试，直到成功或被停止
    async fn connect(&mut self) {
        while self.is_running() {
            match self.session.transport.open().await {
                Ok(()) => {
                    self.connected.store(true, Ordering::SeqCst);
                    self.metrics.record_connect();
                    info!(target: "otgw.gateway", transport = %self.description, "otgw_connected");
                    return;
                }
                Err(error) => {
                    self.metrics.record_connect_failure();
                    warn!(
                        target: "otgw.gateway",
                        transport = %self.description,
                        error = %error,
                        retry_in_ms = self.config.reconnect_interval_ms,
                        "could not connect, will retry"
                    );
                    self.pause().await;
                }
            }
        }
    }

    /// 连接中断：关闭、丢弃残留数据、重新连接
    async fn connection_lost(&mut self, error: TransportError) {
        warn!(
            target: "otgw.gateway",
            transport = %self.description,
            error = %error,
            "connection lost, will attempt to reconnect"
        );
        self.metrics.record_connection_loss();
        self.connected.store(false, Ordering::SeqCst);
        self.session.transport.close().await;
        self.buffer.clear();
        self.connect().await;
    }

    /// 重连等待，`stop()` 可提前结束
    async fn pause(&mut self) {
        let mut state = self.state.subscribe();
        let interval = Duration::from_millis(self.config.reconnect_interval_ms);
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = state.wait_for(|current| *current != RunState::Running) => {}
        }
    }

    /// 发送队列中的全部命令；写入失败的命令被丢弃，其余留到下次
    async fn flush_commands(&mut self) -> Result<(), TransportError> {
        while let Ok(command) = self.session.commands.try_recv() {
            let framed = self.session.transport.frame_command(&command);
            if let Err(error) = self.session.transport.write(&framed).await {
                self.metrics.record_command_dropped();
                warn!(
                    target: "otgw.gateway",
                    command = %command,
                    error = %error,
                    "command dropped, write failed"
                );
                return Err(error);
            }
            self.metrics.record_command_sent();
            debug!(target: "otgw.gateway", command = %command, "command_sent");
        }
        Ok(())
    }

    /// 取出缓冲区中的全部完整行并分发事件
    async fn dispatch_lines(&mut self) {
        while let Some(line) = self.buffer.next_line() {
            self.metrics.record_line();
            let events = decode(&line);
            if events.is_empty() {
                self.metrics.record_line_ignored();
                continue;
            }
            for event in events {
                dispatch(&self.listener, &self.metrics, event).await;
            }
        }
    }
}

/// 投递单个事件；监听器的错误与 panic 都只记录，不中断循环
async fn dispatch(listener: &Arc<dyn EventListener>, metrics: &GatewayMetrics, event: Event) {
    match AssertUnwindSafe(listener.on_event(event)).catch_unwind().await {
        Ok(Ok(())) => metrics.record_event_dispatched(),
        Ok(Err(error)) => {
            metrics.record_listener_failure();
            warn!(target: "otgw.gateway", topic = event.topic, error = %error, "listener failed");
        }
        Err(_) => {
            metrics.record_listener_failure();
            warn!(target: "otgw.gateway", topic = event.topic, "listener panicked");
        }
    }
}
