use async_trait::async_trait;
use domain::Event;
use otgw_gateway::{
    EventListener, GatewayClient, GatewayClientConfig, GatewayError, ListenerError, RunState,
    Transport, TransportError,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 读取脚本项：数据块、连接中断或驱动 panic
enum Read {
    Data(&'static [u8]),
    Lost,
    Panic,
}

#[derive(Default)]
struct Script {
    /// 依次消费的 open 结果，耗尽后总是成功
    opens: VecDeque<bool>,
    /// 依次消费的读取结果，耗尽后按超时返回空
    reads: VecDeque<Read>,
    write_failures: usize,
    open_attempts: usize,
    closes: usize,
    writes: Vec<Vec<u8>>,
}

#[derive(Clone, Default)]
struct FakeTransport(Arc<Mutex<Script>>);

impl FakeTransport {
    fn with_reads(reads: Vec<Read>) -> Self {
        let transport = Self::default();
        transport.0.lock().unwrap().reads = reads.into();
        transport
    }

    fn with_opens(self, opens: Vec<bool>) -> Self {
        self.0.lock().unwrap().opens = opens.into();
        self
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.0.lock().unwrap()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        let mut script = self.script();
        script.open_attempts += 1;
        if script.opens.pop_front().unwrap_or(true) {
            Ok(())
        } else {
            Err(TransportError::Connect("device unavailable".to_string()))
        }
    }

    async fn close(&mut self) {
        self.script().closes += 1;
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut script = self.script();
        if script.write_failures > 0 {
            script.write_failures -= 1;
            return Err(TransportError::ConnectionLost("write failed".to_string()));
        }
        script.writes.push(data.to_vec());
        Ok(())
    }

    async fn read(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let next = self.script().reads.pop_front();
        match next {
            Some(Read::Data(chunk)) => Ok(chunk.to_vec()),
            Some(Read::Lost) => Err(TransportError::ConnectionLost("cable unplugged".to_string())),
            Some(Read::Panic) => panic!("serial driver bug"),
            None => {
                tokio::time::sleep(timeout).await;
                Ok(Vec::new())
            }
        }
    }

    fn describe(&self) -> String {
        "fake".to_string()
    }
}

#[derive(Default)]
struct RecordingListener {
    events: Mutex<Vec<Event>>,
    fail_on: Option<&'static str>,
    panic_on: Option<&'static str>,
}

impl RecordingListener {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventListener for RecordingListener {
    async fn on_event(&self, event: Event) -> Result<(), ListenerError> {
        if self.panic_on == Some(event.topic) {
            panic!("listener bug");
        }
        if self.fail_on == Some(event.topic) {
            return Err(ListenerError::new("downstream unavailable"));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

fn fast_config() -> GatewayClientConfig {
    GatewayClientConfig {
        read_timeout_ms: 20,
        reconnect_interval_ms: 10,
    }
}

fn client_with(
    transport: &FakeTransport,
    listener: &Arc<RecordingListener>,
    config: GatewayClientConfig,
) -> GatewayClient {
    GatewayClient::new(
        Box::new(transport.clone()),
        Arc::clone(listener) as Arc<dyn EventListener>,
        config,
    )
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn dispatches_events_across_chunk_boundaries() {
    let transport = FakeTransport::with_reads(vec![
        Read::Data(b"B4000"),
        Read::Data(b"000E\r\nT1018"),
        Read::Data(b"0514\r\nR40180A00\n"),
    ]);
    let listener = Arc::new(RecordingListener::default());
    let client = client_with(&transport, &listener, fast_config());

    client.start().expect("start");
    wait_until(|| listener.events().len() == 5).await;
    client.shutdown().await.expect("shutdown");

    assert_eq!(
        listener.events(),
        vec![
            Event::int("flame_status", 14),
            Event::flag("flame_status_ch", true),
            Event::flag("flame_status_dhw", true),
            Event::flag("flame_status_bit", true),
            Event::float("room_temperature", 5.08),
        ]
    );
    let metrics = client.metrics();
    assert_eq!(metrics.lines_received, 3);
    assert_eq!(metrics.lines_ignored, 1);
    assert_eq!(metrics.events_dispatched, 5);
}

#[tokio::test]
async fn retries_initial_open_until_success() {
    let transport = FakeTransport::default().with_opens(vec![false, false, false]);
    let listener = Arc::new(RecordingListener::default());
    let client = client_with(&transport, &listener, fast_config());

    client.start().expect("start");
    wait_until(|| client.is_connected()).await;
    client.shutdown().await.expect("shutdown");

    assert_eq!(transport.script().open_attempts, 4);
    let metrics = client.metrics();
    assert_eq!(metrics.connects, 1);
    assert_eq!(metrics.connect_failures, 3);
    assert!(!client.is_connected());
}

#[tokio::test]
async fn reconnect_discards_stale_bytes() {
    // 断线前的残行 "T1018" 若未清空，会与重连后的 "0A00" 拼成合法报文
    let transport = FakeTransport::with_reads(vec![
        Read::Data(b"T1018"),
        Read::Lost,
        Read::Data(b"0A00\r\nB40192800\r\n"),
    ])
    .with_opens(vec![true, false, false]);
    let listener = Arc::new(RecordingListener::default());
    let client = client_with(&transport, &listener, fast_config());

    client.start().expect("start");
    wait_until(|| !listener.events().is_empty()).await;
    client.shutdown().await.expect("shutdown");

    assert_eq!(
        listener.events(),
        vec![Event::float("boiler_water_temperature", 40.0)]
    );
    let script = transport.script();
    assert_eq!(script.open_attempts, 4);
    assert!(script.closes >= 2);
    let metrics = client.metrics();
    assert_eq!(metrics.connects, 2);
    assert_eq!(metrics.connect_failures, 2);
    assert_eq!(metrics.connection_losses, 1);
    assert_eq!(metrics.lines_ignored, 1);
}

#[tokio::test]
async fn commands_are_written_in_order() {
    let transport = FakeTransport::default();
    let listener = Arc::new(RecordingListener::default());
    let client = client_with(&transport, &listener, fast_config());

    client.start().expect("start");
    client.send("TT=20.00").expect("send");
    client.send("CH=1").expect("send");
    client.send("HW=0\r\n").expect("send");
    wait_until(|| transport.script().writes.len() == 3).await;
    client.shutdown().await.expect("shutdown");

    assert_eq!(
        transport.script().writes,
        vec![
            b"TT=20.00\r\n".to_vec(),
            b"CH=1\r\n".to_vec(),
            b"HW=0\r\n".to_vec()
        ]
    );
    assert_eq!(client.metrics().commands_sent, 3);
}

#[tokio::test]
async fn failed_write_drops_command_and_reconnects() {
    let transport = FakeTransport::default();
    transport.script().write_failures = 1;
    let listener = Arc::new(RecordingListener::default());
    let client = client_with(&transport, &listener, fast_config());

    client.start().expect("start");
    client.send("CH=1").expect("send");
    client.send("HW=1").expect("send");
    wait_until(|| transport.script().writes.len() == 1).await;
    client.shutdown().await.expect("shutdown");

    assert_eq!(transport.script().writes, vec![b"HW=1\r\n".to_vec()]);
    let metrics = client.metrics();
    assert_eq!(metrics.commands_dropped, 1);
    assert_eq!(metrics.commands_sent, 1);
    assert_eq!(metrics.connection_losses, 1);
    assert_eq!(metrics.connects, 2);
}

#[tokio::test]
async fn listener_failures_do_not_stop_ingestion() {
    let transport = FakeTransport::with_reads(vec![
        Read::Data(b"B4000000E\r\n"),
        Read::Data(b"B40191400\r\n"),
    ]);
    let listener = Arc::new(RecordingListener {
        fail_on: Some("flame_status_ch"),
        panic_on: Some("flame_status_dhw"),
        ..Default::default()
    });
    let client = client_with(&transport, &listener, fast_config());

    client.start().expect("start");
    wait_until(|| listener.events().len() == 3).await;
    client.shutdown().await.expect("shutdown");

    assert_eq!(
        listener.events(),
        vec![
            Event::int("flame_status", 14),
            Event::flag("flame_status_bit", true),
            Event::float("boiler_water_temperature", 20.0),
        ]
    );
    assert_eq!(client.metrics().listener_failures, 2);
}

#[tokio::test]
async fn stop_and_join_return_within_read_timeout() {
    let transport = FakeTransport::default();
    let listener = Arc::new(RecordingListener::default());
    let config = GatewayClientConfig {
        read_timeout_ms: 100,
        reconnect_interval_ms: 10,
    };
    let client = client_with(&transport, &listener, config);

    client.start().expect("start");
    wait_until(|| client.is_connected()).await;
    client.stop().expect("stop");
    tokio::time::timeout(Duration::from_millis(400), client.join())
        .await
        .expect("join timed out")
        .expect("join");

    assert_eq!(client.state(), RunState::Stopped);
    assert!(!client.is_connected());
    assert!(transport.script().closes >= 1);
}

#[tokio::test]
async fn stop_interrupts_reconnect_wait() {
    let transport = FakeTransport::default().with_opens(vec![false; 100]);
    let listener = Arc::new(RecordingListener::default());
    let config = GatewayClientConfig {
        read_timeout_ms: 100,
        reconnect_interval_ms: 10_000,
    };
    let client = client_with(&transport, &listener, config);

    client.start().expect("start");
    wait_until(|| transport.script().open_attempts == 1).await;
    tokio::time::timeout(Duration::from_millis(500), client.shutdown())
        .await
        .expect("shutdown timed out")
        .expect("shutdown");

    assert_eq!(transport.script().open_attempts, 1);
    assert_eq!(client.metrics().connects, 0);
}

#[tokio::test]
async fn transport_panic_resets_state_without_join() {
    let transport = FakeTransport::with_reads(vec![Read::Panic]);
    let listener = Arc::new(RecordingListener::default());
    let client = client_with(&transport, &listener, fast_config());

    client.start().expect("start");
    wait_until(|| client.state() == RunState::Stopped).await;
    assert!(!client.is_connected());
    assert!(matches!(client.send("CH=1"), Err(GatewayError::NotRunning)));

    // 未调用 join 也可以重新启动
    client.start().expect("restart after panic");
    wait_until(|| client.is_connected()).await;
    client.shutdown().await.expect("shutdown");
    assert_eq!(transport.script().open_attempts, 2);
}

#[tokio::test]
async fn state_errors_are_reported() {
    let transport = FakeTransport::default();
    let listener = Arc::new(RecordingListener::default());
    let client = client_with(&transport, &listener, fast_config());

    assert_eq!(client.state(), RunState::NotStarted);
    assert!(matches!(client.stop(), Err(GatewayError::NotRunning)));
    assert!(matches!(client.send("CH=1"), Err(GatewayError::NotRunning)));
    client.join().await.expect("join without start");

    client.start().expect("start");
    assert!(matches!(client.start(), Err(GatewayError::AlreadyRunning)));
    wait_until(|| client.is_connected()).await;
    client.stop().expect("stop");
    client.stop().expect("stop while stopping");
    assert!(matches!(client.send("CH=1"), Err(GatewayError::NotRunning)));
    client.join().await.expect("join");
    assert!(matches!(client.stop(), Err(GatewayError::NotRunning)));

    // 停止后可以再次启动
    client.start().expect("restart");
    assert_eq!(client.state(), RunState::Running);
    wait_until(|| client.is_connected()).await;
    client.shutdown().await.expect("shutdown");
    assert_eq!(transport.script().open_attempts, 2);
}

#[test]
fn start_requires_runtime() {
    let transport = FakeTransport::default();
    let listener = Arc::new(RecordingListener::default());
    let client = client_with(&transport, &listener, fast_config());
    assert!(matches!(client.start(), Err(GatewayError::NoRuntime)));
    assert_eq!(client.state(), RunState::NotStarted);
}

#[test]
fn config_defaults() {
    let config = GatewayClientConfig::from_json("{}").expect("config");
    assert_eq!(config, GatewayClientConfig::default());
    assert_eq!(config.read_timeout_ms, 500);
    assert_eq!(config.reconnect_interval_ms, 10_000);
}
