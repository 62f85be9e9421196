//! OTGW ↔ MQTT 桥接服务：网关事件发布到 MQTT，MQTT 命令转发给网关。

use otgw_config::{AppConfig, ConfigError, TransportKind};
use otgw_gateway::{GatewayClient, GatewayClientConfig, TransportConfig, transport};
use otgw_mqtt::{MqttBridge, MqttBridgeConfig, spawn_command_listener};
use otgw_telemetry::{init_tracing, log_snapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    let (bridge, eventloop) = MqttBridge::connect(mqtt_config(&config))?;

    let transport_config = transport_config(&config)?;
    let gateway = Arc::new(GatewayClient::new(
        transport::build(&transport_config),
        Arc::new(bridge.clone()),
        GatewayClientConfig {
            read_timeout_ms: config.otgw_read_timeout_ms,
            reconnect_interval_ms: config.otgw_reconnect_interval_ms,
        },
    ));
    info!(
        target: "otgw.bridge",
        transport = %gateway.description(),
        mqtt_host = %config.mqtt_host,
        mqtt_port = config.mqtt_port,
        "otgw_bridge_starting"
    );
    gateway.start()?;

    let listener = spawn_command_listener(eventloop, bridge.clone(), Arc::clone(&gateway));
    let metrics = spawn_metrics_logger(Arc::clone(&gateway), config.metrics_log_interval_seconds);

    tokio::signal::ctrl_c().await?;
    info!(target: "otgw.bridge", "shutdown_requested");

    gateway.shutdown().await?;
    if let Some(handle) = metrics {
        handle.abort();
    }
    log_snapshot(&gateway.metrics());

    if let Err(err) = bridge.announce_offline() {
        warn!(target: "otgw.bridge", "offline status not published: {}", err);
    }
    if let Err(err) = bridge.disconnect() {
        warn!(target: "otgw.bridge", "mqtt disconnect error: {}", err);
    }
    if tokio::time::timeout(Duration::from_secs(2), listener)
        .await
        .is_err()
    {
        warn!(target: "otgw.bridge", "mqtt eventloop did not stop in time");
    }
    info!(target: "otgw.bridge", "otgw_bridge_stopped");
    Ok(())
}

fn transport_config(config: &AppConfig) -> Result<TransportConfig, ConfigError> {
    let host = || {
        config
            .otgw_host
            .clone()
            .ok_or_else(|| ConfigError::Missing("OTGW_HOST".to_string()))
    };
    Ok(match config.otgw_type {
        TransportKind::Serial => TransportConfig::Serial {
            device: config.otgw_device.clone(),
            baudrate: config.otgw_baudrate,
        },
        TransportKind::Tcp => TransportConfig::Tcp {
            host: host()?,
            port: config.otgw_port,
            connect_timeout_ms: config.otgw_connect_timeout_ms,
        },
        TransportKind::Telnet => TransportConfig::Telnet {
            host: host()?,
            port: config.otgw_port,
            connect_timeout_ms: config.otgw_connect_timeout_ms,
        },
    })
}

fn mqtt_config(config: &AppConfig) -> MqttBridgeConfig {
    MqttBridgeConfig {
        host: config.mqtt_host.clone(),
        port: config.mqtt_port,
        client_id: config.mqtt_client_id.clone(),
        keepalive_secs: config.mqtt_keepalive_seconds,
        username: config.mqtt_username.clone(),
        password: config.mqtt_password.clone(),
        qos: config.mqtt_qos,
        pub_topic_namespace: config.mqtt_pub_topic_namespace.clone(),
        sub_topic_namespace: config.mqtt_sub_topic_namespace.clone(),
    }
}

/// 周期输出网关指标；间隔为 0 时不启动
fn spawn_metrics_logger(gateway: Arc<GatewayClient>, interval_seconds: u64) -> Option<JoinHandle<()>> {
    if interval_seconds == 0 {
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds));
        // 第一次 tick 立即返回
        ticker.tick().await;
        loop {
            ticker.tick().await;
            log_snapshot(&gateway.metrics());
        }
    }))
}
