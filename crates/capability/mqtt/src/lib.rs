//! OTGW MQTT 桥接
//!
//! - 网关事件发布到 `{pub_namespace}/{topic}`，payload 为事件值文本
//! - 订阅 `{sub_namespace}/#`，将命令 topic 映射为网关命令
//! - 所有发布都只入队（`try_*`），队列满时返回错误而不是等待
//! - `{pub_namespace}` 本身承载 retained 在线状态（`online` / `offline`，遗嘱为 `offline`）

mod command;

pub use command::{CommandError, command_for};

use async_trait::async_trait;
use domain::Event as GatewayEvent;
use otgw_gateway::{EventListener, GatewayClient, ListenerError};
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const ONLINE: &str = "online";
const OFFLINE: &str = "offline";

/// MQTT 桥接错误。
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    #[error("config error: {0}")]
    Config(String),
    #[error("publish error: {0}")]
    Publish(String),
}

/// MQTT 桥接配置。
#[derive(Debug, Clone)]
pub struct MqttBridgeConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keepalive_secs: u64,
    pub username: Option<String>,
    pub password: Option<String>,
    pub qos: u8,
    pub pub_topic_namespace: String,
    pub sub_topic_namespace: String,
}

/// MQTT 桥接：发布网关事件、提供命令订阅。
#[derive(Clone)]
pub struct MqttBridge {
    client: AsyncClient,
    qos: QoS,
    pub_namespace: String,
    sub_namespace: String,
}

impl MqttBridge {
    /// 创建客户端；返回的事件循环需交给 [`spawn_command_listener`] 驱动。
    pub fn connect(config: MqttBridgeConfig) -> Result<(Self, EventLoop), MqttError> {
        let pub_namespace = config.pub_topic_namespace.trim_end_matches('/').to_string();
        let sub_namespace = config.sub_topic_namespace.trim_end_matches('/').to_string();
        if pub_namespace.is_empty() || sub_namespace.is_empty() {
            return Err(MqttError::Config("topic namespace must not be empty".to_string()));
        }
        if config.keepalive_secs == 0 {
            return Err(MqttError::Config("keepalive must be at least 1 second".to_string()));
        }

        let qos = qos_from_u8(config.qos);
        let mut options = MqttOptions::new(config.client_id, config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keepalive_secs));
        options.set_last_will(LastWill::new(pub_namespace.clone(), OFFLINE, qos, true));
        if let (Some(username), Some(password)) = (config.username, config.password) {
            options.set_credentials(username, password);
        }
        let (client, eventloop) = AsyncClient::new(options, 10);
        Ok((
            Self {
                client,
                qos,
                pub_namespace,
                sub_namespace,
            },
            eventloop,
        ))
    }

    pub fn pub_namespace(&self) -> &str {
        &self.pub_namespace
    }

    pub fn sub_namespace(&self) -> &str {
        &self.sub_namespace
    }

    pub fn announce_online(&self) -> Result<(), MqttError> {
        self.publish_status(ONLINE)
    }

    pub fn announce_offline(&self) -> Result<(), MqttError> {
        self.publish_status(OFFLINE)
    }

    /// 请求断开；事件循环处理完之前排队的发布后退出。
    pub fn disconnect(&self) -> Result<(), MqttError> {
        self.client
            .try_disconnect()
            .map_err(|err| MqttError::Publish(err.to_string()))
    }

    fn publish_status(&self, status: &'static str) -> Result<(), MqttError> {
        self.client
            .try_publish(self.pub_namespace.clone(), self.qos, true, status)
            .map_err(|err| MqttError::Publish(err.to_string()))
    }

    /// (重新)连上 broker 后：订阅命令并宣告在线。
    ///
    /// 在事件循环任务内调用，只能用 `try_*`，否则请求队列满时会自锁。
    fn on_connected(&self) {
        let filter = format!("{}/#", self.sub_namespace);
        if let Err(err) = self.client.try_subscribe(filter.clone(), self.qos) {
            warn!(target: "otgw.mqtt", topic = %filter, "mqtt subscribe error: {}", err);
        } else {
            info!(target: "otgw.mqtt", topic = %filter, "command_subscribed");
        }
        if let Err(err) = self
            .client
            .try_publish(self.pub_namespace.clone(), self.qos, true, ONLINE)
        {
            warn!(target: "otgw.mqtt", "mqtt online status error: {}", err);
        }
    }

    fn handle_command(&self, gateway: &GatewayClient, topic: &str, payload: &[u8]) {
        let command = match command_for(&self.sub_namespace, topic, payload) {
            Ok(Some(command)) => command,
            Ok(None) => {
                debug!(target: "otgw.mqtt", topic = %topic, "command topic skipped");
                return;
            }
            Err(err) => {
                warn!(target: "otgw.mqtt", topic = %topic, "command payload invalid: {}", err);
                return;
            }
        };
        info!(target: "otgw.mqtt", topic = %topic, command = %command, "command_received");
        if let Err(err) = gateway.send(command) {
            warn!(target: "otgw.mqtt", topic = %topic, "command not queued: {}", err);
        }
    }
}

#[async_trait]
impl EventListener for MqttBridge {
    async fn on_event(&self, event: GatewayEvent) -> Result<(), ListenerError> {
        let topic = event.topic_in(&self.pub_namespace);
        let payload = event.value.to_string();
        debug!(target: "otgw.mqtt", topic = %topic, payload = %payload, "event_publish");
        // 只入队；在网关收发循环内调用，不能等待
        self.client
            .try_publish(topic, self.qos, false, payload)
            .map_err(|err| ListenerError::new(err.to_string()))
    }
}

/// 驱动 MQTT 事件循环并把命令转交网关。
///
/// 连接错误由 rumqttc 在下一次 poll 时重连，这里只记录并退避 1 秒。
/// 收到主动断开后任务结束。
pub fn spawn_command_listener(
    mut eventloop: EventLoop,
    bridge: MqttBridge,
    gateway: Arc<GatewayClient>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!(target: "otgw.mqtt", "mqtt_connected");
                    bridge.on_connected();
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    bridge.handle_command(&gateway, &publish.topic, &publish.payload);
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    info!(target: "otgw.mqtt", "mqtt_disconnected");
                    break;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(target: "otgw.mqtt", "mqtt eventloop error: {}", err);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    })
}

pub fn qos_from_u8(value: u8) -> QoS {
    match value {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}
