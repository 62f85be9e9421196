//! 应用运行配置加载。

use std::env;
use std::str::FromStr;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 网关连接方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Serial,
    Tcp,
    Telnet,
}

impl FromStr for TransportKind {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "serial" => Ok(Self::Serial),
            "tcp" => Ok(Self::Tcp),
            "telnet" => Ok(Self::Telnet),
            _ => Err(()),
        }
    }
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub otgw_type: TransportKind,
    pub otgw_device: String,
    pub otgw_baudrate: u32,
    /// tcp/telnet 时必填
    pub otgw_host: Option<String>,
    pub otgw_port: u16,
    pub otgw_connect_timeout_ms: u64,
    pub otgw_read_timeout_ms: u64,
    pub otgw_reconnect_interval_ms: u64,
    pub mqtt_client_id: String,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_keepalive_seconds: u64,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_qos: u8,
    pub mqtt_pub_topic_namespace: String,
    pub mqtt_sub_topic_namespace: String,
    /// 0 表示不输出周期指标日志
    pub metrics_log_interval_seconds: u64,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let otgw_type = match read_optional("OTGW_TYPE") {
            Some(value) => value
                .parse::<TransportKind>()
                .map_err(|_| ConfigError::Invalid("OTGW_TYPE".to_string(), value))?,
            None => TransportKind::Serial,
        };
        let otgw_device =
            env::var("OTGW_DEVICE").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());
        let otgw_baudrate = read_u32_with_default("OTGW_BAUDRATE", 9600)?;
        let otgw_host = read_optional("OTGW_HOST");
        if otgw_type != TransportKind::Serial && otgw_host.is_none() {
            return Err(ConfigError::Missing("OTGW_HOST".to_string()));
        }
        let otgw_port = read_u16_with_default("OTGW_PORT", 25238)?;
        let otgw_connect_timeout_ms = read_u64_with_default("OTGW_CONNECT_TIMEOUT_MS", 5000)?;
        let otgw_read_timeout_ms = read_u64_with_default("OTGW_READ_TIMEOUT_MS", 500)?;
        let otgw_reconnect_interval_ms =
            read_u64_with_default("OTGW_RECONNECT_INTERVAL_MS", 10_000)?;

        let mqtt_client_id = env::var("OTGW_MQTT_CLIENT_ID").unwrap_or_else(|_| "otgw".to_string());
        let mqtt_host = env::var("OTGW_MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let mqtt_port = read_u16_with_default("OTGW_MQTT_PORT", 1883)?;
        let mqtt_keepalive_seconds = read_u64_with_default("OTGW_MQTT_KEEPALIVE_SECONDS", 60)?;
        let mqtt_username = read_optional("OTGW_MQTT_USERNAME");
        let mqtt_password = read_optional("OTGW_MQTT_PASSWORD");
        let mqtt_qos = read_u8_with_default("OTGW_MQTT_QOS", 0)?;
        if mqtt_qos > 2 {
            return Err(ConfigError::Invalid(
                "OTGW_MQTT_QOS".to_string(),
                mqtt_qos.to_string(),
            ));
        }
        let mqtt_pub_topic_namespace = env::var("OTGW_MQTT_PUB_TOPIC_NAMESPACE")
            .unwrap_or_else(|_| "value/otgw".to_string());
        let mqtt_sub_topic_namespace = env::var("OTGW_MQTT_SUB_TOPIC_NAMESPACE")
            .unwrap_or_else(|_| "set/otgw".to_string());
        let metrics_log_interval_seconds =
            read_u64_with_default("OTGW_METRICS_LOG_INTERVAL_SECONDS", 60)?;

        Ok(Self {
            otgw_type,
            otgw_device,
            otgw_baudrate,
            otgw_host,
            otgw_port,
            otgw_connect_timeout_ms,
            otgw_read_timeout_ms,
            otgw_reconnect_interval_ms,
            mqtt_client_id,
            mqtt_host,
            mqtt_port,
            mqtt_keepalive_seconds,
            mqtt_username,
            mqtt_password,
            mqtt_qos,
            mqtt_pub_topic_namespace,
            mqtt_sub_topic_namespace,
            metrics_log_interval_seconds,
        })
    }
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u8_with_default(key: &str, default: u8) -> Result<u8, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u8>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u32_with_default(key: &str, default: u32) -> Result<u32, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u32>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}
