//! 订阅 topic → 网关命令映射

/// 命令 payload 错误。
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("payload is not utf-8 on {0}")]
    Encoding(String),
    #[error("invalid payload for {topic}: {payload}")]
    InvalidPayload { topic: String, payload: String },
}

/// 将订阅消息映射为网关命令（不含行结束符）。
///
/// topic 不在 `sub_namespace` 之下或未知时返回 `Ok(None)`。
pub fn command_for(
    sub_namespace: &str,
    topic: &str,
    payload: &[u8],
) -> Result<Option<String>, CommandError> {
    let prefix = sub_namespace.trim_end_matches('/');
    let Some(suffix) = topic
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
    else {
        return Ok(None);
    };
    let payload =
        std::str::from_utf8(payload).map_err(|_| CommandError::Encoding(topic.to_string()))?;

    let command = match suffix {
        "room_setpoint/temporary" => format!("TT={:.2}", parse_float(topic, payload)?),
        "room_setpoint/constant" => format!("TC={:.2}", parse_float(topic, payload)?),
        "outside_temperature" => format!("OT={:.2}", parse_float(topic, payload)?),
        "hot_water/temperature" => format!("SW={:.2}", parse_float(topic, payload)?),
        "hot_water/enable" => format!("HW={}", flag(payload)),
        "central_heating/enable" => format!("CH={}", flag(payload)),
        _ => return Ok(None),
    };
    Ok(Some(command))
}

fn parse_float(topic: &str, payload: &str) -> Result<f64, CommandError> {
    payload
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| CommandError::InvalidPayload {
            topic: topic.to_string(),
            payload: payload.to_string(),
        })
}

fn flag(payload: &str) -> u8 {
    match payload.trim() {
        "True" | "true" | "1" | "y" | "yes" => 1,
        _ => 0,
    }
}
