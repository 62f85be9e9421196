//! OpenTherm 网关协议相关类型定义

/// 报文来源标记（行首字符）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageSource {
    /// 锅炉发出 (`B`)
    Boiler,
    /// 温控器发出 (`T`)
    Thermostat,
    /// 网关代替锅炉应答温控器 (`A`)
    Answer,
    /// 网关代替温控器请求锅炉 (`R`)
    Request,
}

impl MessageSource {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'B' => Some(Self::Boiler),
            b'T' => Some(Self::Thermostat),
            b'A' => Some(Self::Answer),
            b'R' => Some(Self::Request),
            _ => None,
        }
    }

    pub fn tag(self) -> char {
        match self {
            Self::Boiler => 'B',
            Self::Thermostat => 'T',
            Self::Answer => 'A',
            Self::Request => 'R',
        }
    }

    /// 是否参与解码（网关自己发给锅炉的请求不解码）
    pub fn is_decoded(self) -> bool {
        matches!(self, Self::Boiler | Self::Thermostat | Self::Answer)
    }
}

/// OpenTherm 消息类型（3 位）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    ReadData = 0,
    WriteData = 1,
    InvalidData = 2,
    Reserved = 3,
    ReadAck = 4,
    WriteAck = 5,
    DataInvalid = 6,
    UnknownDataId = 7,
}

impl MessageType {
    /// 从类型半字节解析，最高位（奇偶校验位）被屏蔽
    pub fn from_nibble(nibble: u8) -> Self {
        match nibble & 0b0111 {
            0 => Self::ReadData,
            1 => Self::WriteData,
            2 => Self::InvalidData,
            3 => Self::Reserved,
            4 => Self::ReadAck,
            5 => Self::WriteAck,
            6 => Self::DataInvalid,
            _ => Self::UnknownDataId,
        }
    }

    /// 是否携带可发布的数据值
    pub fn is_decoded(self) -> bool {
        matches!(self, Self::WriteData | Self::ReadAck)
    }
}

/// 一行协议报文解析后的结构
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolMessage {
    pub source: MessageSource,
    pub msg_type: MessageType,
    /// 数据 ID（选择解码规则）
    pub id: u8,
    /// 16 位数据负载
    pub data: u16,
}

impl ProtocolMessage {
    /// 按固定词法解析一行：来源字符 + 类型 + 保留位 + 2 位 ID + 4 位数据，
    /// 十六进制只接受大写。不匹配返回 `None`。
    pub fn parse(line: &str) -> Option<Self> {
        let bytes = line.as_bytes();
        if bytes.len() != 9 {
            return None;
        }
        let source = MessageSource::from_tag(bytes[0])?;
        let digits = &bytes[1..];
        if !digits.iter().all(|b| matches!(b, b'0'..=b'9' | b'A'..=b'F')) {
            return None;
        }

        let msg_type = MessageType::from_nibble(hex_value(digits[0]));
        let id = (hex_value(digits[2]) << 4) | hex_value(digits[3]);
        let data = digits[4..8]
            .iter()
            .fold(0u16, |acc, b| (acc << 4) | u16::from(hex_value(*b)));

        Some(Self {
            source,
            msg_type,
            id,
            data,
        })
    }
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        _ => digit - b'A' + 10,
    }
}

/// 数据 ID 的解码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeKind {
    /// 位标志，原值按整数发布
    Flags,
    /// f8.8 定点数（÷256，保留两位小数）
    FixedPoint,
    /// 计数器，原值发布
    Counter,
}

/// 数据 ID 表项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataIdentifier {
    pub id: u8,
    pub name: &'static str,
    pub kind: DecodeKind,
}

const fn entry(id: u8, name: &'static str, kind: DecodeKind) -> DataIdentifier {
    DataIdentifier { id, name, kind }
}

/// 状态字数据 ID
pub const FLAME_STATUS: &str = "flame_status";

/// 已知的数据 ID 表
pub const IDENTIFIERS: [DataIdentifier; 22] = [
    entry(0, FLAME_STATUS, DecodeKind::Flags),
    entry(1, "control_setpoint", DecodeKind::FixedPoint),
    entry(9, "remote_override_setpoint", DecodeKind::FixedPoint),
    entry(14, "max_relative_modulation_level", DecodeKind::FixedPoint),
    entry(16, "room_setpoint", DecodeKind::FixedPoint),
    entry(17, "relative_modulation_level", DecodeKind::FixedPoint),
    entry(18, "ch_water_pressure", DecodeKind::FixedPoint),
    entry(24, "room_temperature", DecodeKind::FixedPoint),
    entry(25, "boiler_water_temperature", DecodeKind::FixedPoint),
    entry(26, "dhw_temperature", DecodeKind::FixedPoint),
    entry(27, "outside_temperature", DecodeKind::FixedPoint),
    entry(28, "return_water_temperature", DecodeKind::FixedPoint),
    entry(56, "dhw_setpoint", DecodeKind::FixedPoint),
    entry(57, "max_ch_water_setpoint", DecodeKind::FixedPoint),
    entry(116, "burner_starts", DecodeKind::Counter),
    entry(117, "ch_pump_starts", DecodeKind::Counter),
    entry(118, "dhw_pump_starts", DecodeKind::Counter),
    entry(119, "dhw_burner_starts", DecodeKind::Counter),
    entry(120, "burner_operation_hours", DecodeKind::Counter),
    entry(121, "ch_pump_operation_hours", DecodeKind::Counter),
    entry(122, "dhw_pump_valve_operation_hours", DecodeKind::Counter),
    entry(123, "dhw_burner_operation_hours", DecodeKind::Counter),
];

/// 查找数据 ID
pub fn lookup(id: u8) -> Option<&'static DataIdentifier> {
    IDENTIFIERS.iter().find(|entry| entry.id == id)
}
