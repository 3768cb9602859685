//! 设备驱动：构造下行命令报文，解析上行状态报文。

use crate::color::{from_channel, hsl_to_rgb_hex, rgb_hex_to_hsl, to_channel};
use crate::error::ProtocolError;
use crate::packet::{HardwareId, MessageType, Packet, read_u16, read_u32};
use domain::{LightExtra, LightState};

/// 未指定色温时的默认值
pub const DEFAULT_KELVIN: u16 = 6500;

/// 灯状态负载最小长度
pub const LIGHT_STATE_MIN_PAYLOAD: usize = 48;

const LABEL_OFFSET: usize = 12;
const LABEL_LENGTH: usize = 32;

/// 电源原始值为该值时视为开灯
const POWER_ON_RAW: u16 = 0xFFFF;

/// 颜色命令的可选覆盖项。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorOverrides {
    pub hue: Option<u16>,
    pub saturation: Option<u16>,
    pub brightness: Option<u16>,
    pub kelvin: Option<u16>,
    pub fade_ms: Option<u32>,
}

/// 开关灯（0x15），负载为单个 u16。
pub fn build_set_power(on: bool, target: HardwareId) -> Packet {
    let value: u16 = if on { 1 } else { 0 };
    Packet::new(MessageType::SetPower, target, value.to_le_bytes().to_vec())
}

/// 设置颜色（0x66）。
///
/// 负载：u8 保留、u16 hue、u16 saturation、u16 brightness、u16 kelvin、u32 fade_ms。
pub fn build_set_color(
    rgb_hex: &str,
    overrides: &ColorOverrides,
    target: HardwareId,
) -> Result<Packet, ProtocolError> {
    let (h, s, l) = rgb_hex_to_hsl(rgb_hex)?;
    let hue = overrides.hue.unwrap_or_else(|| to_channel(h));
    let saturation = overrides.saturation.unwrap_or_else(|| to_channel(s));
    let brightness = overrides.brightness.unwrap_or_else(|| to_channel(l));
    let kelvin = overrides.kelvin.unwrap_or(DEFAULT_KELVIN);
    let fade_ms = overrides.fade_ms.unwrap_or(0);

    let mut payload = Vec::with_capacity(13);
    payload.push(0);
    payload.extend_from_slice(&hue.to_le_bytes());
    payload.extend_from_slice(&saturation.to_le_bytes());
    payload.extend_from_slice(&brightness.to_le_bytes());
    payload.extend_from_slice(&kelvin.to_le_bytes());
    payload.extend_from_slice(&fade_ms.to_le_bytes());
    Ok(Packet::new(MessageType::SetColor, target, payload))
}

/// 请求网关上报全部灯状态（0x65）。
pub fn build_refresh_all(gateway: HardwareId) -> Packet {
    let mut packet = Packet::new(MessageType::GetAllStates, HardwareId::BROADCAST, Vec::new());
    packet.gateway = gateway;
    packet
}

/// 发现报文（0x02），UDP 探测与 TCP 会话问候共用。
pub fn build_discover() -> Packet {
    Packet::new(MessageType::Discover, HardwareId::BROADCAST, Vec::new())
}

/// 解析灯状态报文（0x6b）。
pub fn parse_light_state(packet: &Packet) -> Result<LightState, ProtocolError> {
    expect_type(packet, MessageType::LightState)?;
    let payload = &packet.payload;
    if payload.len() < LIGHT_STATE_MIN_PAYLOAD {
        return Err(ProtocolError::MalformedPacket(format!(
            "light state payload has {} bytes, need {}",
            payload.len(),
            LIGHT_STATE_MIN_PAYLOAD
        )));
    }

    let extra = LightExtra {
        hue: read_u16(payload, 0),
        saturation: read_u16(payload, 2),
        brightness: read_u16(payload, 4),
        kelvin: read_u16(payload, 6),
        dim: read_u16(payload, 8),
    };
    let raw_power = read_u16(payload, 10);
    let label = decode_label(&payload[LABEL_OFFSET..LABEL_OFFSET + LABEL_LENGTH]);
    let tags_hi = read_u32(payload, 44) as u64;
    let tags_lo = if payload.len() >= 52 {
        read_u32(payload, 48) as u64
    } else {
        0
    };

    Ok(LightState {
        id: packet.target.to_string(),
        gateway_id: packet.gateway.to_string(),
        label,
        tags: tags_hi + tags_lo,
        power: raw_power == POWER_ON_RAW,
        color: hsl_to_rgb_hex(
            from_channel(extra.hue),
            from_channel(extra.saturation),
            from_channel(extra.brightness),
        ),
        extra,
    })
}

/// 解析发现应答（0x03），返回网关服务端口（负载偏移 1 处的 u32）。
pub fn parse_discovery_reply(packet: &Packet) -> Result<u32, ProtocolError> {
    expect_type(packet, MessageType::DiscoverReply)?;
    if packet.payload.len() < 5 {
        return Err(ProtocolError::MalformedPacket(format!(
            "discovery reply payload has {} bytes, need 5",
            packet.payload.len()
        )));
    }
    Ok(read_u32(&packet.payload, 1))
}

fn expect_type(packet: &Packet, expected: MessageType) -> Result<(), ProtocolError> {
    if packet.kind != expected.code() {
        return Err(ProtocolError::MalformedPacket(format!(
            "expected packet type {:#04x}, got {:#04x}",
            expected.code(),
            packet.kind
        )));
    }
    Ok(())
}

/// 定长标签：去掉尾部 NUL 与首尾空白。
fn decode_label(raw: &[u8]) -> String {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).trim().to_string()
}
