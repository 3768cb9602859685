//! 报文编解码
//!
//! 固定 36 字节报文头 + 可变负载，所有整数均为小端序：
//!
//! ```text
//! offset  field
//!  0      size        u16   报文总长（含头）
//!  2      protocol    u16
//!  4      reserved    u32
//!  8      target      6B    目标设备硬件标识，全零表示网关内广播
//! 14      reserved    u16
//! 16      gateway     6B    所属网关硬件标识
//! 22      reserved    u16
//! 24      ts_hi       u32
//! 28      ts_lo       u32
//! 32      type        u16
//! 34      reserved    u16
//! 36      payload     size - 36
//! ```

use crate::error::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// 报文头长度
pub const HEADER_LENGTH: usize = 36;

/// 默认协议标记
pub const DEFAULT_PROTOCOL_TAG: u16 = 13312;

/// 本系统收发的报文类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MessageType {
    Discover = 0x02,
    DiscoverReply = 0x03,
    SetPower = 0x15,
    GetAllStates = 0x65,
    SetColor = 0x66,
    LightState = 0x6b,
}

impl MessageType {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x02 => Some(Self::Discover),
            0x03 => Some(Self::DiscoverReply),
            0x15 => Some(Self::SetPower),
            0x65 => Some(Self::GetAllStates),
            0x66 => Some(Self::SetColor),
            0x6b => Some(Self::LightState),
            _ => None,
        }
    }
}

/// 6 字节硬件标识，文本形式为 12 位小写十六进制。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HardwareId([u8; 6]);

impl HardwareId {
    /// 网关内广播（全零）
    pub const BROADCAST: Self = Self([0; 6]);

    pub const fn from_bytes(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == [0; 6]
    }
}

impl fmt::Display for HardwareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl FromStr for HardwareId {
    type Err = ProtocolError;

    /// 空串解析为广播标识。
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() {
            return Ok(Self::BROADCAST);
        }
        if value.len() != 12 || !value.bytes().all(|byte| byte.is_ascii_hexdigit()) {
            return Err(ProtocolError::MalformedPacket(format!(
                "invalid hardware id '{}'",
                value
            )));
        }
        let mut bytes = [0u8; 6];
        for (index, byte) in bytes.iter_mut().enumerate() {
            let pair = &value[index * 2..index * 2 + 2];
            *byte = u8::from_str_radix(pair, 16).map_err(|_| {
                ProtocolError::MalformedPacket(format!("invalid hardware id '{}'", value))
            })?;
        }
        Ok(Self(bytes))
    }
}

/// 协议报文。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub protocol_tag: u16,
    pub target: HardwareId,
    pub gateway: HardwareId,
    pub timestamp: u64,
    pub kind: u16,
    pub payload: Vec<u8>,
}

impl Packet {
    /// 构造待发送报文（网关标识由会话在发送时写入）。
    pub fn new(kind: MessageType, target: HardwareId, payload: Vec<u8>) -> Self {
        Self {
            protocol_tag: DEFAULT_PROTOCOL_TAG,
            target,
            gateway: HardwareId::BROADCAST,
            timestamp: 0,
            kind: kind.code(),
            payload,
        }
    }

    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_code(self.kind)
    }

    /// 编码后的总长度；超出 u16 时报错。
    pub fn size(&self) -> Result<u16, ProtocolError> {
        let total = HEADER_LENGTH + self.payload.len();
        u16::try_from(total).map_err(|_| {
            ProtocolError::MalformedPacket(format!("packet of {} bytes exceeds size field", total))
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let size = self.size()?;
        let mut out = Vec::with_capacity(HEADER_LENGTH + self.payload.len());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&self.protocol_tag.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(self.target.as_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(self.gateway.as_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&((self.timestamp >> 32) as u32).to_le_bytes());
        out.extend_from_slice(&(self.timestamp as u32).to_le_bytes());
        out.extend_from_slice(&self.kind.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < HEADER_LENGTH {
            return Err(ProtocolError::MalformedPacket(format!(
                "need {} header bytes, got {}",
                HEADER_LENGTH,
                bytes.len()
            )));
        }
        let size = read_u16(bytes, 0) as usize;
        if size < HEADER_LENGTH || size > bytes.len() {
            return Err(ProtocolError::MalformedPacket(format!(
                "declared size {} with {} bytes available",
                size,
                bytes.len()
            )));
        }
        let ts_hi = read_u32(bytes, 24) as u64;
        let ts_lo = read_u32(bytes, 28) as u64;
        Ok(Self {
            protocol_tag: read_u16(bytes, 2),
            target: read_id(bytes, 8),
            gateway: read_id(bytes, 16),
            timestamp: (ts_hi << 32) | ts_lo,
            kind: read_u16(bytes, 32),
            payload: bytes[HEADER_LENGTH..size].to_vec(),
        })
    }
}

/// TCP 字节流重组缓冲区：以前两个字节的长度字段切帧。
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buffer: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// 已缓冲但尚未成帧的字节数
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// 取出下一帧；数据不足时返回 `None`。
    ///
    /// 长度字段小于报文头时无法再定位帧边界，缓冲区被整体丢弃。
    pub fn next_packet(&mut self) -> Option<Result<Packet, ProtocolError>> {
        if self.buffer.len() < 2 {
            return None;
        }
        let size = read_u16(&self.buffer, 0) as usize;
        if size < HEADER_LENGTH {
            let dropped = self.buffer.len();
            self.buffer.clear();
            return Some(Err(ProtocolError::MalformedPacket(format!(
                "frame size {} below header length, dropped {} bytes",
                size, dropped
            ))));
        }
        if self.buffer.len() < size {
            return None;
        }
        let frame: Vec<u8> = self.buffer.drain(..size).collect();
        Some(Packet::decode(&frame))
    }
}

pub(crate) fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn read_id(bytes: &[u8], offset: usize) -> HardwareId {
    let mut id = [0u8; 6];
    id.copy_from_slice(&bytes[offset..offset + 6]);
    HardwareId::from_bytes(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(kind: u16, payload: Vec<u8>) -> Packet {
        Packet {
            protocol_tag: DEFAULT_PROTOCOL_TAG,
            target: "d073d5012345".parse().unwrap(),
            gateway: "d073d5000001".parse().unwrap(),
            timestamp: 0x0000_0001_8000_0002,
            kind,
            payload,
        }
    }

    #[test]
    fn header_layout_is_little_endian() {
        let bytes = sample(0x66, vec![1, 2, 3]).encode().unwrap();
        assert_eq!(bytes.len(), 39);
        assert_eq!(&bytes[0..2], &[39, 0]);
        assert_eq!(&bytes[2..4], &13312u16.to_le_bytes());
        assert_eq!(&bytes[8..14], &[0xd0, 0x73, 0xd5, 0x01, 0x23, 0x45]);
        assert_eq!(&bytes[32..34], &[0x66, 0]);
        assert_eq!(&bytes[36..], &[1, 2, 3]);
    }

    #[test]
    fn decode_restores_every_field() {
        for (kind, len) in [(0x02u16, 0usize), (0x6b, 52), (0x1234, 64), (0xffff, 7)] {
            let payload: Vec<u8> = (0..len).map(|i| (i * 7 + kind as usize) as u8).collect();
            let packet = sample(kind, payload);
            assert_eq!(Packet::decode(&packet.encode().unwrap()).unwrap(), packet);
        }
    }

    #[test]
    fn decode_rejects_short_input() {
        assert!(matches!(
            Packet::decode(&[0u8; 20]),
            Err(ProtocolError::MalformedPacket(_))
        ));
    }

    #[test]
    fn decode_rejects_size_past_end() {
        let mut bytes = sample(0x15, vec![1, 0]).encode().unwrap();
        bytes.truncate(37);
        assert!(Packet::decode(&bytes).is_err());
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        let packet = sample(0x15, vec![1, 0]);
        let mut bytes = packet.encode().unwrap();
        bytes.extend_from_slice(&[9, 9, 9]);
        assert_eq!(Packet::decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn hardware_id_parses_and_prints() {
        let id: HardwareId = "D073D5ABCDEF".parse().unwrap();
        assert_eq!(id.to_string(), "d073d5abcdef");
        assert!("".parse::<HardwareId>().unwrap().is_broadcast());
        assert!("d073d5".parse::<HardwareId>().is_err());
        assert!("zz73d5abcdef".parse::<HardwareId>().is_err());
        assert!("+1+2+3+4+5+6".parse::<HardwareId>().is_err());
    }

    #[test]
    fn encode_rejects_payload_past_size_field() {
        let packet = sample(0x66, vec![0; usize::from(u16::MAX)]);
        assert!(matches!(
            packet.encode(),
            Err(ProtocolError::MalformedPacket(_))
        ));
        let largest = sample(0x66, vec![0; usize::from(u16::MAX) - HEADER_LENGTH]);
        assert_eq!(largest.size().unwrap(), u16::MAX);
    }

    #[test]
    fn frame_buffer_reassembles_split_stream() {
        let first = sample(0x6b, vec![0xaa; 52]);
        let second = sample(0x03, vec![1, 0x7c, 0xdd, 0, 0]);
        let mut stream = first.encode().unwrap();
        stream.extend(second.encode().unwrap());

        let mut frames = FrameBuffer::new();
        frames.extend(&stream[..10]);
        assert!(frames.next_packet().is_none());
        frames.extend(&stream[10..100]);
        assert_eq!(frames.next_packet().unwrap().unwrap(), first);
        assert!(frames.next_packet().is_none());
        frames.extend(&stream[100..]);
        assert_eq!(frames.next_packet().unwrap().unwrap(), second);
        assert_eq!(frames.pending(), 0);
    }

    #[test]
    fn frame_buffer_drops_unframeable_bytes() {
        let mut frames = FrameBuffer::new();
        frames.extend(&[4, 0, 1, 2, 3, 4, 5]);
        assert!(matches!(
            frames.next_packet(),
            Some(Err(ProtocolError::MalformedPacket(_)))
        ));
        assert_eq!(frames.pending(), 0);
    }
}
