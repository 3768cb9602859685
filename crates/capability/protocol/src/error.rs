//! 协议错误类型定义

/// 协议通信错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 报文截断或字段非法
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// 颜色字符串非法
    #[error("invalid color '{0}'")]
    InvalidColor(String),

    /// 连接错误
    #[error("connection error: {0}")]
    Connection(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 超时错误
    #[error("timeout: {0}")]
    Timeout(String),
}
