pub mod data;

pub use data::{LightExtra, LightState};

use std::fmt;
use std::net::IpAddr;

/// 网关会话状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    NeedsReconnect,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::NeedsReconnect => "needs_reconnect",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次 UDP 发现得到的网关。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredGateway {
    pub gateway_id: String,
    pub address: IpAddr,
    pub port: u16,
}

/// 当前生效的场景。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePattern {
    pub name: String,
    /// 应用时间（秒）
    pub applied_at: i64,
}

impl Default for ActivePattern {
    /// 进程启动时的哨兵值。
    fn default() -> Self {
        Self {
            name: "off".to_string(),
            applied_at: 0,
        }
    }
}

/// 获取当前时间戳（毫秒）
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// 获取当前时间戳（秒）
pub fn now_epoch_secs() -> i64 {
    now_epoch_ms() / 1000
}
