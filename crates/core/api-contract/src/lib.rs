//! 稳定的 DTO 与 API 响应契约。

use serde::{Deserialize, Serialize};

/// 响应状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// 标准 API 响应封装：`{status, errorMessage, object}`，缺省字段输出 `null`。
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status: ResponseStatus,
    pub error_message: Option<String>,
    pub object: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(object: T) -> Self {
        Self {
            status: ResponseStatus::Success,
            error_message: None,
            object: Some(object),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            error_message: Some(message.into()),
            object: None,
        }
    }
}

impl ApiResponse<()> {
    /// 无返回体的成功响应（命令类接口）。
    pub fn ok() -> Self {
        Self {
            status: ResponseStatus::Success,
            error_message: None,
            object: None,
        }
    }
}

/// 灯设备。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDto {
    pub id: String,
    pub label: String,
    pub gateway_id: String,
    pub tags: u64,
    pub power: bool,
    /// `#rrggbb`
    pub color: String,
    pub extra: LightExtraDto,
    /// 最近一次上报时间（毫秒）
    pub last_seen_at: i64,
}

/// 原始 16 位通道值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightExtraDto {
    pub hue: u16,
    pub saturation: u16,
    pub brightness: u16,
    pub dim: u16,
    pub kelvin: u16,
}

/// 当前场景：`ts` 为应用时间（秒），未应用过时为 `off` / `0`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternStatusDto {
    pub current: String,
    pub ts: i64,
}

/// 网关注册表条目。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayDto {
    pub id: String,
    pub address: String,
    pub port: u16,
    /// disconnected / connecting / connected / needs_reconnect
    pub connection_state: String,
    pub session_gateway_id: Option<String>,
    /// 最近一次全量刷新时间（毫秒）
    pub last_refresh_at: i64,
}

/// 进程计数器。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsDto {
    pub packets_received: u64,
    pub packets_malformed: u64,
    pub light_states: u64,
    pub commands_sent: u64,
    pub commands_dropped: u64,
    pub discovery_probes: u64,
    pub gateways_added: u64,
    pub gateways_removed: u64,
    pub devices_evicted: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthDto {
    pub ok: bool,
}
