//! 存储数据模型

use domain::{LightExtra, LightState};

/// 设备注册表中的一条灯记录。
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub id: String,
    /// 控制接口按标签查找，区分大小写
    pub label: String,
    pub gateway_id: String,
    pub tags: u64,
    pub power: bool,
    pub color: String,
    pub extra: LightExtra,
    /// 最近一次上报时间（毫秒）
    pub last_seen_at_ms: i64,
}

impl DeviceRecord {
    pub fn from_state(state: LightState, seen_at_ms: i64) -> Self {
        Self {
            id: state.id,
            label: state.label,
            gateway_id: state.gateway_id,
            tags: state.tags,
            power: state.power,
            color: state.color,
            extra: state.extra,
            last_seen_at_ms: seen_at_ms,
        }
    }

    /// 用新的上报原地更新，`last_seen_at_ms` 不回退。
    pub fn apply(&mut self, state: LightState, seen_at_ms: i64) {
        self.label = state.label;
        self.gateway_id = state.gateway_id;
        self.tags = state.tags;
        self.power = state.power;
        self.color = state.color;
        self.extra = state.extra;
        self.last_seen_at_ms = self.last_seen_at_ms.max(seen_at_ms);
    }

    /// 距 `now_ms` 是否已超过 `ttl_secs`（严格大于）。
    pub fn is_stale(&self, ttl_secs: u64, now_ms: i64) -> bool {
        let ttl_ms = i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        now_ms.saturating_sub(self.last_seen_at_ms) > ttl_ms
    }
}
