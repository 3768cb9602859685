//! 存储接口 Trait 定义
//!
//! - DeviceStore：设备注册表（网络接收路径写入，控制路径读取）
//! - ActivePatternStore：当前场景标记
//!
//! 两条路径并发访问，实现需自行保证互斥。

use crate::error::StorageError;
use crate::models::DeviceRecord;
use async_trait::async_trait;
use domain::{ActivePattern, LightState};

/// 设备注册表接口
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// 已知设备原地更新，未知设备插入新记录。
    async fn upsert(
        &self,
        state: LightState,
        seen_at_ms: i64,
    ) -> Result<DeviceRecord, StorageError>;

    /// 全部设备快照（按首次出现顺序）
    async fn list_devices(&self) -> Result<Vec<DeviceRecord>, StorageError>;

    /// 按标签查找，多条同名时返回最早出现的一条
    async fn find_by_label(&self, label: &str) -> Result<Option<DeviceRecord>, StorageError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<DeviceRecord>, StorageError>;

    /// 删除 `now - last_seen > ttl` 的设备，返回被删除的记录。
    async fn evict_stale(
        &self,
        ttl_secs: u64,
        now_ms: i64,
    ) -> Result<Vec<DeviceRecord>, StorageError>;
}

/// 当前场景标记（后写覆盖）
#[async_trait]
pub trait ActivePatternStore: Send + Sync {
    async fn current(&self) -> Result<ActivePattern, StorageError>;

    async fn set_current(&self, pattern: ActivePattern) -> Result<(), StorageError>;
}
