//! 设备注册表内存实现

use crate::error::StorageError;
use crate::models::DeviceRecord;
use crate::traits::DeviceStore;
use domain::LightState;
use std::collections::HashMap;
use std::sync::RwLock;

struct Entry {
    seq: u64,
    record: DeviceRecord,
}

#[derive(Default)]
struct Registry {
    devices: HashMap<String, Entry>,
    next_seq: u64,
}

impl Registry {
    fn ordered(&self) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self.devices.values().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries
    }
}

/// 设备注册表内存存储
#[derive(Default)]
pub struct InMemoryDeviceStore {
    inner: RwLock<Registry>,
}

impl InMemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前设备数量（用于测试）
    pub fn len(&self) -> usize {
        self.inner.read().map(|r| r.devices.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl DeviceStore for InMemoryDeviceStore {
    async fn upsert(
        &self,
        state: LightState,
        seen_at_ms: i64,
    ) -> Result<DeviceRecord, StorageError> {
        let mut registry = self
            .inner
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if let Some(entry) = registry.devices.get_mut(&state.id) {
            entry.record.apply(state, seen_at_ms);
            return Ok(entry.record.clone());
        }
        let seq = registry.next_seq;
        registry.next_seq += 1;
        let record = DeviceRecord::from_state(state, seen_at_ms);
        registry.devices.insert(
            record.id.clone(),
            Entry {
                seq,
                record: record.clone(),
            },
        );
        Ok(record)
    }

    async fn list_devices(&self) -> Result<Vec<DeviceRecord>, StorageError> {
        let registry = self
            .inner
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(registry
            .ordered()
            .into_iter()
            .map(|entry| entry.record.clone())
            .collect())
    }

    async fn find_by_label(&self, label: &str) -> Result<Option<DeviceRecord>, StorageError> {
        let registry = self
            .inner
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(registry
            .devices
            .values()
            .filter(|entry| entry.record.label == label)
            .min_by_key(|entry| entry.seq)
            .map(|entry| entry.record.clone()))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<DeviceRecord>, StorageError> {
        let registry = self
            .inner
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(registry.devices.get(id).map(|entry| entry.record.clone()))
    }

    async fn evict_stale(
        &self,
        ttl_secs: u64,
        now_ms: i64,
    ) -> Result<Vec<DeviceRecord>, StorageError> {
        let mut registry = self
            .inner
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let stale: Vec<String> = registry
            .devices
            .values()
            .filter(|entry| entry.record.is_stale(ttl_secs, now_ms))
            .map(|entry| entry.record.id.clone())
            .collect();
        Ok(stale
            .iter()
            .filter_map(|id| registry.devices.remove(id))
            .map(|entry| entry.record)
            .collect())
    }
}
