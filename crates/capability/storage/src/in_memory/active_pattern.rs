use crate::error::StorageError;
use crate::traits::ActivePatternStore;
use domain::ActivePattern;
use std::sync::RwLock;

/// 当前场景标记内存存储，初始为哨兵值 `off@0`。
#[derive(Default)]
pub struct InMemoryActivePatternStore {
    current: RwLock<ActivePattern>,
}

impl InMemoryActivePatternStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ActivePatternStore for InMemoryActivePatternStore {
    async fn current(&self) -> Result<ActivePattern, StorageError> {
        self.current
            .read()
            .map(|current| current.clone())
            .map_err(|_| StorageError::new("lock failed"))
    }

    async fn set_current(&self, pattern: ActivePattern) -> Result<(), StorageError> {
        let mut current = self
            .current
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        *current = pattern;
        Ok(())
    }
}
