//! # lightd Storage 模块
//!
//! 进程内可变共享状态的存储抽象：
//!
//! 1. **接口抽象层** (`traits.rs`)：`DeviceStore`、`ActivePatternStore`
//! 2. **数据模型层** (`models.rs`)：`DeviceRecord`
//! 3. **错误处理层** (`error.rs`)：`StorageError`
//! 4. **实现层** (`in_memory/`)：`RwLock` 保护的内存实现
//!
//! 设备记录由网关会话的接收路径写入，由控制接口读取；两条路径运行在不同任务中，
//! 所有实现内部加锁，单次变更不会交错。
//!
//! ```rust,ignore
//! use lightd_storage::{DeviceStore, InMemoryDeviceStore};
//!
//! let store = InMemoryDeviceStore::new();
//! store.upsert(state, domain::now_epoch_ms()).await?;
//! let kitchen = store.find_by_label("Kitchen").await?;
//! let evicted = store.evict_stale(100, domain::now_epoch_ms()).await?;
//! ```

pub mod error;
pub mod in_memory;
pub mod models;
pub mod traits;

pub use error::*;
pub use models::*;
pub use traits::*;

pub use in_memory::{InMemoryActivePatternStore, InMemoryDeviceStore};
