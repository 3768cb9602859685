//! 内存存储实现模块
//!
//! 设备注册表与场景标记均不持久化，进程重启后由网络重新构建。
//!
//! - DeviceStore: InMemoryDeviceStore
//! - ActivePatternStore: InMemoryActivePatternStore

pub mod active_pattern;
pub mod device_registry;

pub use active_pattern::*;
pub use device_registry::*;
