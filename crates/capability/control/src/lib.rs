//! # lightd Control 模块
//!
//! 网关注册表与灯控操作：
//!
//! ```text
//! 发现结果 ──reconcile──▶ GatewayRegistry ──GatewayConnection──▶ 网关
//!                              ▲  │ 灯状态上报
//!            CommandDispatcher │  ▼
//!                         LightService ◀── DeviceStore ◀── DeviceStateSink
//! ```
//!
//! - [`registry`]：网关注册表、调和、命令下发（实现 [`CommandDispatcher`]）
//! - [`sink`]：把会话上报写入设备注册表
//! - [`patterns`]：场景定义与描述串解析
//! - [`service`]：控制接口各项操作

pub mod dispatcher;
mod error;
pub mod patterns;
pub mod registry;
pub mod service;
pub mod sink;

pub use dispatcher::CommandDispatcher;
pub use error::ControlError;
pub use patterns::{Pattern, PatternEntry, PatternStore};
pub use registry::{GatewayRegistry, GatewayRegistryConfig, GatewaySnapshot, ReconcileReport};
pub use service::{ColorCommand, LightService, parse_power};
pub use sink::DeviceStateSink;
