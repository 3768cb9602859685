//! # 灯控协议能力模块
//!
//! 实现灯控网关的私有二进制协议：
//! - **报文编解码**：36 字节小端报文头 + 可变负载，TCP 流按长度字段重组
//! - **颜色空间**：`#rrggbb` 与 HSL、协议 16 位通道值互转
//! - **设备驱动**：构造开关/颜色/刷新/发现命令，解析灯状态与发现应答
//! - **网关会话**：每个网关一条 TCP 会话，断线后延迟重连
//! - **UDP 发现**：广播探测并收集在线网关
//!
//! ## 架构设计
//!
//! ```text
//! discovery::probe ──▶ DiscoveredGateway 集合
//!                             │
//!                             ▼
//!                     GatewayConnection ──▶ FrameBuffer ──▶ Inbound
//!                             ▲                                │
//!                  driver::build_*                             ▼
//!                             │                    GatewayEventHandler
//!                        命令下发方                   （灯状态上报）
//! ```

pub mod color;
pub mod connection;
pub mod discovery;
pub mod driver;
mod error;
pub mod packet;

pub use connection::{ConnectionConfig, GatewayConnection, GatewayEventHandler, Inbound};
pub use discovery::{DiscoveryConfig, probe};
pub use driver::ColorOverrides;
pub use error::ProtocolError;
pub use packet::{FrameBuffer, HardwareId, MessageType, Packet};
