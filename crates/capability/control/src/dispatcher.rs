//! 命令下发抽象

use crate::error::ControlError;
use async_trait::async_trait;
use lightd_protocol::Packet;

/// 命令下发器抽象。
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    /// 发往指定网关；网关不存在或不可写时返回 `Dispatch` 错误。
    async fn dispatch(&self, gateway_id: &str, packet: Packet) -> Result<(), ControlError>;

    /// 发往全部已连接网关，返回实际发出的份数。
    async fn broadcast(&self, packet: Packet) -> Result<usize, ControlError>;
}
