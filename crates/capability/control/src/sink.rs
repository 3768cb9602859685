//! 网关会话事件 → 设备注册表

use async_trait::async_trait;
use domain::{LightState, now_epoch_ms};
use lightd_protocol::GatewayEventHandler;
use lightd_storage::DeviceStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// 将灯状态上报写入设备注册表。
pub struct DeviceStateSink {
    devices: Arc<dyn DeviceStore>,
}

impl DeviceStateSink {
    pub fn new(devices: Arc<dyn DeviceStore>) -> Self {
        Self { devices }
    }
}

#[async_trait]
impl GatewayEventHandler for DeviceStateSink {
    async fn on_light_state(&self, state: LightState) {
        let device_id = state.id.clone();
        if let Err(err) = self.devices.upsert(state, now_epoch_ms()).await {
            warn!(target: "lightd.control", device_id = %device_id, error = %err, "device_upsert_failed");
        }
    }

    async fn on_session(&self, address: SocketAddr, gateway_id: &str) {
        info!(target: "lightd.control", %address, gateway_id = %gateway_id, "gateway_session_established");
    }
}
