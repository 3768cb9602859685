//! 调度循环装配模块
//!
//! 每个周期依次执行：UDP 发现 → 网关注册表调和 → 过期设备清理 → 设备状态转储（debug）。
//! 发现失败时跳过本轮调和，已有会话保持不变。

use domain::now_epoch_ms;
use lightd_control::GatewayRegistry;
use lightd_protocol::{DiscoveryConfig, probe};
use lightd_storage::DeviceStore;
use lightd_telemetry::record_devices_evicted;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub struct Scheduler {
    discovery: DiscoveryConfig,
    gateways: Arc<GatewayRegistry>,
    devices: Arc<dyn DeviceStore>,
    device_ttl_seconds: u64,
    interval: Duration,
}

impl Scheduler {
    pub fn new(
        discovery: DiscoveryConfig,
        gateways: Arc<GatewayRegistry>,
        devices: Arc<dyn DeviceStore>,
        device_ttl_seconds: u64,
        interval: Duration,
    ) -> Self {
        Self {
            discovery,
            gateways,
            devices,
            device_ttl_seconds,
            interval,
        }
    }

    /// 后台运行，首个周期立即执行。
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        })
    }

    pub async fn tick(&self) {
        match probe(&self.discovery).await {
            Ok(discovered) => {
                let report = self.gateways.reconcile(&discovered).await;
                if !report.added.is_empty() || !report.removed.is_empty() {
                    info!(
                        target: "lightd.api",
                        added = ?report.added,
                        removed = ?report.removed,
                        failed = ?report.failed,
                        "gateways_reconciled"
                    );
                }
            }
            Err(err) => {
                warn!(target: "lightd.api", error = %err, "discovery_failed");
            }
        }

        match self
            .devices
            .evict_stale(self.device_ttl_seconds, now_epoch_ms())
            .await
        {
            Ok(evicted) if !evicted.is_empty() => {
                record_devices_evicted(evicted.len());
                for device in &evicted {
                    info!(target: "lightd.api", device_id = %device.id, label = %device.label, "device_evicted");
                }
            }
            Ok(_) => {}
            Err(err) => warn!(target: "lightd.api", error = %err, "device_eviction_failed"),
        }

        self.dump().await;
    }

    async fn dump(&self) {
        if !tracing::enabled!(target: "lightd.api", tracing::Level::DEBUG) {
            return;
        }
        let Ok(devices) = self.devices.list_devices().await else {
            return;
        };
        for device in devices {
            debug!(
                target: "lightd.api",
                "{} {} {} @ {}K",
                device.label,
                if device.power { "on" } else { "off" },
                device.color,
                device.extra.kelvin
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{LightExtra, LightState};
    use lightd_control::{DeviceStateSink, GatewayRegistryConfig};
    use lightd_storage::InMemoryDeviceStore;
    use tokio::net::UdpSocket;

    #[tokio::test]
    async fn tick_evicts_stale_devices_even_without_gateways() {
        let devices = Arc::new(InMemoryDeviceStore::new());
        let state = LightState {
            id: "d073d5aaaaaa".to_string(),
            gateway_id: "d073d5000001".to_string(),
            label: "Kitchen".to_string(),
            tags: 0,
            power: true,
            color: "#ffffff".to_string(),
            extra: LightExtra::default(),
        };
        devices
            .upsert(state, now_epoch_ms() - 200_000)
            .await
            .unwrap();

        // 无应答的目标：每轮都超时
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let discovery = DiscoveryConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            target_addr: silent.local_addr().unwrap(),
            passes: 1,
            pass_timeout: Duration::from_millis(50),
        };
        let gateways = Arc::new(GatewayRegistry::new(
            GatewayRegistryConfig::default(),
            Arc::new(DeviceStateSink::new(devices.clone())),
        ));
        let scheduler = Scheduler::new(
            discovery,
            gateways.clone(),
            devices.clone(),
            100,
            Duration::from_secs(5),
        );
        scheduler.tick().await;

        assert!(devices.is_empty());
        assert!(gateways.is_empty().await);
    }
}
