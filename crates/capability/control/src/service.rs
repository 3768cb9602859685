//! 灯控服务：控制接口的各项操作。
//!
//! 命令按设备所属网关下发；网关暂不可用时命令被丢弃并记录日志，不向调用方报错。

use crate::dispatcher::CommandDispatcher;
use crate::error::ControlError;
use crate::patterns::{PatternStore, describe};
use domain::{ActivePattern, now_epoch_secs};
use lightd_protocol::driver::{build_set_color, build_set_power};
use lightd_protocol::{ColorOverrides, HardwareId, Packet};
use lightd_storage::{ActivePatternStore, DeviceRecord, DeviceStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// 颜色命令：`{rgb}-{hue}-{saturation}-{brightness}-{dim}-{kelvin}`，空位取默认值。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorCommand {
    pub rgb_hex: String,
    pub overrides: ColorOverrides,
    /// 兼容字段，协议颜色报文不携带
    pub dim: Option<u16>,
}

impl ColorCommand {
    pub fn parse(value: &str) -> Result<Self, ControlError> {
        let mut parts = value.split('-');
        let rgb_hex = parts.next().unwrap_or_default().to_string();
        let mut positions = [None; 5];
        for slot in positions.iter_mut() {
            let Some(part) = parts.next() else { break };
            if part.is_empty() {
                continue;
            }
            *slot = Some(
                part.parse::<u16>()
                    .map_err(|_| ControlError::invalid_argument(part))?,
            );
        }
        if let Some(extra) = parts.next() {
            return Err(ControlError::invalid_argument(extra));
        }
        let [hue, saturation, brightness, dim, kelvin] = positions;
        Ok(Self {
            rgb_hex,
            overrides: ColorOverrides {
                hue,
                saturation,
                brightness,
                kelvin,
                fade_ms: None,
            },
            dim,
        })
    }
}

/// 解析 `on` / `off`。
pub fn parse_power(arg: &str) -> Result<bool, ControlError> {
    match arg {
        "on" => Ok(true),
        "off" => Ok(false),
        other => Err(ControlError::invalid_argument(other)),
    }
}

/// 灯控服务
#[derive(Clone)]
pub struct LightService {
    devices: Arc<dyn DeviceStore>,
    active: Arc<dyn ActivePatternStore>,
    patterns: Arc<PatternStore>,
    dispatcher: Arc<dyn CommandDispatcher>,
}

impl LightService {
    pub fn new(
        devices: Arc<dyn DeviceStore>,
        active: Arc<dyn ActivePatternStore>,
        patterns: Arc<PatternStore>,
        dispatcher: Arc<dyn CommandDispatcher>,
    ) -> Self {
        Self {
            devices,
            active,
            patterns,
            dispatcher,
        }
    }

    /// 开关灯；未指定标签时发往全部网关。
    pub async fn set_power(&self, on: bool, label: Option<&str>) -> Result<(), ControlError> {
        match label {
            Some(label) => {
                let device = self.device(label).await?;
                self.send_to(&device, build_set_power(on, device_target(&device)?))
                    .await;
            }
            None => self.broadcast(build_set_power(on, HardwareId::BROADCAST)).await,
        }
        info!(target: "lightd.control", power = on, label = ?label, "power_command");
        Ok(())
    }

    /// 设置颜色；未指定标签时发往全部网关。
    pub async fn set_color(
        &self,
        command: &ColorCommand,
        label: Option<&str>,
    ) -> Result<(), ControlError> {
        match label {
            Some(label) => {
                let device = self.device(label).await?;
                let packet =
                    build_set_color(&command.rgb_hex, &command.overrides, device_target(&device)?)?;
                self.send_to(&device, packet).await;
            }
            None => {
                let packet =
                    build_set_color(&command.rgb_hex, &command.overrides, HardwareId::BROADCAST)?;
                self.broadcast(packet).await;
            }
        }
        info!(target: "lightd.control", color = %command.rgb_hex, label = ?label, "color_command");
        Ok(())
    }

    /// 按标签查找设备（同名取最早出现的一条）。
    pub async fn device(&self, label: &str) -> Result<DeviceRecord, ControlError> {
        self.devices
            .find_by_label(label)
            .await?
            .ok_or_else(|| ControlError::NotFound(label.to_string()))
    }

    pub async fn devices(&self) -> Result<Vec<DeviceRecord>, ControlError> {
        Ok(self.devices.list_devices().await?)
    }

    pub async fn active_pattern(&self) -> Result<ActivePattern, ControlError> {
        Ok(self.active.current().await?)
    }

    pub fn pattern_names(&self) -> Vec<String> {
        self.patterns.names()
    }

    /// 应用场景。
    ///
    /// 逐条处理；遇到不存在的标签即返回 `NotFound`，此前已下发的命令不回滚，
    /// 当前场景标记也不更新。
    pub async fn apply_pattern(
        &self,
        name: &str,
        fade_ms: Option<u32>,
    ) -> Result<ActivePattern, ControlError> {
        let pattern = self
            .patterns
            .get(name)
            .ok_or_else(|| ControlError::UnknownPattern(name.to_string()))?;

        for (label, entry) in &pattern.entries {
            let device = self.device(label).await?;
            let target = device_target(&device)?;
            self.send_to(&device, build_set_power(entry.power, target))
                .await;
            if let Some(color) = &entry.color {
                let overrides = ColorOverrides {
                    kelvin: entry.kelvin,
                    fade_ms,
                    ..ColorOverrides::default()
                };
                self.send_to(&device, build_set_color(color, &overrides, target)?)
                    .await;
            }
        }

        let applied = ActivePattern {
            name: name.to_string(),
            applied_at: now_epoch_secs(),
        };
        self.active.set_current(applied.clone()).await?;
        info!(
            target: "lightd.control",
            pattern = %name,
            entries = pattern.entries.len(),
            fade_ms = ?fade_ms,
            "pattern_applied"
        );
        Ok(applied)
    }

    /// 以场景描述串导出当前全部设备状态（标签重复时取最早出现的一条）。
    pub async fn export(&self) -> Result<BTreeMap<String, String>, ControlError> {
        let mut exported = BTreeMap::new();
        for device in self.devices.list_devices().await? {
            let descriptor = describe(device.power, &device.color, device.extra.kelvin);
            exported.entry(device.label).or_insert(descriptor);
        }
        Ok(exported)
    }

    async fn send_to(&self, device: &DeviceRecord, packet: Packet) {
        if let Err(err) = self.dispatcher.dispatch(&device.gateway_id, packet).await {
            warn!(
                target: "lightd.control",
                label = %device.label,
                gateway_id = %device.gateway_id,
                error = %err,
                "command_dropped"
            );
        }
    }

    async fn broadcast(&self, packet: Packet) {
        match self.dispatcher.broadcast(packet).await {
            Ok(0) => warn!(target: "lightd.control", "broadcast_reached_no_gateway"),
            Ok(_) => {}
            Err(err) => warn!(target: "lightd.control", error = %err, "broadcast_failed"),
        }
    }
}

fn device_target(device: &DeviceRecord) -> Result<HardwareId, ControlError> {
    device
        .id
        .parse()
        .map_err(|_| ControlError::Storage(format!("invalid device id '{}'", device.id)))
}
