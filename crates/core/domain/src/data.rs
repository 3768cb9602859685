/// 灯设备上报状态（由 0x6b 报文解析而来）。
#[derive(Debug, Clone, PartialEq)]
pub struct LightState {
    /// 设备硬件标识（12 位小写十六进制）
    pub id: String,
    /// 所属网关硬件标识
    pub gateway_id: String,
    pub label: String,
    pub tags: u64,
    pub power: bool,
    /// 归一化颜色 `#rrggbb`
    pub color: String,
    pub extra: LightExtra,
}

/// 报文中的原始 16 位通道值。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LightExtra {
    pub hue: u16,
    pub saturation: u16,
    pub brightness: u16,
    pub dim: u16,
    pub kelvin: u16,
}
