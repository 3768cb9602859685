//! 追踪初始化、请求 ID 生成与进程级计数器。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 计数器快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub packets_received: u64,
    pub packets_malformed: u64,
    pub light_states: u64,
    pub commands_sent: u64,
    pub commands_dropped: u64,
    pub discovery_probes: u64,
    pub gateways_added: u64,
    pub gateways_removed: u64,
    pub devices_evicted: u64,
}

/// 进程级计数器。
#[derive(Default)]
pub struct TelemetryMetrics {
    packets_received: AtomicU64,
    packets_malformed: AtomicU64,
    light_states: AtomicU64,
    commands_sent: AtomicU64,
    commands_dropped: AtomicU64,
    discovery_probes: AtomicU64,
    gateways_added: AtomicU64,
    gateways_removed: AtomicU64,
    devices_evicted: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_malformed: self.packets_malformed.load(Ordering::Relaxed),
            light_states: self.light_states.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            commands_dropped: self.commands_dropped.load(Ordering::Relaxed),
            discovery_probes: self.discovery_probes.load(Ordering::Relaxed),
            gateways_added: self.gateways_added.load(Ordering::Relaxed),
            gateways_removed: self.gateways_removed.load(Ordering::Relaxed),
            devices_evicted: self.devices_evicted.load(Ordering::Relaxed),
        }
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局计数器实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录收到的完整报文。
pub fn record_packet_received() {
    metrics().packets_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录被丢弃的畸形报文。
pub fn record_packet_malformed() {
    metrics().packets_malformed.fetch_add(1, Ordering::Relaxed);
}

/// 记录解析成功的灯状态上报。
pub fn record_light_state() {
    metrics().light_states.fetch_add(1, Ordering::Relaxed);
}

/// 记录写出的命令报文。
pub fn record_command_sent() {
    metrics().commands_sent.fetch_add(1, Ordering::Relaxed);
}

/// 记录因网关不可用而丢弃的命令。
pub fn record_command_dropped() {
    metrics().commands_dropped.fetch_add(1, Ordering::Relaxed);
}

pub fn record_discovery_probe() {
    metrics().discovery_probes.fetch_add(1, Ordering::Relaxed);
}

pub fn record_gateway_added() {
    metrics().gateways_added.fetch_add(1, Ordering::Relaxed);
}

pub fn record_gateway_removed() {
    metrics().gateways_removed.fetch_add(1, Ordering::Relaxed);
}

/// 记录过期清理掉的设备数。
pub fn record_devices_evicted(count: usize) {
    metrics()
        .devices_evicted
        .fetch_add(count as u64, Ordering::Relaxed);
}
