//! 应用运行配置加载。
//!
//! - 环境变量：`AppConfig::from_env`（均有默认值）
//! - 场景文件：`load_scenes`，JSON `{scene: {label: descriptor}}`，
//!   每个场景内的条目保持文件中的书写顺序

use serde::Deserialize;
use serde::de::{Deserializer, MapAccess, Visitor};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
    #[error("invalid scene file {0}: {1}")]
    SceneFile(String, String),
}

/// 场景定义：场景名 → 按文件顺序排列的 `(设备标签, 描述串)`。
pub type SceneDefinitions = BTreeMap<String, Vec<(String, String)>>;

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub device_port: u16,
    pub broadcast_addr: IpAddr,
    pub discovery_passes: u32,
    pub discovery_pass_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub reconnect_delay_ms: u64,
    pub reconcile_interval_seconds: u64,
    pub refresh_interval_seconds: u64,
    pub device_ttl_seconds: u64,
    pub scenes_file: String,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            http_addr: read_with_default("LIGHTD_HTTP_ADDR", "0.0.0.0:5439".to_string())?,
            device_port: read_with_default("LIGHTD_DEVICE_PORT", 56700)?,
            broadcast_addr: read_with_default(
                "LIGHTD_BROADCAST_ADDR",
                IpAddr::from([255, 255, 255, 255]),
            )?,
            discovery_passes: read_with_default("LIGHTD_DISCOVERY_PASSES", 5)?,
            discovery_pass_timeout_ms: read_with_default("LIGHTD_DISCOVERY_PASS_TIMEOUT_MS", 1000)?,
            connect_timeout_ms: read_with_default("LIGHTD_CONNECT_TIMEOUT_MS", 3000)?,
            reconnect_delay_ms: read_with_default("LIGHTD_RECONNECT_DELAY_MS", 3000)?,
            reconcile_interval_seconds: read_with_default("LIGHTD_RECONCILE_INTERVAL_SECONDS", 5)?,
            refresh_interval_seconds: read_with_default("LIGHTD_REFRESH_INTERVAL_SECONDS", 2)?,
            device_ttl_seconds: read_with_default("LIGHTD_DEVICE_TTL_SECONDS", 100)?,
            scenes_file: read_with_default("LIGHTD_SCENES_FILE", "scenes.json".to_string())?,
        })
    }

    pub fn discovery_pass_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_pass_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_seconds.max(1))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds)
    }
}

/// 读取场景文件；文件不存在时返回空集合。
pub fn load_scenes(path: impl AsRef<Path>) -> Result<SceneDefinitions, ConfigError> {
    let path = path.as_ref();
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "scene file not found, no patterns loaded");
            return Ok(SceneDefinitions::new());
        }
        Err(err) => {
            return Err(ConfigError::SceneFile(
                path.display().to_string(),
                err.to_string(),
            ));
        }
    };
    parse_scenes(&raw).map_err(|err| ConfigError::SceneFile(path.display().to_string(), err))
}

/// 解析场景 JSON 文本。
pub fn parse_scenes(raw: &str) -> Result<SceneDefinitions, String> {
    let scenes: BTreeMap<String, OrderedEntries> =
        serde_json::from_str(raw).map_err(|err| err.to_string())?;
    Ok(scenes
        .into_iter()
        .map(|(name, entries)| (name, entries.0))
        .collect())
}

/// 按出现顺序收集的 JSON 对象；重复标签取最后一个值，位置不变。
struct OrderedEntries(Vec<(String, String)>);

impl<'de> Deserialize<'de> for OrderedEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = OrderedEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of device label to descriptor")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries: Vec<(String, String)> = Vec::new();
                while let Some((label, descriptor)) = map.next_entry::<String, String>()? {
                    match entries.iter_mut().find(|(known, _)| *known == label) {
                        Some(entry) => entry.1 = descriptor,
                        None => entries.push((label, descriptor)),
                    }
                }
                Ok(OrderedEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// 读取环境变量，未设置时取默认值，设置为空串视为缺失。
fn read_with_default<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(key.to_string()));
    }
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}
