//! 场景定义
//!
//! 每个场景把设备标签映射到一个描述串：
//!
//! - `"off"`：关灯
//! - 其它：开灯；串中出现的 `#rrggbb` 作为颜色，`NNNNK` 作为色温，两者各自可选
//!
//! 例：`"#ff0000 2700K"`、`"on"`、`"4000K"`。

use std::collections::BTreeMap;

/// 场景中单个设备的目标状态。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternEntry {
    pub power: bool,
    /// 小写 `#rrggbb`
    pub color: Option<String>,
    pub kelvin: Option<u16>,
}

impl PatternEntry {
    /// 解析描述串；只有恰好为 `off` 时才表示关灯。
    pub fn parse(descriptor: &str) -> Self {
        if descriptor == "off" {
            return Self {
                power: false,
                color: None,
                kelvin: None,
            };
        }
        Self {
            power: true,
            color: find_color_token(descriptor),
            kelvin: find_kelvin_token(descriptor),
        }
    }
}

/// 由设备当前状态生成描述串（`parse` 的逆向）。
pub fn describe(power: bool, color: &str, kelvin: u16) -> String {
    if power {
        format!("{} {}K", color, kelvin)
    } else {
        "off".to_string()
    }
}

/// 第一个 `#` 后紧跟 6 位十六进制数字的片段。
fn find_color_token(descriptor: &str) -> Option<String> {
    let bytes = descriptor.as_bytes();
    bytes.iter().enumerate().find_map(|(index, byte)| {
        let digits = bytes.get(index + 1..index + 7)?;
        (*byte == b'#' && digits.iter().all(u8::is_ascii_hexdigit))
            .then(|| format!("#{}", String::from_utf8_lossy(digits).to_ascii_lowercase()))
    })
}

/// 第一段紧跟 `K` 的连续数字；超出 u16 时忽略。
fn find_kelvin_token(descriptor: &str) -> Option<u16> {
    let bytes = descriptor.as_bytes();
    let mut start = None;
    for (index, byte) in bytes.iter().enumerate() {
        if byte.is_ascii_digit() {
            start.get_or_insert(index);
            continue;
        }
        if let Some(from) = start.take() {
            if *byte == b'K' {
                return descriptor[from..index].parse().ok();
            }
        }
    }
    None
}

/// 一个命名场景，条目保持定义中的顺序。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub name: String,
    pub entries: Vec<(String, PatternEntry)>,
}

/// 启动时加载、之后只读的场景集合。
#[derive(Debug, Clone, Default)]
pub struct PatternStore {
    patterns: BTreeMap<String, Pattern>,
}

impl PatternStore {
    /// 由 `{场景名: [(设备标签, 描述串)]}` 构建。
    pub fn load(definitions: &BTreeMap<String, Vec<(String, String)>>) -> Self {
        let patterns = definitions
            .iter()
            .map(|(name, entries)| {
                let pattern = Pattern {
                    name: name.clone(),
                    entries: entries
                        .iter()
                        .map(|(label, descriptor)| (label.clone(), PatternEntry::parse(descriptor)))
                        .collect(),
                };
                (name.clone(), pattern)
            })
            .collect();
        Self { patterns }
    }

    pub fn get(&self, name: &str) -> Option<&Pattern> {
        self.patterns.get(name)
    }

    /// 已加载场景名（有序）
    pub fn names(&self) -> Vec<String> {
        self.patterns.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
