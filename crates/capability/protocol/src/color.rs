//! 颜色空间转换
//!
//! `#rrggbb` 与归一化 HSL 三元组（各分量 ∈ [0, 1]）互转。
//! 无彩色（饱和度为 0）时色相统一取 0。

use crate::error::ProtocolError;

/// 协议 16 位通道的满量程
pub const CHANNEL_MAX: f64 = 0xFFFF as f64;

/// HSL 转 `#rrggbb`（小写），各通道四舍五入到字节。
pub fn hsl_to_rgb_hex(hue: f64, saturation: f64, lightness: f64) -> String {
    let (r, g, b) = hsl_to_rgb(hue, saturation, lightness);
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

/// `#rrggbb`（`#` 可省略）转 HSL。
pub fn rgb_hex_to_hsl(value: &str) -> Result<(f64, f64, f64), ProtocolError> {
    let (r, g, b) = parse_rgb_hex(value)?;
    Ok(rgb_to_hsl(r, g, b))
}

/// 解析 `#rrggbb`，必须恰好 6 位十六进制数字。
pub fn parse_rgb_hex(value: &str) -> Result<(u8, u8, u8), ProtocolError> {
    let digits = value.strip_prefix('#').unwrap_or(value);
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ProtocolError::InvalidColor(value.to_string()));
    }
    let channel = |index: usize| {
        u8::from_str_radix(&digits[index..index + 2], 16)
            .map_err(|_| ProtocolError::InvalidColor(value.to_string()))
    };
    Ok((channel(0)?, channel(2)?, channel(4)?))
}

/// 归一化分量缩放到协议 16 位通道值。
pub fn to_channel(value: f64) -> u16 {
    (value.clamp(0.0, 1.0) * CHANNEL_MAX).round() as u16
}

/// 协议 16 位通道值还原为归一化分量。
pub fn from_channel(value: u16) -> f64 {
    value as f64 / CHANNEL_MAX
}

fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64) -> (u8, u8, u8) {
    let h = hue.clamp(0.0, 1.0);
    let s = saturation.clamp(0.0, 1.0);
    let l = lightness.clamp(0.0, 1.0);
    if s == 0.0 {
        let v = to_byte(l);
        return (v, v, v);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    (
        to_byte(hue_to_channel(p, q, h + 1.0 / 3.0)),
        to_byte(hue_to_channel(p, q, h)),
        to_byte(hue_to_channel(p, q, h - 1.0 / 3.0)),
    )
}

fn hue_to_channel(p: f64, q: f64, t: f64) -> f64 {
    let t = if t < 0.0 {
        t + 1.0
    } else if t > 1.0 {
        t - 1.0
    } else {
        t
    };
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

fn rgb_to_hsl(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    if max == min {
        return (0.0, 0.0, l);
    }
    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    (h / 6.0, s, l)
}

fn to_byte(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(hex: &str) -> String {
        let (h, s, l) = rgb_hex_to_hsl(hex).unwrap();
        hsl_to_rgb_hex(h, s, l)
    }

    #[test]
    fn achromatic_colors_round_trip_exactly() {
        for hex in ["#808080", "#000000", "#ffffff"] {
            let (h, s, _) = rgb_hex_to_hsl(hex).unwrap();
            assert_eq!(h, 0.0);
            assert_eq!(s, 0.0);
            assert_eq!(round_trip(hex), hex);
        }
    }

    #[test]
    fn saturated_colors_round_trip_within_one_step() {
        let mut seed: u32 = 0x2545_f491;
        for _ in 0..200 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let mid = (seed >> 16) as u8;
            let mut channels = [255u8, 0u8, mid];
            channels.rotate_left((seed % 3) as usize);
            if seed & 0x100 != 0 {
                channels.swap(1, 2);
            }
            let hex = format!("#{:02x}{:02x}{:02x}", channels[0], channels[1], channels[2]);
            let back = parse_rgb_hex(&round_trip(&hex)).unwrap();
            for (a, b) in [channels[0], channels[1], channels[2]]
                .into_iter()
                .zip([back.0, back.1, back.2])
            {
                assert!((a as i16 - b as i16).abs() <= 1, "{hex}");
            }
        }
    }

    #[test]
    fn primary_hues() {
        let (h, s, l) = rgb_hex_to_hsl("ff0000").unwrap();
        assert_eq!((h, s, l), (0.0, 1.0, 0.5));
        let (h, _, _) = rgb_hex_to_hsl("#0000FF").unwrap();
        assert!((h - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(hsl_to_rgb_hex(1.0 / 3.0, 1.0, 0.5), "#00ff00");
    }

    #[test]
    fn malformed_hex_is_rejected() {
        for bad in ["", "#fff", "#12345", "#1234567", "#gg0000", "##ff0000"] {
            assert!(matches!(
                rgb_hex_to_hsl(bad),
                Err(ProtocolError::InvalidColor(_))
            ));
        }
    }

    #[test]
    fn channel_scaling() {
        assert_eq!(to_channel(1.0), 0xFFFF);
        assert_eq!(to_channel(0.0), 0);
        assert_eq!(to_channel(0.5), 0x8000);
        assert_eq!(from_channel(0xFFFF), 1.0);
    }
}
