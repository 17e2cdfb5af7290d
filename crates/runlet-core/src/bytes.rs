//! Human-readable byte sizes.
//!
//! Sizes use binary units throughout: 1 KB = 1024 bytes.

use regex::Regex;
use std::sync::OnceLock;

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;
const TIB: u64 = GIB * 1024;

/// Fallback when a size string cannot be understood at all.
pub const DEFAULT_SIZE_BYTES: u64 = GIB;

fn size_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*(B|KB|MB|GB|TB)\s*$").unwrap()
    })
}

/// Parse a size like `"500MB"` or `"1.5 GB"` into bytes.
///
/// Bare digits are taken as a byte count; anything else falls back to
/// [`DEFAULT_SIZE_BYTES`].
pub fn parse_size(input: &str) -> u64 {
    if let Some(caps) = size_regex().captures(input) {
        let value: f64 = caps[1].parse().unwrap_or(0.0);
        let multiplier = match caps[2].to_ascii_uppercase().as_str() {
            "B" => 1,
            "KB" => KIB,
            "MB" => MIB,
            "GB" => GIB,
            _ => TIB,
        };
        return (value * multiplier as f64) as u64;
    }

    input
        .trim()
        .parse::<u64>()
        .unwrap_or(DEFAULT_SIZE_BYTES)
}

/// Format a byte count using the largest unit at which the value is >= 1,
/// with two decimals. Values below 1 KB print integer bytes.
pub fn format_size(bytes: u64) -> String {
    if bytes < KIB {
        return format!("{bytes} B");
    }
    let (divisor, unit) = match bytes {
        b if b >= TIB => (TIB, "TB"),
        b if b >= GIB => (GIB, "GB"),
        b if b >= MIB => (MIB, "MB"),
        _ => (KIB, "KB"),
    };
    format!("{:.2} {unit}", bytes as f64 / divisor as f64)
}
