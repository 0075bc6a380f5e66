//! Human-readable byte sizes
//!
//! Accepts plain byte counts (`4096`) and sized strings such as `128Mi`,
//! `10Mb` or `1.5 GB`. All units are powers of 1024, matching the sizes the
//! machine emulator understands.

use regex::Regex;
use std::sync::OnceLock;

fn size_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*(b|[kmgtp](?:i?b?)?)?\s*$")
            .expect("Invalid size regex")
    })
}

fn unit_multiplier(unit: &str) -> u64 {
    match unit.chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('k') => 1 << 10,
        Some('m') => 1 << 20,
        Some('g') => 1 << 30,
        Some('t') => 1 << 40,
        Some('p') => 1 << 50,
        _ => 1,
    }
}

/// Parse a sized string into a number of bytes
///
/// Fractional results are floored. Returns `None` for anything that is not a
/// non-negative size or that overflows `u64`.
///
/// # Examples
/// ```
/// use cartesi_build::core::bytes::parse_size;
///
/// assert_eq!(parse_size("128Mi"), Some(128 * 1024 * 1024));
/// assert_eq!(parse_size("10Mb"), Some(10 * 1024 * 1024));
/// assert_eq!(parse_size("512"), Some(512));
/// assert_eq!(parse_size("abc"), None);
/// ```
pub fn parse_size(input: &str) -> Option<u64> {
    let caps = size_regex().captures(input)?;
    let number = caps.get(1)?.as_str();
    let multiplier = caps.get(2).map_or(1, |m| unit_multiplier(m.as_str()));

    if let Ok(whole) = number.parse::<u64>() {
        return whole.checked_mul(multiplier);
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    {
        let value = number.parse::<f64>().ok()? * multiplier as f64;
        if !value.is_finite() || value >= u64::MAX as f64 {
            return None;
        }
        Some(value.floor() as u64)
    }
}

/// Number of 4k blocks needed to hold `size` bytes (rounded up)
pub fn blocks(size: u64, block_size: u64) -> u64 {
    size.div_ceil(block_size)
}
