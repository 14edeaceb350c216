//! Human-readable durations for config values: `30m`, `10s`, `1h30m`, `2d`.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{de, Deserialize, Deserializer, Serializer};

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Parse one or more `<number><unit>` segments, units `d`, `h`, `m`, `s`.
///
/// Case-insensitive; surrounding whitespace is ignored.
///
/// ```
/// use coinledger::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(30 * 60));
/// assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(90 * 60));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration> {
    let input = s.trim().to_ascii_lowercase();
    if input.is_empty() {
        bail!("Duration must not be empty");
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c {
            'd' => SECS_PER_DAY,
            'h' => SECS_PER_HOUR,
            'm' => SECS_PER_MINUTE,
            's' => 1,
            _ => bail!("Invalid duration {s:?}: unknown unit {c:?}"),
        };
        if digits.is_empty() {
            bail!("Invalid duration {s:?}: unit {c:?} has no number");
        }
        let n: u64 = digits
            .parse()
            .with_context(|| format!("Invalid number in duration {s:?}"))?;
        digits.clear();
        total = n
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .context("Duration is too large")?;
    }
    if !digits.is_empty() {
        bail!("Invalid duration {s:?}: must end with d, h, m, or s");
    }

    Ok(Duration::from_secs(total))
}

/// Inverse of [`parse_duration`] for whole seconds, largest units first.
///
/// ```
/// use coinledger::duration::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(90 * 60)), "1h30m");
/// assert_eq!(format_duration(Duration::ZERO), "0s");
/// ```
pub fn format_duration(d: Duration) -> String {
    let mut secs = d.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }
    let mut out = String::new();
    for (unit, label) in [
        (SECS_PER_DAY, 'd'),
        (SECS_PER_HOUR, 'h'),
        (SECS_PER_MINUTE, 'm'),
        (1, 's'),
    ] {
        if secs >= unit {
            out.push_str(&(secs / unit).to_string());
            out.push(label);
            secs %= unit;
        }
    }
    out
}

/// Use with `#[serde(with = "crate::duration::human")]`.
pub mod human {
    use super::*;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(de::Error::custom)
    }
}
