//! Duration parsing utilities for human-readable durations like "5m", "24h".

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{de, Deserialize, Deserializer};

const SECS_PER_DAY: u64 = 24 * 60 * 60;
const SECS_PER_HOUR: u64 = 60 * 60;
const SECS_PER_MINUTE: u64 = 60;

/// Parse a duration string like "14d", "24h", "30m", "60s".
///
/// Supported units:
/// - `d` - days (24 hours)
/// - `h` - hours
/// - `m` - minutes
/// - `s` - seconds
///
/// The input is case-insensitive and whitespace is trimmed.
///
/// # Examples
///
/// ```
/// use clipscout::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(5 * 60));
/// assert_eq!(parse_duration("24h").unwrap(), Duration::from_secs(24 * 60 * 60));
/// assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();

    let (num, per_unit) = if let Some(num) = s.strip_suffix('d') {
        (num, SECS_PER_DAY)
    } else if let Some(num) = s.strip_suffix('h') {
        (num, SECS_PER_HOUR)
    } else if let Some(num) = s.strip_suffix('m') {
        (num, SECS_PER_MINUTE)
    } else if let Some(num) = s.strip_suffix('s') {
        (num, 1)
    } else {
        anyhow::bail!("Duration must end with d, h, m, or s");
    };

    let num: u64 = num
        .trim()
        .parse()
        .with_context(|| "Invalid number in duration")?;
    let secs = num.checked_mul(per_unit).context("Duration is too large")?;

    Ok(Duration::from_secs(secs))
}

/// Format a duration using the largest unit that divides it evenly.
///
/// # Examples
///
/// ```
/// use clipscout::duration::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(24 * 60 * 60)), "1d");
/// assert_eq!(format_duration(Duration::from_secs(5 * 60)), "5m");
/// assert_eq!(format_duration(Duration::from_secs(45)), "45s");
/// ```
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();

    if secs >= SECS_PER_DAY && secs % SECS_PER_DAY == 0 {
        format!("{}d", secs / SECS_PER_DAY)
    } else if secs >= SECS_PER_HOUR && secs % SECS_PER_HOUR == 0 {
        format!("{}h", secs / SECS_PER_HOUR)
    } else if secs >= SECS_PER_MINUTE && secs % SECS_PER_MINUTE == 0 {
        format!("{}m", secs / SECS_PER_MINUTE)
    } else {
        format!("{secs}s")
    }
}

/// Serde deserializer for duration strings.
///
/// Use with `#[serde(deserialize_with = "deserialize_duration")]`.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(de::Error::custom)
}

/// Serde deserializer for optional duration strings.
///
/// Use with `#[serde(default, deserialize_with = "deserialize_duration_opt")]`.
pub fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        Some(s) => parse_duration(&s).map(Some).map_err(de::Error::custom),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_all_units() {
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86400));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn parse_is_case_insensitive_and_trims() {
        assert_eq!(parse_duration(" 1D ").unwrap(), Duration::from_secs(86400));
        assert_eq!(parse_duration("\t5M\n").unwrap(), Duration::from_secs(300));
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("d").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("1w").is_err());
        assert!(parse_duration("-1d").is_err());
        assert!(parse_duration("1.5h").is_err());
    }

    #[test]
    fn parse_rejects_overflow() {
        let max = u64::MAX.to_string();
        assert!(parse_duration(&format!("{max}d")).is_err());
        assert!(parse_duration(&format!("{max}s")).is_ok());
    }

    #[test]
    fn format_picks_largest_even_unit() {
        assert_eq!(format_duration(Duration::from_secs(14 * 86400)), "14d");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
        assert_eq!(format_duration(Duration::from_secs(300)), "5m");
        assert_eq!(format_duration(Duration::from_secs(0)), "0s");
        // 90 seconds is not an even number of minutes
        assert_eq!(format_duration(Duration::from_secs(90)), "90s");
    }

    #[test]
    fn format_parse_roundtrip() {
        for d in [
            Duration::from_secs(86400),
            Duration::from_secs(24 * 3600),
            Duration::from_secs(300),
            Duration::from_secs(45),
        ] {
            assert_eq!(parse_duration(&format_duration(d)).unwrap(), d);
        }
    }

    #[test]
    fn serde_duration_fields() {
        #[derive(Deserialize)]
        struct TestConfig {
            #[serde(deserialize_with = "deserialize_duration")]
            ttl: Duration,
            #[serde(default, deserialize_with = "deserialize_duration_opt")]
            timeout: Option<Duration>,
        }

        let config: TestConfig = toml::from_str(r#"ttl = "5m""#).unwrap();
        assert_eq!(config.ttl, Duration::from_secs(300));
        assert_eq!(config.timeout, None);

        let config: TestConfig = toml::from_str("ttl = \"5m\"\ntimeout = \"10s\"").unwrap();
        assert_eq!(config.timeout, Some(Duration::from_secs(10)));
    }
}
