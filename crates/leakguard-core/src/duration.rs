//! Window duration parsing

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::warn;

/// Window used when a policy's window cannot be parsed
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(300);

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d+)\s*([smhd])\s*$").expect("static duration regex"))
}

/// Parse a window such as `"30s"`, `"5m"`, `"1h"` or `"7d"`.
///
/// A bare integer is read as seconds. Anything else falls back to
/// [`DEFAULT_WINDOW`] and logs a warning.
pub fn parse_window(raw: &str) -> Duration {
    try_parse_window(raw).unwrap_or_else(|| {
        warn!(window = %raw, "Unparsable window duration, using default of 5m");
        DEFAULT_WINDOW
    })
}

/// Strict variant of [`parse_window`]
pub fn try_parse_window(raw: &str) -> Option<Duration> {
    if let Ok(secs) = raw.trim().parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let caps = duration_regex().captures(raw)?;
    let value: u64 = caps[1].parse().ok()?;
    let unit = match &caps[2] {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        _ => return None,
    };

    value.checked_mul(unit).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units() {
        assert_eq!(parse_window("30s"), Duration::from_secs(30));
        assert_eq!(parse_window("5m"), Duration::from_secs(300));
        assert_eq!(parse_window("1h"), Duration::from_secs(3_600));
        assert_eq!(parse_window("2d"), Duration::from_secs(172_800));
        assert_eq!(parse_window("90"), Duration::from_secs(90));
    }

    #[test]
    fn test_fallback() {
        assert_eq!(parse_window("soon"), DEFAULT_WINDOW);
        assert_eq!(parse_window("5 weeks"), DEFAULT_WINDOW);
        assert_eq!(try_parse_window(""), None);
    }
}
