//! Shared text helpers.

use chrono::{DateTime, Utc};

/// Formats a timestamp for display.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Truncates a string to at most `max_chars` characters, appending an ellipsis.
pub fn truncate_string(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        input.to_string()
    } else {
        let kept: String = input.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Splits a message body into whitespace-separated arguments.
pub fn split_args(input: &str) -> Vec<String> {
    input.split_whitespace().map(str::to_string).collect()
}

/// Rounds a millisecond count up to whole seconds, for user-facing waits.
pub const fn ceil_seconds(millis: u128) -> u64 {
    let secs = millis.div_ceil(1000);
    if secs > u64::MAX as u128 {
        u64::MAX
    } else {
        secs as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_timestamp() {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(format_timestamp(timestamp), "2024-01-01 12:00:00 UTC");
    }

    #[test]
    fn test_truncate_string() {
        let input = "This is a very long string that should be truncated";
        assert_eq!(truncate_string(input, 20), "This is a very lo...");
        assert_eq!(truncate_string("Short", 20), "Short");
        // multibyte input must not split a char
        assert_eq!(truncate_string("héllo wörld", 8), "héllo...");
    }

    #[test]
    fn test_split_args() {
        assert_eq!(split_args("  a  b\tc "), vec!["a", "b", "c"]);
        assert!(split_args("   ").is_empty());
    }

    #[test]
    fn test_ceil_seconds() {
        assert_eq!(ceil_seconds(0), 0);
        assert_eq!(ceil_seconds(1), 1);
        assert_eq!(ceil_seconds(1000), 1);
        assert_eq!(ceil_seconds(1001), 2);
    }
}
