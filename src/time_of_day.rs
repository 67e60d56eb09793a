//! Time-of-day helpers
//!
//! Trade times and time filters are `HH:mm` strings (seconds, if present,
//! are ignored). Windows are handled as minutes since midnight.

/// Parse an `HH:mm` (or `HH:mm:ss`) string into minutes since midnight.
///
/// `24:00` and later hours are accepted so a window can close at or past
/// end of day, which rules out `chrono::NaiveTime`.
pub fn parse_minutes(value: &str) -> Option<i32> {
    let mut parts = value.trim().split(':');
    let hours: i32 = parts.next()?.trim().parse().ok()?;
    let minutes: i32 = parts.next()?.trim().parse().ok()?;
    if hours < 0 || minutes < 0 {
        return None;
    }
    Some(hours * 60 + minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_hours_and_minutes() {
        assert_eq!(parse_minutes("09:30"), Some(570));
        assert_eq!(parse_minutes("9:05"), Some(545));
        assert_eq!(parse_minutes("14:15:59"), Some(855));
        assert_eq!(parse_minutes("24:00"), Some(1440));
        assert_eq!(parse_minutes("25:30"), Some(1530));
    }

    #[test]
    fn test_rejects_malformed_times() {
        assert_eq!(parse_minutes(""), None);
        assert_eq!(parse_minutes("0930"), None);
        assert_eq!(parse_minutes("ab:cd"), None);
        assert_eq!(parse_minutes("-1:00"), None);
    }
}
