use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Offset-bearing layouts, tried after RFC 2822 and RFC 3339.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%:z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%d %b %Y %H:%M:%S %z",
];

/// Zone-less layouts, read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%d %b %Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

/// Parse a feed timestamp into epoch milliseconds.
///
/// Feeds in the wild use RFC 822 (RSS), ISO 8601 (Atom) and a long tail of
/// ad-hoc layouts. Patterns are tried from strictest to loosest and the first
/// match wins. `MM/dd` is tried before `dd/MM`, so ambiguous dates read as US
/// order.
pub fn parse_date(input: &str) -> Option<i64> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(&normalize_zone_suffix(s)) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.timestamp_millis());
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// [`parse_date`], falling back to the current time.
pub fn parse_date_or_now(input: &str) -> i64 {
    parse_date(input).unwrap_or_else(|| Utc::now().timestamp_millis())
}

// chrono's RFC 2822 parser knows GMT/UT and the US zones but not "UTC" or "Z"
fn normalize_zone_suffix(s: &str) -> String {
    for suffix in [" UTC", " Z"] {
        if let Some(stripped) = s.strip_suffix(suffix) {
            return format!("{} +0000", stripped);
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-01-15T10:30:00Z
    const EXPECTED: i64 = 1_705_314_600_000;

    #[test]
    fn test_rfc822_variants() {
        assert_eq!(parse_date("Mon, 15 Jan 2024 10:30:00 +0000"), Some(EXPECTED));
        assert_eq!(parse_date("Mon, 15 Jan 2024 10:30:00 GMT"), Some(EXPECTED));
        assert_eq!(parse_date("Mon, 15 Jan 2024 10:30:00 UTC"), Some(EXPECTED));
        assert_eq!(parse_date("Mon, 15 Jan 2024 05:30:00 -0500"), Some(EXPECTED));
        assert_eq!(parse_date("Mon, 15 Jan 2024 10:30:00"), Some(EXPECTED));
    }

    #[test]
    fn test_iso8601_variants() {
        assert_eq!(parse_date("2024-01-15T10:30:00Z"), Some(EXPECTED));
        assert_eq!(parse_date("2024-01-15T10:30:00.000Z"), Some(EXPECTED));
        assert_eq!(parse_date("2024-01-15T12:30:00+02:00"), Some(EXPECTED));
        assert_eq!(parse_date("2024-01-15T12:30:00+0200"), Some(EXPECTED));
        assert_eq!(parse_date("2024-01-15T10:30:00"), Some(EXPECTED));
    }

    #[test]
    fn test_loose_layouts() {
        assert_eq!(parse_date("2024-01-15 10:30:00"), Some(EXPECTED));
        assert_eq!(parse_date("15 Jan 2024 10:30:00 +0000"), Some(EXPECTED));
        assert_eq!(parse_date("15 Jan 2024 10:30:00"), Some(EXPECTED));
        assert_eq!(parse_date("01/15/2024 10:30:00"), Some(EXPECTED));
        // Day > 12 can only be dd/MM
        assert_eq!(parse_date("15/01/2024 10:30:00"), Some(EXPECTED));
        assert_eq!(parse_date("2024-01-15"), Some(1_705_276_800_000));
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("   "), None);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("2024-13-45"), None);
    }

    #[test]
    fn test_or_now_falls_back() {
        let before = Utc::now().timestamp_millis();
        let parsed = parse_date_or_now("not a date");
        let after = Utc::now().timestamp_millis();
        assert!(parsed >= before && parsed <= after);

        assert_eq!(parse_date_or_now(" 2024-01-15T10:30:00Z "), EXPECTED);
    }
}
