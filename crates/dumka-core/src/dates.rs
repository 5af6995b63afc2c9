//! Day keys and the review cutoff clock.
//!
//! Stored timestamps are ISO 8601 strings. Wherever a literal `YYYY-MM-DD`
//! prefix is available it is used as-is; only odd values fall back to
//! parsing, and unparseable values sort into a sentinel bucket.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Day bucket for timestamps that cannot be parsed at all.
pub const UNKNOWN_DAY: &str = "0000-00-00";

/// Wall-clock hour of the daily review cutoff.
pub const REVIEW_HOUR: u32 = 8;

fn literal_day(raw: &str) -> Option<&str> {
    let b = raw.as_bytes();
    if b.len() < 10 {
        return None;
    }
    let ok = b[..10]
        .iter()
        .enumerate()
        .all(|(i, c)| match i {
            4 | 7 => *c == b'-',
            _ => c.is_ascii_digit(),
        });
    ok.then(|| &raw[..10])
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap()));
    }
    None
}

/// Calendar-day grouping key for a stored timestamp.
pub fn day_key(raw: &str) -> String {
    if let Some(day) = literal_day(raw) {
        return day.to_string();
    }
    match parse_timestamp(raw) {
        Some(dt) => dt.with_timezone(&Local).format("%Y-%m-%d").to_string(),
        None => UNKNOWN_DAY.to_string(),
    }
}

/// Full-precision sort key. ISO strings with a literal date prefix and a `T`
/// separator pass through untouched so equal stored values stay equal keys.
pub fn sortable_key(raw: &str) -> String {
    if literal_day(raw).is_some() && raw.as_bytes().get(10) == Some(&b'T') {
        return raw.to_string();
    }
    match parse_timestamp(raw) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        None => "0000-00-00T00:00:00.000Z".to_string(),
    }
}

/// Parse a stored timestamp into local time.
pub fn parse_local(raw: &str) -> Option<DateTime<Local>> {
    parse_timestamp(raw).map(|dt| dt.with_timezone(&Local))
}

pub fn today_key(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%d").to_string()
}

pub fn prev_day(day: &str) -> Option<String> {
    let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()?;
    Some((date - Duration::days(1)).format("%Y-%m-%d").to_string())
}

/// Today at 08:00 local time. The cutoff is a fixed wall-clock hour, not a
/// rolling 24h window.
pub fn review_cutoff(now: DateTime<Local>) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(now.year(), now.month(), now.day(), REVIEW_HOUR, 0, 0)
        .earliest()
        .unwrap_or(now)
}

/// The next upcoming 08:00 cutoff (today's if it has not passed yet).
pub fn next_review_cutoff(now: DateTime<Local>) -> DateTime<Local> {
    let today = review_cutoff(now);
    if now < today {
        today
    } else {
        today + Duration::days(1)
    }
}

/// `HH:MM:SS` countdown label.
pub fn format_countdown(remaining: Duration) -> String {
    let secs = remaining.num_seconds().max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Time-of-day label for a feed row, e.g. `09:45`.
pub fn time_label(raw: &str) -> String {
    match parse_local(raw) {
        Some(dt) => dt.format("%H:%M").to_string(),
        None => "--:--".to_string(),
    }
}

/// Day-separator label, e.g. `05 August`.
pub fn day_label(raw: &str) -> String {
    match parse_local(raw) {
        Some(dt) => dt.format("%d %B").to_string(),
        None => day_key(raw),
    }
}

/// Coarse "how long ago" label for the related-note link. `None` when `to`
/// precedes `from`.
pub fn relative_time_label(from: &str, to: &str) -> Option<String> {
    let from = parse_local(from)?;
    let to = parse_local(to)?;
    let diff = to - from;
    if diff < Duration::zero() {
        return None;
    }

    let minutes = diff.num_minutes();
    let hours = diff.num_hours();
    let days = diff.num_days();

    Some(if minutes < 2 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{} min ago", minutes)
    } else if hours == 1 {
        "1 hour ago".to_string()
    } else if hours < 24 {
        format!("{} hours ago", hours)
    } else if days == 1 {
        "yesterday".to_string()
    } else {
        format!("{} days ago", days)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_day_key_prefers_literal_prefix() {
        assert_eq!(day_key("2026-08-05T23:59:00Z"), "2026-08-05");
        assert_eq!(day_key("2026-08-05"), "2026-08-05");
    }

    #[test]
    fn test_day_key_unparseable() {
        assert_eq!(day_key("garbage"), UNKNOWN_DAY);
        assert_eq!(day_key(""), UNKNOWN_DAY);
    }

    #[test]
    fn test_sortable_key_passthrough() {
        let iso = "2026-08-05T07:59:00.000Z";
        assert_eq!(sortable_key(iso), iso);
        assert_eq!(sortable_key("junk"), "0000-00-00T00:00:00.000Z");
    }

    #[test]
    fn test_prev_day() {
        assert_eq!(prev_day("2026-08-05").as_deref(), Some("2026-08-04"));
        assert_eq!(prev_day("2026-03-01").as_deref(), Some("2026-02-28"));
        assert_eq!(prev_day("junk"), None);
    }

    #[test]
    fn test_review_cutoff_is_8am() {
        let now = Local.with_ymd_and_hms(2026, 8, 5, 14, 30, 0).unwrap();
        let cutoff = review_cutoff(now);
        assert_eq!(cutoff.hour(), REVIEW_HOUR);
        assert_eq!(cutoff.date_naive(), now.date_naive());
    }

    #[test]
    fn test_next_cutoff_rolls_over() {
        let before = Local.with_ymd_and_hms(2026, 8, 5, 7, 0, 0).unwrap();
        assert_eq!(next_review_cutoff(before).date_naive(), before.date_naive());
        let after = Local.with_ymd_and_hms(2026, 8, 5, 9, 0, 0).unwrap();
        let next = next_review_cutoff(after);
        assert_eq!(next.date_naive(), before.date_naive().succ_opt().unwrap());
        assert_eq!(next.hour(), REVIEW_HOUR);
    }

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(Duration::seconds(3661)), "01:01:01");
        assert_eq!(format_countdown(Duration::seconds(-5)), "00:00:00");
    }

    #[test]
    fn test_relative_time_label() {
        let base = "2026-08-05T12:00:00Z";
        assert_eq!(
            relative_time_label(base, "2026-08-05T12:01:00Z").as_deref(),
            Some("just now")
        );
        assert_eq!(
            relative_time_label(base, "2026-08-05T12:30:00Z").as_deref(),
            Some("30 min ago")
        );
        assert_eq!(
            relative_time_label(base, "2026-08-05T13:30:00Z").as_deref(),
            Some("1 hour ago")
        );
        assert_eq!(
            relative_time_label(base, "2026-08-06T13:00:00Z").as_deref(),
            Some("yesterday")
        );
        assert_eq!(
            relative_time_label(base, "2026-08-08T12:00:00Z").as_deref(),
            Some("3 days ago")
        );
        assert_eq!(relative_time_label(base, "2026-08-04T12:00:00Z"), None);
    }
}
