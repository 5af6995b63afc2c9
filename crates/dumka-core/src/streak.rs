//! Usage streak.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};

/// Streak lengths that trigger a celebration.
pub const MILESTONES: &[u32] = &[3, 7, 14, 30, 60, 100];

fn key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Count consecutive active days ending today, or yesterday when today has
/// no notes yet.
pub fn compute_streak(active_days: &HashSet<String>, today: NaiveDate) -> u32 {
    let mut cursor = if active_days.contains(&key(today)) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut count = 0;
    while active_days.contains(&key(cursor)) {
        count += 1;
        cursor -= Duration::days(1);
    }
    count
}

/// Flag key gating a celebration to once per day per milestone value.
pub fn milestone_flag(day: &str, milestone: u32) -> String {
    format!("{}:{}", day, milestone)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn days(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_three_consecutive_days() {
        let active = days(&["2026-08-05", "2026-08-04", "2026-08-03", "2026-08-01"]);
        assert_eq!(compute_streak(&active, date("2026-08-05")), 3);
    }

    #[test]
    fn test_today_empty_counts_from_yesterday() {
        let active = days(&["2026-08-04", "2026-08-03"]);
        assert_eq!(compute_streak(&active, date("2026-08-05")), 2);
    }

    #[test]
    fn test_no_recent_activity() {
        assert_eq!(compute_streak(&days(&[]), date("2026-08-05")), 0);
        let stale = days(&["2026-08-01"]);
        assert_eq!(compute_streak(&stale, date("2026-08-05")), 0);
    }

    #[test]
    fn test_milestone_flag() {
        assert_eq!(milestone_flag("2026-08-05", 7), "2026-08-05:7");
    }
}
