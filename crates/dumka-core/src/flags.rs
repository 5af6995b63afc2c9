//! Device-local flags.
//!
//! The small bits of state the original client kept in browser storage:
//! which notes were manually reordered, which days have a completed review,
//! and which streak milestones were already celebrated. Serialized as one
//! JSON document; persistence is the caller's concern.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LocalFlags {
    #[serde(default)]
    pub moved_note_ids: HashSet<String>,
    #[serde(default)]
    pub review_done_days: HashSet<String>,
    #[serde(default)]
    pub milestones_seen: HashSet<String>,
}

impl LocalFlags {
    pub fn is_note_moved(&self, id: &str) -> bool {
        self.moved_note_ids.contains(id)
    }

    pub fn mark_moved(&mut self, id: &str) {
        self.moved_note_ids.insert(id.to_string());
    }

    pub fn clear_moved(&mut self, id: &str) {
        self.moved_note_ids.remove(id);
    }

    /// Drop moved flags for notes that no longer exist.
    pub fn prune_moved(&mut self, live_ids: &HashSet<&str>) {
        self.moved_note_ids.retain(|id| live_ids.contains(id.as_str()));
    }

    pub fn is_review_done(&self, day: &str) -> bool {
        self.review_done_days.contains(day)
    }

    pub fn mark_review_done(&mut self, day: &str) {
        self.review_done_days.insert(day.to_string());
    }

    pub fn milestone_seen(&self, flag: &str) -> bool {
        self.milestones_seen.contains(flag)
    }

    pub fn mark_milestone(&mut self, flag: String) {
        self.milestones_seen.insert(flag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_moved() {
        let mut flags = LocalFlags::default();
        flags.mark_moved("a");
        flags.mark_moved("b");
        let live: HashSet<&str> = ["b"].into_iter().collect();
        flags.prune_moved(&live);
        assert!(!flags.is_note_moved("a"));
        assert!(flags.is_note_moved("b"));
    }

    #[test]
    fn test_round_trips_as_json() {
        let mut flags = LocalFlags::default();
        flags.mark_review_done("2026-08-05");
        flags.mark_milestone("2026-08-05:7".to_string());
        let raw = serde_json::to_string(&flags).unwrap();
        let back: LocalFlags = serde_json::from_str(&raw).unwrap();
        assert!(back.is_review_done("2026-08-05"));
        assert!(back.milestone_seen("2026-08-05:7"));
    }

    #[test]
    fn test_missing_fields_default() {
        let back: LocalFlags = serde_json::from_str("{}").unwrap();
        assert!(back.moved_note_ids.is_empty());
    }
}
