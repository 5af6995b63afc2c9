//! Daily review.
//!
//! Surfaces incomplete tasks created before today's 08:00 cutoff and walks
//! them one card at a time: Intro -> Swiping -> Summary. The session itself
//! is pure; the caller persists completions and the reviewed-day marker.

use chrono::{DateTime, Local};

use crate::dates::{day_key, parse_local, prev_day, review_cutoff, today_key};
use crate::note::{Note, Record};

/// Tasks still waiting for review: incomplete, not thread members (those
/// never reach the working set), created strictly before today at 08:00
/// local.
pub fn pending_review_tasks(records: &[Record], now: DateTime<Local>) -> Vec<Note> {
    let cutoff = review_cutoff(now);
    records
        .iter()
        .filter_map(Record::as_note)
        .filter(|n| n.is_task && !n.completed)
        .filter(|n| matches!(parse_local(&n.date), Some(d) if d < cutoff))
        .cloned()
        .collect()
}

/// Yesterday's task activity, shown on the intro screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YesterdayStats {
    pub created: usize,
    pub completed: usize,
}

pub fn yesterday_stats(records: &[Record], now: DateTime<Local>) -> YesterdayStats {
    let Some(yesterday) = prev_day(&today_key(now)) else {
        return YesterdayStats::default();
    };

    let mut stats = YesterdayStats::default();
    for note in records.iter().filter_map(Record::as_note) {
        if !note.is_task || day_key(&note.date) != yesterday {
            continue;
        }
        stats.created += 1;
        if note.completed {
            stats.completed += 1;
        }
    }
    stats
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStage {
    Intro,
    Swiping,
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swipe {
    /// Commit the card as done; the underlying task gets completed.
    Done,
    /// Skip the card; the task stays incomplete.
    Skip,
}

#[derive(Debug)]
pub struct ReviewSession {
    tasks: Vec<Note>,
    stats: YesterdayStats,
    index: usize,
    done: usize,
    skipped: usize,
    stage: ReviewStage,
}

impl ReviewSession {
    /// `None` when nothing is pending; the review never opens on an empty
    /// deck.
    pub fn new(tasks: Vec<Note>, stats: YesterdayStats) -> Option<Self> {
        if tasks.is_empty() {
            return None;
        }
        Some(Self {
            tasks,
            stats,
            index: 0,
            done: 0,
            skipped: 0,
            stage: ReviewStage::Intro,
        })
    }

    pub fn stage(&self) -> ReviewStage {
        self.stage
    }

    pub fn yesterday(&self) -> YesterdayStats {
        self.stats
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    pub fn begin(&mut self) {
        if self.stage == ReviewStage::Intro {
            self.stage = ReviewStage::Swiping;
        }
    }

    /// The card currently shown, if any.
    pub fn current(&self) -> Option<&Note> {
        if self.stage != ReviewStage::Swiping {
            return None;
        }
        self.tasks.get(self.index)
    }

    /// 1-based progress label, e.g. (2, 5) for "2 / 5".
    pub fn progress(&self) -> (usize, usize) {
        (self.index.min(self.tasks.len() - 1) + 1, self.tasks.len())
    }

    /// Commit the current card. Returns the id of the task to mark
    /// completed when the swipe was `Done`. Advancing past the last card
    /// moves to the summary.
    pub fn swipe(&mut self, direction: Swipe) -> Option<String> {
        if self.stage != ReviewStage::Swiping {
            return None;
        }
        let task = self.tasks.get(self.index)?;
        let completed_id = match direction {
            Swipe::Done => {
                self.done += 1;
                Some(task.id.clone())
            }
            Swipe::Skip => {
                self.skipped += 1;
                None
            }
        };
        self.index += 1;
        if self.index >= self.tasks.len() {
            self.stage = ReviewStage::Summary;
        }
        completed_id
    }

    pub fn done_count(&self) -> usize {
        self.done
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped
    }

    /// Closing from the summary marks the day reviewed; closing early
    /// (intro or mid-swipe) does not.
    pub fn counts_as_reviewed(&self) -> bool {
        self.stage == ReviewStage::Summary
    }
}
