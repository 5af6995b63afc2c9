//! Feed projection.
//!
//! Projects the working set into day-grouped, sorted rows for a view mode
//! and optional type filter. Pure data in, rows out; nothing here touches a
//! render target or the store.

use std::cmp::Ordering;

use chrono::{DateTime, Local};

use crate::classify::{classify_task, highlight_segments, is_question, Segment};
use crate::dates::{day_key, day_label, relative_time_label, sortable_key, time_label, today_key};
use crate::flags::LocalFlags;
use crate::note::Record;
use crate::related::RelatedIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteType {
    Thread,
    Task,
    Question,
    Note,
}

pub fn folder_label(folder: NoteType) -> &'static str {
    match folder {
        NoteType::Task => "Tasks",
        NoteType::Question => "Questions",
        NoteType::Thread => "Threads",
        NoteType::Note => "Notes",
    }
}

/// Semantic kind of a record for the organized view. A thread only counts
/// as one while its payload decodes; a degraded thread falls through to the
/// plain-note bucket.
pub fn note_type_of(record: &Record) -> NoteType {
    match record {
        Record::Thread(t) if t.payload.is_some() => NoteType::Thread,
        Record::Thread(_) | Record::ReviewMarker(_) => NoteType::Note,
        Record::Note(n) => {
            if n.is_task || classify_task(&n.text).is_task {
                NoteType::Task
            } else if n.is_question || is_question(&n.text) {
                NoteType::Question
            } else {
                NoteType::Note
            }
        }
    }
}

/// Day-grouped feed order: by calendar day ascending; within a day
/// positioned notes first by `position`, then the rest chronologically with
/// the string id as the final tiebreak.
pub fn feed_ordering(a: &Record, b: &Record) -> Ordering {
    day_key(a.date())
        .cmp(&day_key(b.date()))
        .then_with(|| match (a.position(), b.position()) {
            (Some(pa), Some(pb)) => pa.cmp(&pb),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => sortable_key(a.date())
                .cmp(&sortable_key(b.date()))
                .then_with(|| a.id().cmp(b.id())),
        })
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewBanner {
    Pending { count: usize },
    Done { countdown: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelatedLink {
    pub note_id: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoteView {
    pub id: String,
    pub time: String,
    pub segments: Vec<Segment>,
    pub is_task: bool,
    pub completed: bool,
    pub is_question: bool,
    pub answer: Option<String>,
    pub moved: bool,
    pub related: Option<RelatedLink>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadView {
    pub id: String,
    pub time: String,
    pub preview: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedRow {
    DaySeparator { day: String, label: String },
    ReviewBanner(ReviewBanner),
    Note(NoteView),
    Thread(ThreadView),
}

/// Build the day-grouped feed. The review banner, when present, lands right
/// after today's day separator; if the feed has no rows for today a
/// synthetic separator is appended so the banner still shows.
pub fn build_feed(
    records: &[Record],
    flags: &LocalFlags,
    now: DateTime<Local>,
    banner: Option<ReviewBanner>,
) -> Vec<FeedRow> {
    let mut display: Vec<&Record> = records
        .iter()
        .filter(|r| !matches!(r, Record::ReviewMarker(_)))
        .collect();
    display.sort_by(|a, b| feed_ordering(a, b));

    if display.is_empty() {
        return banner.map(|b| vec![FeedRow::ReviewBanner(b)]).unwrap_or_default();
    }

    // threads contribute empty keyword sets so they neither get nor give
    // related-note suggestions
    let related = RelatedIndex::new(display.iter().map(|r| match r {
        Record::Note(n) => n.text.as_str(),
        _ => "",
    }));

    let today = today_key(now);
    let mut banner = banner;
    let mut rows = Vec::new();
    let mut prev_day: Option<String> = None;

    for (idx, record) in display.iter().enumerate() {
        let cur_day = day_key(record.date());
        if prev_day.as_deref() != Some(cur_day.as_str()) {
            rows.push(FeedRow::DaySeparator {
                label: day_label(record.date()),
                day: cur_day.clone(),
            });
            if cur_day == today {
                if let Some(b) = banner.take() {
                    rows.push(FeedRow::ReviewBanner(b));
                }
            }
            prev_day = Some(cur_day);
        }

        match record {
            Record::Note(n) => {
                let info = classify_task(&n.text);
                let is_task = n.is_task || info.is_task;
                let is_q = n.is_question || is_question(&n.text);
                let segments = if is_task && info.is_task {
                    highlight_segments(&info.display_text, info.highlight)
                } else {
                    highlight_segments(&n.text, None)
                };
                let related = related.best_match(idx).map(|m| {
                    let source = display[m.index];
                    RelatedLink {
                        note_id: source.id().to_string(),
                        label: relative_time_label(source.date(), &n.date),
                    }
                });
                rows.push(FeedRow::Note(NoteView {
                    id: n.id.clone(),
                    time: time_label(&n.date),
                    segments,
                    is_task,
                    completed: is_task && n.completed,
                    is_question: is_q,
                    answer: n.answer.clone(),
                    moved: flags.is_note_moved(&n.id),
                    related,
                }));
            }
            Record::Thread(t) => {
                let (preview, count) = match &t.payload {
                    Some(p) => {
                        let preview = p.title.clone().unwrap_or_else(|| {
                            p.items
                                .last()
                                .map(|item| item.text.split_whitespace().collect::<Vec<_>>().join(" "))
                                .filter(|s| !s.is_empty())
                                .unwrap_or_else(|| "Open thread to view messages".to_string())
                        });
                        (preview, p.items.len())
                    }
                    // malformed payload: an empty, orphaned row
                    None => (String::new(), 0),
                };
                rows.push(FeedRow::Thread(ThreadView {
                    id: t.id.clone(),
                    time: time_label(&t.date),
                    preview,
                    count,
                }));
            }
            Record::ReviewMarker(_) => {}
        }
    }

    if let Some(b) = banner.take() {
        if prev_day.as_deref() != Some(today.as_str()) {
            rows.push(FeedRow::DaySeparator {
                label: day_label(&now.to_rfc3339()),
                day: today,
            });
        }
        rows.push(FeedRow::ReviewBanner(b));
    }

    rows
}

/// Folder cards for the organized view, empty folders omitted.
pub fn folder_counts(records: &[Record]) -> Vec<(NoteType, usize)> {
    let order = [
        NoteType::Task,
        NoteType::Question,
        NoteType::Thread,
        NoteType::Note,
    ];
    order
        .into_iter()
        .filter_map(|folder| {
            let count = records
                .iter()
                .filter(|r| !matches!(r, Record::ReviewMarker(_)))
                .filter(|r| note_type_of(r) == folder)
                .count();
            (count > 0).then_some((folder, count))
        })
        .collect()
}

/// Drill-down feed for one folder. No review banner in folder views.
pub fn folder_feed(
    records: &[Record],
    folder: NoteType,
    flags: &LocalFlags,
    now: DateTime<Local>,
) -> Vec<FeedRow> {
    let filtered: Vec<Record> = records
        .iter()
        .filter(|r| !matches!(r, Record::ReviewMarker(_)))
        .filter(|r| note_type_of(r) == folder)
        .cloned()
        .collect();
    build_feed(&filtered, flags, now, None)
}
