//! Dumka core library - shared types, codecs, and view-model logic.
//!
//! This crate contains no I/O and can be compiled for any target.

mod classify;
mod dates;
mod error;
mod feed;
mod flags;
mod invite;
mod migrations;
mod note;
mod related;
mod review;
mod service;
mod session;
mod store;
mod streak;
mod thread;

pub use classify::{classify_task, highlight_segments, is_question, Segment, Span, TaskInfo, TaskKind};
pub use dates::{
    day_key, day_label, format_countdown, next_review_cutoff, parse_local, prev_day,
    relative_time_label, review_cutoff, sortable_key, time_label, today_key, REVIEW_HOUR,
    UNKNOWN_DAY,
};
pub use error::Error;
pub use feed::{
    build_feed, feed_ordering, folder_counts, folder_feed, folder_label, note_type_of, FeedRow,
    NoteType, NoteView, RelatedLink, ReviewBanner, ThreadView,
};
pub use flags::LocalFlags;
pub use invite::{generate_code, invite_stats, Invite, InviteStats, NewInvite};
pub use migrations::{get_pending_migrations, Migration, MIGRATIONS, SCHEMA_VERSION};
pub use note::{NewNote, Note, NotePatch, NoteRow, Record, ReviewMarker, ThreadNote};
pub use related::{extract_keywords, RelatedIndex, RelatedMatch};
pub use review::{pending_review_tasks, yesterday_stats, ReviewSession, ReviewStage, Swipe, YesterdayStats};
pub use service::{DumkaService, ThreadCreated};
pub use session::{EditState, Session, ViewMode};
pub use store::NotesBackend;
pub use streak::{compute_streak, milestone_flag, MILESTONES};
pub use thread::{
    collect_thread_member_ids, decode_payload, encode_payload, is_thread_text, new_thread_text,
    review_marker_day, review_marker_text, ThreadItem, ThreadPayload, REVIEW_MARKER, THREAD_MARKER,
};
