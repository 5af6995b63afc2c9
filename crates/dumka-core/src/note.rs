use serde::{Deserialize, Serialize};

use crate::thread::{self, ThreadPayload};

/// A raw row of the remote `notes` table, exactly as stored.
///
/// `answer` is overloaded: for ordinary notes it holds the answer to a
/// question, for thread rows it holds the serialized thread payload. The two
/// uses are distinguished by the sentinel prefix on `text`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteRow {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub date: String,
    pub is_task: bool,
    pub completed: bool,
    pub is_question: bool,
    pub answer: Option<String>,
    pub position: Option<i64>,
}

/// Parameters for inserting a new row. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewNote {
    pub text: String,
    pub date: String,
    pub is_task: bool,
    pub completed: bool,
    pub is_question: bool,
    pub answer: Option<String>,
}

/// A field-scoped update. `None` leaves the column untouched; for nullable
/// columns, `Some(None)` writes an explicit NULL.
#[derive(Debug, Default, Clone)]
pub struct NotePatch {
    pub text: Option<String>,
    pub is_task: Option<bool>,
    pub completed: Option<bool>,
    pub is_question: Option<bool>,
    pub answer: Option<Option<String>>,
    pub position: Option<Option<i64>>,
}

/// An ordinary user note.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub id: String,
    pub text: String,
    pub date: String,
    pub is_task: bool,
    pub completed: bool,
    pub is_question: bool,
    pub answer: Option<String>,
    pub position: Option<i64>,
}

/// A thread row. `payload` is `None` when the stored payload is malformed;
/// the record still counts as a thread (the sentinel alone marks it) but
/// renders as an empty row.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadNote {
    pub id: String,
    pub date: String,
    pub payload: Option<ThreadPayload>,
}

/// A review-done marker row for one calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewMarker {
    pub id: String,
    pub day: String,
}

/// A decoded record. Raw rows are classified at the storage boundary so the
/// rest of the model never has to re-check sentinel prefixes.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Note(Note),
    Thread(ThreadNote),
    ReviewMarker(ReviewMarker),
}

impl Record {
    pub fn from_row(row: NoteRow) -> Self {
        if thread::is_thread_text(&row.text) {
            return Record::Thread(ThreadNote {
                id: row.id,
                date: row.date,
                payload: thread::decode_payload(row.answer.as_deref()),
            });
        }
        if let Some(day) = thread::review_marker_day(&row.text) {
            return Record::ReviewMarker(ReviewMarker {
                id: row.id,
                day: day.to_string(),
            });
        }
        Record::Note(Note {
            id: row.id,
            text: row.text,
            date: row.date,
            is_task: row.is_task,
            completed: row.completed,
            is_question: row.is_question,
            answer: row.answer,
            position: row.position,
        })
    }

    pub fn id(&self) -> &str {
        match self {
            Record::Note(n) => &n.id,
            Record::Thread(t) => &t.id,
            Record::ReviewMarker(m) => &m.id,
        }
    }

    pub fn date(&self) -> &str {
        match self {
            Record::Note(n) => &n.date,
            Record::Thread(t) => &t.date,
            // markers never reach a sorted surface, but give them a stable key
            Record::ReviewMarker(_) => "",
        }
    }

    /// Explicit ordering override within the day. Threads and markers are
    /// excluded from position-based reordering entirely.
    pub fn position(&self) -> Option<i64> {
        match self {
            Record::Note(n) => n.position,
            _ => None,
        }
    }

    pub fn as_note(&self) -> Option<&Note> {
        match self {
            Record::Note(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_thread(&self) -> Option<&ThreadNote> {
        match self {
            Record::Thread(t) => Some(t),
            _ => None,
        }
    }
}
