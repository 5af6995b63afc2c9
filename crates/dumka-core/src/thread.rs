//! Thread codec.
//!
//! A thread is physically a single `notes` row: `text` carries a reserved
//! sentinel prefix plus a creation-timestamp uniqueness tag, and `answer`
//! holds the serialized payload listing the grouped items in insertion
//! order. Review-done markers use a second sentinel with a `YYYY-MM-DD`
//! suffix. Decoding never errors outward; a malformed payload degrades to
//! "no payload".

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{Note, Record};

pub const THREAD_MARKER: &str = "__thread_v1__";
pub const REVIEW_MARKER: &str = "__review_done__";

/// The decoded `answer` payload of a thread row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadPayload {
    pub version: u32,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub items: Vec<ThreadItem>,
}

/// A structural snapshot of a note at the moment it was folded into the
/// thread. Items that originated as standalone notes keep their original id
/// so the top-level feed can suppress the duplicate; synthetic items carry
/// no id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadItem {
    pub id: Option<String>,
    pub text: String,
    pub date: String,
    pub is_task: bool,
    pub completed: bool,
    pub is_question: bool,
    pub answer: Option<String>,
}

impl ThreadItem {
    /// Snapshot a standalone note for inclusion in a thread.
    pub fn from_note(note: &Note) -> Self {
        Self {
            id: Some(note.id.clone()),
            text: note.text.clone(),
            date: note.date.clone(),
            is_task: note.is_task,
            completed: note.completed,
            is_question: note.is_question,
            answer: note.answer.clone(),
        }
    }
}

pub fn is_thread_text(text: &str) -> bool {
    text.starts_with(THREAD_MARKER)
}

/// The `text` value for a freshly created thread row. The timestamp acts as
/// a uniqueness tag only and is never parsed back.
pub fn new_thread_text(created_at_millis: i64) -> String {
    format!("{}{}", THREAD_MARKER, created_at_millis)
}

/// The day suffix of a review marker, or `None` for any other text.
pub fn review_marker_day(text: &str) -> Option<&str> {
    text.strip_prefix(REVIEW_MARKER)
}

pub fn review_marker_text(day: &str) -> String {
    format!("{}{}", REVIEW_MARKER, day)
}

/// Decode a thread payload from the raw `answer` column.
///
/// Returns `None` when the value is absent or empty, when it is not valid
/// JSON, or when the parsed object lacks an `items` array. Individual items
/// are sanitized: anything without a string `text` and `date` is dropped,
/// booleans default to false, `id` and `answer` default to null.
pub fn decode_payload(answer: Option<&str>) -> Option<ThreadPayload> {
    let raw = answer?.trim();
    if raw.is_empty() {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    let items = value.get("items")?.as_array()?;

    Some(ThreadPayload {
        version: value.get("version").and_then(|v| v.as_u64()).unwrap_or(1) as u32,
        created_at: value
            .get("created_at")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        title: value
            .get("title")
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .map(str::to_string),
        items: sanitize_items(items),
    })
}

fn sanitize_items(values: &[serde_json::Value]) -> Vec<ThreadItem> {
    values
        .iter()
        .filter_map(|v| {
            let text = v.get("text")?.as_str()?;
            let date = v.get("date")?.as_str()?;
            Some(ThreadItem {
                id: v.get("id").and_then(|x| x.as_str()).map(str::to_string),
                text: text.to_string(),
                date: date.to_string(),
                is_task: v.get("is_task").and_then(|x| x.as_bool()).unwrap_or(false),
                completed: v.get("completed").and_then(|x| x.as_bool()).unwrap_or(false),
                is_question: v
                    .get("is_question")
                    .and_then(|x| x.as_bool())
                    .unwrap_or(false),
                answer: v.get("answer").and_then(|x| x.as_str()).map(str::to_string),
            })
        })
        .collect()
}

/// Serialize a payload for the `answer` column. The whole payload
/// round-trips as one write; there are no partial updates to nested items.
pub fn encode_payload(payload: &ThreadPayload) -> String {
    serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string())
}

/// Ids of all former standalone notes referenced by any thread payload.
/// The note store hides these from the top-level feed; membership is only
/// discoverable by scanning every thread, so this runs on each load.
pub fn collect_thread_member_ids(records: &[Record]) -> HashSet<String> {
    let mut hidden = HashSet::new();
    for record in records {
        let Record::Thread(t) = record else { continue };
        let Some(payload) = &t.payload else { continue };
        for item in &payload.items {
            if let Some(id) = &item.id {
                hidden.insert(id.clone());
            }
        }
    }
    hidden
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NoteRow;

    fn thread_record(answer: &str) -> Record {
        Record::from_row(NoteRow {
            id: "t1".into(),
            user_id: "u1".into(),
            text: new_thread_text(1754000000000),
            date: "2026-08-05T10:00:00Z".into(),
            is_task: false,
            completed: false,
            is_question: false,
            answer: Some(answer.into()),
            position: None,
        })
    }

    #[test]
    fn test_decode_rejects_missing_items() {
        assert!(decode_payload(None).is_none());
        assert!(decode_payload(Some("")).is_none());
        assert!(decode_payload(Some("not json")).is_none());
        assert!(decode_payload(Some("{\"version\":1}")).is_none());
        assert!(decode_payload(Some("{\"items\":42}")).is_none());
    }

    #[test]
    fn test_decode_sanitizes_items() {
        let raw = r#"{
            "version": 1,
            "created_at": "2026-08-05T10:00:00Z",
            "items": [
                {"id": "a", "text": "keep", "date": "2026-08-04T09:00:00Z", "is_task": true},
                {"text": "no date"},
                {"date": "2026-08-04T09:00:00Z"},
                {"text": "synthetic", "date": "2026-08-04T10:00:00Z", "completed": "yes"}
            ]
        }"#;
        let payload = decode_payload(Some(raw)).unwrap();
        assert_eq!(payload.items.len(), 2);
        assert_eq!(payload.items[0].id.as_deref(), Some("a"));
        assert!(payload.items[0].is_task);
        assert_eq!(payload.items[1].id, None);
        // non-boolean coerces to the default, not an error
        assert!(!payload.items[1].completed);
        assert_eq!(payload.items[1].answer, None);
    }

    #[test]
    fn test_round_trip_equals_sanitized_input() {
        let payload = ThreadPayload {
            version: 1,
            created_at: "2026-08-05T10:00:00Z".into(),
            title: Some("groceries".into()),
            items: vec![
                ThreadItem {
                    id: Some("a".into()),
                    text: "[] buy milk".into(),
                    date: "2026-08-04T09:00:00Z".into(),
                    is_task: true,
                    completed: false,
                    is_question: false,
                    answer: None,
                },
                ThreadItem {
                    id: None,
                    text: "why oat milk?".into(),
                    date: "2026-08-04T10:00:00Z".into(),
                    is_task: false,
                    completed: false,
                    is_question: true,
                    answer: Some("cheaper".into()),
                },
            ],
        };
        let decoded = decode_payload(Some(&encode_payload(&payload))).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_title_omitted_when_none() {
        let payload = ThreadPayload {
            version: 1,
            created_at: "2026-08-05T10:00:00Z".into(),
            title: None,
            items: vec![],
        };
        assert!(!encode_payload(&payload).contains("title"));
    }

    #[test]
    fn test_collect_member_ids_skips_synthetic_items() {
        let raw = r#"{
            "version": 1,
            "created_at": "2026-08-05T10:00:00Z",
            "items": [
                {"id": "a", "text": "one", "date": "2026-08-04T09:00:00Z"},
                {"id": "b", "text": "two", "date": "2026-08-04T09:05:00Z"},
                {"id": null, "text": "three", "date": "2026-08-04T09:10:00Z"}
            ]
        }"#;
        let records = vec![thread_record(raw)];
        let ids = collect_thread_member_ids(&records);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("a") && ids.contains("b"));
    }

    #[test]
    fn test_marker_helpers() {
        assert_eq!(
            review_marker_day("__review_done__2026-08-05"),
            Some("2026-08-05")
        );
        assert_eq!(review_marker_day("plain note"), None);
        assert!(is_thread_text(&new_thread_text(0)));
    }
}
