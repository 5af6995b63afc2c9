use std::collections::HashSet;

use chrono::{DateTime, Local, SecondsFormat, Utc};

use crate::classify::{classify_task, is_question};
use crate::dates::{day_key, format_countdown, next_review_cutoff, review_cutoff, today_key};
use crate::feed::{self, FeedRow, NoteType, ReviewBanner};
use crate::flags::LocalFlags;
use crate::invite::{self, Invite, NewInvite};
use crate::note::{NewNote, Note, NotePatch, Record, ThreadNote};
use crate::review::{self, ReviewSession};
use crate::store::NotesBackend;
use crate::streak::{self, MILESTONES};
use crate::thread::{self, ThreadItem, ThreadPayload};
use crate::Error;

/// Result of creating a thread. Creation is two remote calls (insert the
/// composite row, then delete the sources) with no transaction around them;
/// ids that survived a failed delete are reported here and retried on the
/// next load.
#[derive(Debug, Clone)]
pub struct ThreadCreated {
    pub id: String,
    pub unremoved_sources: Vec<String>,
}

/// The main service: the in-memory working set of one user's notes plus all
/// mutations against the remote table. Generic over the backend
/// implementation.
///
/// The working set is refreshed by full reload after every mutation, except
/// the task-completion toggle (optimistic, rolled back on failure) and
/// answer saves (local cache patch), mirroring the sync model described in
/// the data contract.
pub struct DumkaService<B: NotesBackend> {
    backend: B,
    user_id: String,
    records: Vec<Record>,
    flags: LocalFlags,
}

impl<B: NotesBackend> DumkaService<B> {
    pub fn new(backend: B, user_id: impl Into<String>, flags: LocalFlags) -> Self {
        Self {
            backend,
            user_id: user_id.into(),
            records: Vec::new(),
            flags,
        }
    }

    /// The visible working set: review markers and thread-absorbed notes
    /// are already filtered out.
    pub fn visible(&self) -> &[Record] {
        &self.records
    }

    pub fn flags(&self) -> &LocalFlags {
        &self.flags
    }

    fn note(&self, id: &str) -> Result<&Note, Error> {
        self.records
            .iter()
            .filter_map(Record::as_note)
            .find(|n| n.id == id)
            .ok_or_else(|| Error::NotFound(format!("note {}", id)))
    }

    fn note_mut(&mut self, id: &str) -> Result<&mut Note, Error> {
        self.records
            .iter_mut()
            .find_map(|r| match r {
                Record::Note(n) if n.id == id => Some(n),
                _ => None,
            })
            .ok_or_else(|| Error::NotFound(format!("note {}", id)))
    }

    fn thread(&self, id: &str) -> Result<&ThreadNote, Error> {
        self.records
            .iter()
            .filter_map(Record::as_thread)
            .find(|t| t.id == id)
            .ok_or_else(|| Error::NotFound(format!("thread {}", id)))
    }

    fn thread_mut(&mut self, id: &str) -> Result<&mut ThreadNote, Error> {
        self.records
            .iter_mut()
            .find_map(|r| match r {
                Record::Thread(t) if t.id == id => Some(t),
                _ => None,
            })
            .ok_or_else(|| Error::NotFound(format!("thread {}", id)))
    }

    fn now_iso() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Reload the full working set from the remote table.
    ///
    /// Thread membership is only discoverable by scanning every thread
    /// payload, so the hidden-id set is recomputed here on every load. The
    /// load also reconciles state that can drift: review markers sync into
    /// local flags, moved-note flags for deleted rows are pruned, and
    /// source notes left behind by a failed thread-creation delete are
    /// retried.
    pub async fn refresh(&mut self) -> Result<(), Error> {
        let rows = self.backend.fetch_notes(&self.user_id).await?;
        let decoded: Vec<Record> = rows.into_iter().map(Record::from_row).collect();

        let live_ids: HashSet<&str> = decoded.iter().map(Record::id).collect();
        self.flags.prune_moved(&live_ids);

        for record in &decoded {
            if let Record::ReviewMarker(marker) = record {
                self.flags.mark_review_done(&marker.day);
            }
        }

        let hidden = thread::collect_thread_member_ids(&decoded);

        let stale: Vec<String> = decoded
            .iter()
            .filter_map(|r| match r {
                Record::Note(n) if hidden.contains(&n.id) => Some(n.id.clone()),
                _ => None,
            })
            .collect();
        if !stale.is_empty() {
            tracing::warn!(
                count = stale.len(),
                "removing thread source notes left behind by an earlier failure"
            );
            if let Err(err) = self.backend.delete_notes(&self.user_id, &stale).await {
                tracing::warn!(%err, "thread source cleanup failed, will retry on next load");
            }
        }

        self.records = decoded
            .into_iter()
            .filter(|r| match r {
                Record::ReviewMarker(_) => false,
                Record::Thread(_) => true,
                Record::Note(n) => !hidden.contains(&n.id),
            })
            .collect();
        Ok(())
    }

    /// Create a note, deriving its classification from the text.
    pub async fn create_note(&mut self, text: &str) -> Result<String, Error> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("note text cannot be empty".into()));
        }

        let info = classify_task(text);
        let note = NewNote {
            text: text.to_string(),
            date: Self::now_iso(),
            is_task: info.is_task,
            completed: false,
            is_question: is_question(text),
            answer: None,
        };
        tracing::info!(is_task = note.is_task, is_question = note.is_question, "creating note");
        let id = self.backend.insert_note(&self.user_id, note).await?;
        self.refresh().await?;
        Ok(id)
    }

    /// Edit a note's text. Classification is re-derived and re-persisted;
    /// a note that stops being a task loses its completion, one that stops
    /// being a question loses its answer.
    pub async fn update_note_text(&mut self, id: &str, text: &str) -> Result<(), Error> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("note text cannot be empty".into()));
        }
        self.note(id)?;

        let info = classify_task(text);
        let question = is_question(text);
        let mut patch = NotePatch {
            text: Some(text.to_string()),
            is_task: Some(info.is_task),
            is_question: Some(question),
            ..Default::default()
        };
        if !info.is_task {
            patch.completed = Some(false);
        }
        if !question {
            patch.answer = Some(None);
        }

        tracing::info!(%id, "updating note text");
        if !self.backend.update_note(&self.user_id, id, patch).await? {
            return Err(Error::NotFound(format!("note {}", id)));
        }
        self.refresh().await
    }

    pub async fn delete_note(&mut self, id: &str) -> Result<(), Error> {
        self.delete_notes(&[id.to_string()]).await
    }

    pub async fn delete_notes(&mut self, ids: &[String]) -> Result<(), Error> {
        if ids.is_empty() {
            return Ok(());
        }
        tracing::info!(count = ids.len(), "deleting notes");
        self.backend.delete_notes(&self.user_id, ids).await?;
        self.refresh().await
    }

    /// Toggle task completion optimistically: the local model flips first
    /// and rolls back if the remote write fails.
    pub async fn set_completed(&mut self, id: &str, completed: bool) -> Result<(), Error> {
        let prev = {
            let note = self.note_mut(id)?;
            let prev = note.completed;
            note.completed = completed;
            prev
        };

        let patch = NotePatch {
            completed: Some(completed),
            ..Default::default()
        };
        match self.backend.update_note(&self.user_id, id, patch).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.note_mut(id)?.completed = prev;
                Err(Error::NotFound(format!("note {}", id)))
            }
            Err(err) => {
                self.note_mut(id)?.completed = prev;
                Err(err)
            }
        }
    }

    /// Save (or clear, with empty input) a question's answer. Patches the
    /// local cache in place instead of reloading.
    pub async fn save_answer(&mut self, id: &str, value: &str) -> Result<(), Error> {
        self.note(id)?;
        let trimmed = value.trim();
        let answer = (!trimmed.is_empty()).then(|| trimmed.to_string());

        let patch = NotePatch {
            answer: Some(answer.clone()),
            ..Default::default()
        };
        if !self.backend.update_note(&self.user_id, id, patch).await? {
            return Err(Error::NotFound(format!("note {}", id)));
        }
        self.note_mut(id)?.answer = answer;
        Ok(())
    }

    /// Ids of one day's plain notes in current feed order. Threads are
    /// excluded from position-based reordering entirely.
    pub fn day_note_ids(&self, day: &str) -> Vec<String> {
        let mut day_notes: Vec<&Record> = self
            .records
            .iter()
            .filter(|r| matches!(r, Record::Note(_)))
            .filter(|r| day_key(r.date()) == day)
            .collect();
        day_notes.sort_by(|a, b| feed::feed_ordering(a, b));
        day_notes.iter().map(|r| r.id().to_string()).collect()
    }

    /// Persist a manual reorder of one day: every note in `ordered_ids`
    /// gets its 0-based slot as `position`, but only changed positions are
    /// written. Any write failure aborts before the in-memory model is
    /// touched; no partial reorder is ever applied locally.
    pub async fn reorder_day(&mut self, ordered_ids: &[String], dragged_id: &str) -> Result<(), Error> {
        if ordered_ids.is_empty() {
            return Ok(());
        }

        let day = day_key(&self.note(&ordered_ids[0])?.date);
        let mut updates: Vec<(String, i64)> = Vec::new();
        for (slot, id) in ordered_ids.iter().enumerate() {
            let note = self.note(id)?;
            if day_key(&note.date) != day {
                return Err(Error::Validation(
                    "cannot reorder notes across days".into(),
                ));
            }
            if note.position != Some(slot as i64) {
                updates.push((id.clone(), slot as i64));
            }
        }

        for (id, slot) in &updates {
            let patch = NotePatch {
                position: Some(Some(*slot)),
                ..Default::default()
            };
            if !self.backend.update_note(&self.user_id, id, patch).await? {
                return Err(Error::NotFound(format!("note {}", id)));
            }
        }

        for (id, slot) in &updates {
            self.note_mut(id)?.position = Some(*slot);
        }
        self.flags.mark_moved(dragged_id);
        Ok(())
    }

    /// Undo a manual move. When no other manually-moved notes remain in the
    /// day the whole day falls back to chronological order (all positions
    /// cleared); otherwise only this note's position is cleared.
    pub async fn clear_position(&mut self, id: &str) -> Result<(), Error> {
        let (day, has_position) = {
            let note = self.note(id)?;
            (day_key(&note.date), note.position.is_some())
        };
        self.flags.clear_moved(id);
        if !has_position {
            return Ok(());
        }

        let positioned: Vec<String> = self
            .records
            .iter()
            .filter_map(Record::as_note)
            .filter(|n| n.position.is_some() && day_key(&n.date) == day)
            .map(|n| n.id.clone())
            .collect();

        let others_still_moved = positioned
            .iter()
            .any(|nid| nid != id && self.flags.is_note_moved(nid));
        let targets: Vec<String> = if others_still_moved {
            vec![id.to_string()]
        } else {
            positioned
        };

        for target in &targets {
            let patch = NotePatch {
                position: Some(None),
                ..Default::default()
            };
            if !self.backend.update_note(&self.user_id, target, patch).await? {
                return Err(Error::NotFound(format!("note {}", target)));
            }
        }
        for target in &targets {
            self.note_mut(target)?.position = None;
        }
        Ok(())
    }

    /// Fold two or more standalone notes into a new thread: insert one
    /// composite row, then delete the sources. The two calls are not
    /// atomic; sources that could not be removed are reported and retried
    /// on the next load.
    pub async fn create_thread(&mut self, source_ids: &[String]) -> Result<ThreadCreated, Error> {
        let wanted: HashSet<&str> = source_ids.iter().map(String::as_str).collect();
        let sources: Vec<Note> = self
            .records
            .iter()
            .filter_map(Record::as_note)
            .filter(|n| wanted.contains(n.id.as_str()))
            .cloned()
            .collect();
        if sources.len() < 2 {
            return Err(Error::Validation(
                "a thread needs at least two source notes".into(),
            ));
        }

        let now = Utc::now();
        let payload = ThreadPayload {
            version: 1,
            created_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            title: None,
            items: sources.iter().map(ThreadItem::from_note).collect(),
        };
        let row = NewNote {
            text: thread::new_thread_text(now.timestamp_millis()),
            date: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            is_task: false,
            completed: false,
            is_question: false,
            answer: Some(thread::encode_payload(&payload)),
        };

        tracing::info!(sources = sources.len(), "creating thread");
        let id = self.backend.insert_note(&self.user_id, row).await?;

        let ids: Vec<String> = sources.iter().map(|n| n.id.clone()).collect();
        let mut unremoved = Vec::new();
        if let Err(err) = self.backend.delete_notes(&self.user_id, &ids).await {
            tracing::warn!(%err, "thread created but source notes were not removed");
            unremoved = ids;
        }

        self.refresh().await?;
        Ok(ThreadCreated {
            id,
            unremoved_sources: unremoved,
        })
    }

    /// All thread-content edits follow one shape: decode the current
    /// payload, apply a pure transform to a copy, re-encode, and write the
    /// whole payload back as a single `answer` update.
    async fn mutate_thread<F>(&mut self, thread_id: &str, mutate: F) -> Result<(), Error>
    where
        F: FnOnce(&mut ThreadPayload) -> Result<(), Error>,
    {
        let mut next = {
            let thread = self.thread(thread_id)?;
            thread.payload.clone().ok_or_else(|| {
                Error::Validation(format!("thread {} has a malformed payload", thread_id))
            })?
        };
        mutate(&mut next)?;

        let patch = NotePatch {
            answer: Some(Some(thread::encode_payload(&next))),
            ..Default::default()
        };
        if !self.backend.update_note(&self.user_id, thread_id, patch).await? {
            return Err(Error::NotFound(format!("thread {}", thread_id)));
        }
        self.thread_mut(thread_id)?.payload = Some(next);
        Ok(())
    }

    fn item_index(payload: &ThreadPayload, index: usize) -> Result<(), Error> {
        if index >= payload.items.len() {
            return Err(Error::NotFound(format!("thread item {}", index)));
        }
        Ok(())
    }

    /// Append a new synthetic item (no source id) to a thread.
    pub async fn thread_append(&mut self, thread_id: &str, text: &str) -> Result<(), Error> {
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(Error::Validation("thread item text cannot be empty".into()));
        }
        let info = classify_task(&text);
        let item = ThreadItem {
            id: None,
            text: text.clone(),
            date: Self::now_iso(),
            is_task: info.is_task,
            completed: false,
            is_question: is_question(&text),
            answer: None,
        };
        self.mutate_thread(thread_id, |payload| {
            payload.items.push(item);
            Ok(())
        })
        .await
    }

    /// Edit a thread item's text, re-deriving its classification the same
    /// way a standalone edit would.
    pub async fn thread_edit_item(
        &mut self,
        thread_id: &str,
        index: usize,
        text: &str,
    ) -> Result<(), Error> {
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(Error::Validation("thread item text cannot be empty".into()));
        }
        let info = classify_task(&text);
        let question = is_question(&text);
        self.mutate_thread(thread_id, |payload| {
            Self::item_index(payload, index)?;
            let item = &mut payload.items[index];
            item.text = text;
            item.is_task = info.is_task;
            item.is_question = question;
            if !info.is_task {
                item.completed = false;
            }
            if !question {
                item.answer = None;
            }
            Ok(())
        })
        .await
    }

    pub async fn thread_delete_item(&mut self, thread_id: &str, index: usize) -> Result<(), Error> {
        self.mutate_thread(thread_id, |payload| {
            Self::item_index(payload, index)?;
            payload.items.remove(index);
            Ok(())
        })
        .await
    }

    pub async fn thread_set_item_completed(
        &mut self,
        thread_id: &str,
        index: usize,
        completed: bool,
    ) -> Result<(), Error> {
        self.mutate_thread(thread_id, |payload| {
            Self::item_index(payload, index)?;
            payload.items[index].completed = completed;
            Ok(())
        })
        .await
    }

    pub async fn thread_set_item_answer(
        &mut self,
        thread_id: &str,
        index: usize,
        value: &str,
    ) -> Result<(), Error> {
        let trimmed = value.trim();
        let answer = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self.mutate_thread(thread_id, |payload| {
            Self::item_index(payload, index)?;
            payload.items[index].answer = answer;
            Ok(())
        })
        .await
    }

    /// Set or clear (with empty input) the thread title.
    pub async fn thread_set_title(&mut self, thread_id: &str, title: &str) -> Result<(), Error> {
        let trimmed = title.trim();
        let title = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self.mutate_thread(thread_id, |payload| {
            payload.title = title;
            Ok(())
        })
        .await
    }

    pub fn pending_review(&self, now: DateTime<Local>) -> Vec<Note> {
        review::pending_review_tasks(&self.records, now)
    }

    /// Open a review session over the currently pending tasks, or `None`
    /// when nothing needs review.
    pub fn start_review(&self, now: DateTime<Local>) -> Option<ReviewSession> {
        ReviewSession::new(
            self.pending_review(now),
            review::yesterday_stats(&self.records, now),
        )
    }

    /// Mark today's review done, locally and remotely. The remote marker is
    /// upserted idempotently: an existing marker row for the day suppresses
    /// the insert so devices do not pile up duplicates.
    pub async fn mark_review_done(&mut self, now: DateTime<Local>) -> Result<(), Error> {
        let day = today_key(now);
        self.flags.mark_review_done(&day);

        let marker_text = thread::review_marker_text(&day);
        let rows = self.backend.fetch_notes(&self.user_id).await?;
        if rows.iter().any(|r| r.text == marker_text) {
            return Ok(());
        }

        let marker = NewNote {
            text: marker_text,
            date: Self::now_iso(),
            is_task: false,
            completed: false,
            is_question: false,
            answer: None,
        };
        self.backend.insert_note(&self.user_id, marker).await?;
        Ok(())
    }

    /// The feed banner, visible from 08:00 local onward: pending count
    /// before the review is done, a countdown to the next cutoff after.
    pub fn review_banner(&self, now: DateTime<Local>) -> Option<ReviewBanner> {
        if now < review_cutoff(now) {
            return None;
        }
        if self.flags.is_review_done(&today_key(now)) {
            let remaining = next_review_cutoff(now) - now;
            return Some(ReviewBanner::Done {
                countdown: format_countdown(remaining),
            });
        }
        let pending = self.pending_review(now).len();
        (pending > 0).then_some(ReviewBanner::Pending { count: pending })
    }

    /// Distinct local calendar days with at least one note created: plain
    /// notes plus the snapshots inside threads (the synthetic thread row
    /// itself does not count).
    pub fn active_days(&self) -> HashSet<String> {
        let mut days = HashSet::new();
        for record in &self.records {
            match record {
                Record::Note(n) => {
                    days.insert(day_key(&n.date));
                }
                Record::Thread(t) => {
                    if let Some(payload) = &t.payload {
                        for item in &payload.items {
                            days.insert(day_key(&item.date));
                        }
                    }
                }
                Record::ReviewMarker(_) => {}
            }
        }
        days
    }

    pub fn streak(&self, now: DateTime<Local>) -> u32 {
        streak::compute_streak(&self.active_days(), now.date_naive())
    }

    /// A milestone to celebrate right now, at most once per day per
    /// milestone value. Marking happens immediately so a second call the
    /// same day stays quiet.
    pub fn milestone_to_celebrate(&mut self, now: DateTime<Local>) -> Option<u32> {
        let current = self.streak(now);
        if !MILESTONES.contains(&current) {
            return None;
        }
        let flag = streak::milestone_flag(&today_key(now), current);
        if self.flags.milestone_seen(&flag) {
            return None;
        }
        self.flags.mark_milestone(flag);
        Some(current)
    }

    pub fn feed(&self, now: DateTime<Local>) -> Vec<FeedRow> {
        feed::build_feed(&self.records, &self.flags, now, self.review_banner(now))
    }

    pub fn folders(&self) -> Vec<(NoteType, usize)> {
        feed::folder_counts(&self.records)
    }

    pub fn folder_feed(&self, folder: NoteType, now: DateTime<Local>) -> Vec<FeedRow> {
        feed::folder_feed(&self.records, folder, &self.flags, now)
    }

    pub async fn create_invite(&self) -> Result<Invite, Error> {
        let invite = NewInvite {
            code: invite::generate_code(8),
            created_by: self.user_id.clone(),
        };
        tracing::info!("creating invite");
        self.backend.create_invite(invite).await
    }

    pub async fn list_invites(&self) -> Result<Vec<Invite>, Error> {
        self.backend.list_invites().await
    }
}
