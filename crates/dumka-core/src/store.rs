use crate::{Error, Invite, NewInvite, NewNote, NotePatch, NoteRow};

/// Storage abstraction over the hosted `notes` and `invites` tables.
///
/// Uses `async_trait` with `?Send`: the client model is single-threaded and
/// event-driven, and backends mirror the hosted row API one request at a
/// time. There is no retry or backoff here; a failed call surfaces its
/// error and the caller decides what to roll back.
#[async_trait::async_trait(?Send)]
pub trait NotesBackend {
    /// All rows owned by the user, ordered by `date` ascending.
    async fn fetch_notes(&self, user_id: &str) -> Result<Vec<NoteRow>, Error>;

    /// Insert a row and return the id assigned by the store.
    async fn insert_note(&self, user_id: &str, note: NewNote) -> Result<String, Error>;

    /// Apply a field-scoped update to one row owned by the user. Returns
    /// false if no such row exists.
    async fn update_note(&self, user_id: &str, id: &str, patch: NotePatch)
        -> Result<bool, Error>;

    /// Delete rows owned by the user, returning how many were removed.
    /// Missing ids are not an error.
    async fn delete_notes(&self, user_id: &str, ids: &[String]) -> Result<u64, Error>;

    /// Record a new invite code.
    async fn create_invite(&self, invite: NewInvite) -> Result<Invite, Error>;

    /// All invites, newest first.
    async fn list_invites(&self) -> Result<Vec<Invite>, Error>;
}
