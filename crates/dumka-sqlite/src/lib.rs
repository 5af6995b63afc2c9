//! SQLite implementation of the Dumka notes backend.
//!
//! A faithful local stand-in for the hosted `notes` and `invites` tables:
//! the same columns, the same owner scoping on every statement, and ids
//! minted by the store.

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use dumka_core::{
    get_pending_migrations, Error, Invite, NewInvite, NewNote, NotePatch, NoteRow, NotesBackend,
    SCHEMA_VERSION,
};
use uuid::Uuid;

/// SQLite-backed notes store.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open a database at the given path and run any pending migrations.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let conn = Connection::open(path).map_err(|e| Error::Backend(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| Error::Backend(e.to_string()))?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database and run migrations.
    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Backend(e.to_string()))?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Run any pending database migrations.
    pub fn run_migrations(&self) -> Result<(), Error> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _dumka_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| Error::Backend(e.to_string()))?;

        let current_version: i64 = conn
            .query_row(
                "SELECT value FROM _dumka_meta WHERE key = 'schema_version'",
                [],
                |row| {
                    let val: String = row.get(0)?;
                    Ok(val.parse().unwrap_or(0))
                },
            )
            .unwrap_or(0);

        if current_version >= SCHEMA_VERSION {
            return Ok(());
        }

        for migration in get_pending_migrations(current_version) {
            for statement in migration.statements {
                // _dumka_meta creation already happened above
                if statement.contains("_dumka_meta") {
                    continue;
                }
                conn.execute(statement, []).map_err(|e| {
                    Error::Backend(format!("migration {} failed: {}", migration.name, e))
                })?;
            }
        }

        conn.execute(
            "INSERT OR REPLACE INTO _dumka_meta (key, value) VALUES ('schema_version', ?1)",
            params![SCHEMA_VERSION.to_string()],
        )
        .map_err(|e| Error::Backend(e.to_string()))?;

        Ok(())
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NoteRow> {
        Ok(NoteRow {
            id: row.get(0)?,
            user_id: row.get(1)?,
            text: row.get(2)?,
            date: row.get(3)?,
            is_task: row.get(4)?,
            completed: row.get(5)?,
            is_question: row.get(6)?,
            answer: row.get(7)?,
            position: row.get(8)?,
        })
    }
}

#[async_trait::async_trait(?Send)]
impl NotesBackend for SqliteBackend {
    async fn fetch_notes(&self, user_id: &str) -> Result<Vec<NoteRow>, Error> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, text, date, is_task, completed, is_question, answer, \"position\"
                 FROM notes
                 WHERE user_id = ?1
                 ORDER BY date ASC, id ASC",
            )
            .map_err(|e| Error::Backend(e.to_string()))?;

        let notes = stmt
            .query_map(params![user_id], Self::map_row)
            .map_err(|e| Error::Backend(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::Backend(e.to_string()))?;

        Ok(notes)
    }

    async fn insert_note(&self, user_id: &str, note: NewNote) -> Result<String, Error> {
        let conn = self.conn.lock().unwrap();

        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO notes (id, user_id, text, date, is_task, completed, is_question, answer)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                user_id,
                note.text,
                note.date,
                note.is_task,
                note.completed,
                note.is_question,
                note.answer,
            ],
        )
        .map_err(|e| Error::Backend(e.to_string()))?;

        Ok(id)
    }

    async fn update_note(
        &self,
        user_id: &str,
        id: &str,
        patch: NotePatch,
    ) -> Result<bool, Error> {
        let conn = self.conn.lock().unwrap();

        let exists: bool = conn
            .query_row(
                "SELECT 1 FROM notes WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                |_| Ok(true),
            )
            .optional()
            .map_err(|e| Error::Backend(e.to_string()))?
            .unwrap_or(false);

        if !exists {
            return Ok(false);
        }

        if let Some(ref text) = patch.text {
            conn.execute(
                "UPDATE notes SET text = ?1 WHERE id = ?2 AND user_id = ?3",
                params![text, id, user_id],
            )
            .map_err(|e| Error::Backend(e.to_string()))?;
        }

        if let Some(is_task) = patch.is_task {
            conn.execute(
                "UPDATE notes SET is_task = ?1 WHERE id = ?2 AND user_id = ?3",
                params![is_task, id, user_id],
            )
            .map_err(|e| Error::Backend(e.to_string()))?;
        }

        if let Some(completed) = patch.completed {
            conn.execute(
                "UPDATE notes SET completed = ?1 WHERE id = ?2 AND user_id = ?3",
                params![completed, id, user_id],
            )
            .map_err(|e| Error::Backend(e.to_string()))?;
        }

        if let Some(is_question) = patch.is_question {
            conn.execute(
                "UPDATE notes SET is_question = ?1 WHERE id = ?2 AND user_id = ?3",
                params![is_question, id, user_id],
            )
            .map_err(|e| Error::Backend(e.to_string()))?;
        }

        if let Some(ref answer) = patch.answer {
            conn.execute(
                "UPDATE notes SET answer = ?1 WHERE id = ?2 AND user_id = ?3",
                params![answer, id, user_id],
            )
            .map_err(|e| Error::Backend(e.to_string()))?;
        }

        if let Some(ref position) = patch.position {
            conn.execute(
                "UPDATE notes SET \"position\" = ?1 WHERE id = ?2 AND user_id = ?3",
                params![position, id, user_id],
            )
            .map_err(|e| Error::Backend(e.to_string()))?;
        }

        Ok(true)
    }

    async fn delete_notes(&self, user_id: &str, ids: &[String]) -> Result<u64, Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().unwrap();

        let placeholders: Vec<String> = (0..ids.len()).map(|i| format!("?{}", i + 2)).collect();
        let sql = format!(
            "DELETE FROM notes WHERE user_id = ?1 AND id IN ({})",
            placeholders.join(",")
        );

        let mut params_refs: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(ids.len() + 1);
        params_refs.push(&user_id);
        for id in ids {
            params_refs.push(id);
        }

        let deleted = conn
            .execute(&sql, params_refs.as_slice())
            .map_err(|e| Error::Backend(e.to_string()))?;

        Ok(deleted as u64)
    }

    async fn create_invite(&self, invite: NewInvite) -> Result<Invite, Error> {
        let conn = self.conn.lock().unwrap();

        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        conn.execute(
            "INSERT INTO invites (id, code, created_at, created_by) VALUES (?1, ?2, ?3, ?4)",
            params![id, invite.code, created_at, invite.created_by],
        )
        .map_err(|e| Error::Backend(e.to_string()))?;

        Ok(Invite {
            id,
            code: invite.code,
            created_at,
            created_by: invite.created_by,
            used_at: None,
            used_by: None,
        })
    }

    async fn list_invites(&self) -> Result<Vec<Invite>, Error> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, code, created_at, created_by, used_at, used_by
                 FROM invites
                 ORDER BY created_at DESC, id DESC
                 LIMIT 200",
            )
            .map_err(|e| Error::Backend(e.to_string()))?;

        let invites = stmt
            .query_map([], |row| {
                Ok(Invite {
                    id: row.get(0)?,
                    code: row.get(1)?,
                    created_at: row.get(2)?,
                    created_by: row.get(3)?,
                    used_at: row.get(4)?,
                    used_by: row.get(5)?,
                })
            })
            .map_err(|e| Error::Backend(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::Backend(e.to_string()))?;

        Ok(invites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use dumka_core::{
        classify_task, collect_thread_member_ids, encode_payload, invite_stats, is_question,
        new_thread_text, DumkaService, LocalFlags, Record, ReviewBanner, ThreadItem, ThreadPayload,
    };

    const USER: &str = "user-1";

    fn backend() -> SqliteBackend {
        SqliteBackend::open_in_memory().unwrap()
    }

    fn new_note(text: &str, date: &str) -> NewNote {
        let info = classify_task(text);
        NewNote {
            text: text.to_string(),
            date: date.to_string(),
            is_task: info.is_task,
            completed: false,
            is_question: is_question(text),
            answer: None,
        }
    }

    fn service(backend: SqliteBackend) -> DumkaService<SqliteBackend> {
        DumkaService::new(backend, USER, LocalFlags::default())
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let db = backend();
        let id = db
            .insert_note(USER, new_note("[] buy milk", "2026-08-05T07:00:00.000Z"))
            .await
            .unwrap();

        let rows = db.fetch_notes(USER).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert!(rows[0].is_task);
        assert!(!rows[0].is_question);
        assert_eq!(rows[0].position, None);

        // scoped by owner
        assert!(db.fetch_notes("someone-else").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_patch_and_null_overwrites() {
        let db = backend();
        let id = db
            .insert_note(USER, new_note("where are my keys?", "2026-08-05T07:00:00.000Z"))
            .await
            .unwrap();

        let patch = NotePatch {
            answer: Some(Some("in the drawer".into())),
            position: Some(Some(2)),
            ..Default::default()
        };
        assert!(db.update_note(USER, &id, patch).await.unwrap());

        let rows = db.fetch_notes(USER).await.unwrap();
        assert_eq!(rows[0].answer.as_deref(), Some("in the drawer"));
        assert_eq!(rows[0].position, Some(2));

        // explicit nulls clear the columns
        let patch = NotePatch {
            answer: Some(None),
            position: Some(None),
            ..Default::default()
        };
        assert!(db.update_note(USER, &id, patch).await.unwrap());
        let rows = db.fetch_notes(USER).await.unwrap();
        assert_eq!(rows[0].answer, None);
        assert_eq!(rows[0].position, None);

        // wrong owner never matches
        let patch = NotePatch {
            completed: Some(true),
            ..Default::default()
        };
        assert!(!db.update_note("someone-else", &id, patch).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_many() {
        let db = backend();
        let a = db
            .insert_note(USER, new_note("one", "2026-08-05T07:00:00.000Z"))
            .await
            .unwrap();
        let b = db
            .insert_note(USER, new_note("two", "2026-08-05T07:01:00.000Z"))
            .await
            .unwrap();

        let deleted = db
            .delete_notes(USER, &[a, b, "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert!(db.fetch_notes(USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_on_disk_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("db.sqlite");
        {
            let db = SqliteBackend::open(&path).unwrap();
            db.insert_note(USER, new_note("kept", "2026-08-05T07:00:00.000Z"))
                .await
                .unwrap();
        }
        let db = SqliteBackend::open(&path).unwrap();
        assert_eq!(db.fetch_notes(USER).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invites() {
        let db = backend();
        let invite = db
            .create_invite(NewInvite {
                code: "abcd1234".into(),
                created_by: USER.into(),
            })
            .await
            .unwrap();
        assert!(!invite.is_used());

        let invites = db.list_invites().await.unwrap();
        assert_eq!(invites.len(), 1);
        let stats = invite_stats(&invites);
        assert_eq!((stats.total, stats.unused, stats.used), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_edit_rederives_classification() {
        // insert "[] buy milk" then edit to "buy milk": is_task flips off and
        // completed is forced back to false even though it had been true
        let mut svc = service(backend());
        let id = svc.create_note("[] buy milk").await.unwrap();

        let note = svc.visible()[0].as_note().unwrap().clone();
        assert!(note.is_task);
        assert!(!note.completed);
        assert_eq!(note.answer, None);

        svc.set_completed(&id, true).await.unwrap();
        svc.update_note_text(&id, "buy milk").await.unwrap();

        let note = svc.visible()[0].as_note().unwrap().clone();
        assert!(!note.is_task);
        assert!(!note.completed);
        // stored flags always equal classify(text) after a successful write
        assert_eq!(note.is_task, classify_task(&note.text).is_task);
        assert_eq!(note.is_question, is_question(&note.text));
    }

    #[tokio::test]
    async fn test_thread_creation_hides_and_deletes_sources() {
        let mut svc = service(backend());
        let a = svc.create_note("перша нотатка").await.unwrap();
        let b = svc.create_note("друга нотатка").await.unwrap();

        let created = svc.create_thread(&[a.clone(), b.clone()]).await.unwrap();
        assert!(created.unremoved_sources.is_empty());

        let visible = svc.visible();
        assert_eq!(visible.len(), 1);
        let thread = visible[0].as_thread().unwrap();
        let payload = thread.payload.as_ref().unwrap();
        assert_eq!(payload.items.len(), 2);
        let item_ids: Vec<String> = payload.items.iter().filter_map(|i| i.id.clone()).collect();
        assert!(item_ids.contains(&a) && item_ids.contains(&b));

        let hidden = collect_thread_member_ids(svc.visible());
        assert!(hidden.contains(&a) && hidden.contains(&b));
    }

    #[tokio::test]
    async fn test_thread_mutations_round_trip_payload() {
        let mut svc = service(backend());
        let a = svc.create_note("перша").await.unwrap();
        let b = svc.create_note("друга").await.unwrap();
        let thread_id = svc.create_thread(&[a, b]).await.unwrap().id;

        svc.thread_append(&thread_id, "[] третя задача?").await.unwrap();
        svc.thread_set_title(&thread_id, "мій тред").await.unwrap();
        svc.thread_set_item_completed(&thread_id, 2, true).await.unwrap();
        svc.thread_set_item_answer(&thread_id, 2, "так").await.unwrap();

        // reload from the store: the whole payload round-trips as one write
        svc.refresh().await.unwrap();
        let thread = svc.visible()[0].as_thread().unwrap().clone();
        let payload = thread.payload.unwrap();
        assert_eq!(payload.title.as_deref(), Some("мій тред"));
        assert_eq!(payload.items.len(), 3);
        assert!(payload.items[2].is_task);
        assert!(payload.items[2].completed);
        assert!(payload.items[2].is_question);
        assert_eq!(payload.items[2].answer.as_deref(), Some("так"));

        // editing away the task/question nature resets the derived fields
        svc.thread_edit_item(&thread_id, 2, "третя").await.unwrap();
        let thread = svc.visible()[0].as_thread().unwrap().clone();
        let item = &thread.payload.unwrap().items[2];
        assert!(!item.is_task && !item.is_question);
        assert!(!item.completed);
        assert_eq!(item.answer, None);
    }

    #[tokio::test]
    async fn test_refresh_retries_orphaned_source_cleanup() {
        let db = backend();
        // a source row that a failed thread-creation delete left behind
        let orphan = db
            .insert_note(USER, new_note("orphan", "2026-08-04T10:00:00.000Z"))
            .await
            .unwrap();
        let payload = ThreadPayload {
            version: 1,
            created_at: "2026-08-05T10:00:00.000Z".into(),
            title: None,
            items: vec![ThreadItem {
                id: Some(orphan.clone()),
                text: "orphan".into(),
                date: "2026-08-04T10:00:00.000Z".into(),
                is_task: false,
                completed: false,
                is_question: false,
                answer: None,
            }],
        };
        db.insert_note(
            USER,
            NewNote {
                text: new_thread_text(1754300000000),
                date: "2026-08-05T10:00:00.000Z".into(),
                is_task: false,
                completed: false,
                is_question: false,
                answer: Some(encode_payload(&payload)),
            },
        )
        .await
        .unwrap();

        let mut svc = service(db);
        svc.refresh().await.unwrap();

        // the orphan is hidden from the working set and gone from the store
        assert_eq!(svc.visible().len(), 1);
        assert!(matches!(svc.visible()[0], Record::Thread(_)));
        svc.refresh().await.unwrap();
        assert_eq!(svc.visible().len(), 1);
    }

    #[tokio::test]
    async fn test_review_marker_upsert_is_idempotent() {
        let mut svc = service(backend());
        svc.create_note("[] старе завдання").await.unwrap();

        let now = Local::now();
        svc.mark_review_done(now).await.unwrap();
        svc.mark_review_done(now).await.unwrap();

        // markers never show in the feed
        svc.refresh().await.unwrap();
        assert_eq!(svc.visible().len(), 1);
        assert!(svc.flags().is_review_done(&dumka_core::today_key(now)));

        // done banner replaces the pending one after the cutoff
        if let Some(banner) = svc.review_banner(now) {
            assert!(matches!(banner, ReviewBanner::Done { .. }));
        }
    }

    #[tokio::test]
    async fn test_reorder_day_persists_only_changes() {
        let db = backend();
        let a = db
            .insert_note(USER, new_note("a", "2026-08-05T07:00:00.000Z"))
            .await
            .unwrap();
        let b = db
            .insert_note(USER, new_note("b", "2026-08-05T08:00:00.000Z"))
            .await
            .unwrap();

        let mut svc = service(db);
        svc.refresh().await.unwrap();

        let ordered = vec![b.clone(), a.clone()];
        svc.reorder_day(&ordered, &b).await.unwrap();
        assert!(svc.flags().is_note_moved(&b));

        let day = svc.day_note_ids("2026-08-05");
        assert_eq!(day, vec![b.clone(), a.clone()]);

        // clearing the only moved note resets the whole day
        svc.clear_position(&b).await.unwrap();
        let notes: Vec<_> = svc
            .visible()
            .iter()
            .filter_map(Record::as_note)
            .collect();
        assert!(notes.iter().all(|n| n.position.is_none()));
        assert_eq!(svc.day_note_ids("2026-08-05"), vec![a, b]);
    }
}
