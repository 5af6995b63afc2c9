//! Embedded schema migrations for the local SQLite backend.
//!
//! Migrations are versioned and run automatically on first database access.
//! The schema version is tracked in the `_dumka_meta` table. Columns mirror
//! the hosted `notes` and `invites` tables exactly.

/// Current schema version. Increment when adding new migrations.
pub const SCHEMA_VERSION: i64 = 1;

/// A database migration with version number and SQL statements.
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub statements: &'static [&'static str],
}

/// All migrations in order. Each migration should be idempotent where possible.
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    statements: &[
        "CREATE TABLE IF NOT EXISTS _dumka_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS notes (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            text TEXT NOT NULL,
            date TEXT NOT NULL,
            is_task INTEGER NOT NULL DEFAULT 0,
            completed INTEGER NOT NULL DEFAULT 0,
            is_question INTEGER NOT NULL DEFAULT 0,
            answer TEXT,
            position INTEGER
        )",
        "CREATE TABLE IF NOT EXISTS invites (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            created_by TEXT NOT NULL,
            used_at TEXT,
            used_by TEXT
        )",
        "CREATE INDEX IF NOT EXISTS idx_notes_user_date ON notes(user_id, date)",
        "CREATE INDEX IF NOT EXISTS idx_invites_created_at ON invites(created_at)",
    ],
}];

/// Get migrations that need to be applied given the current version.
pub fn get_pending_migrations(current_version: i64) -> Vec<&'static Migration> {
    MIGRATIONS
        .iter()
        .filter(|m| m.version > current_version)
        .collect()
}
