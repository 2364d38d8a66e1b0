use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "uniscan.sqlite3";

pub const COLLECTION_USERS: &str = "users";
pub const COLLECTION_PROFESSORS: &str = "professors";
pub const COLLECTION_COURSES: &str = "courses";
pub const COLLECTION_SCHEDULE: &str = "schedule";
pub const COLLECTIONS: [&str; 4] = [
    COLLECTION_USERS,
    COLLECTION_PROFESSORS,
    COLLECTION_COURSES,
    COLLECTION_SCHEDULE,
];

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            role TEXT NOT NULL,
            full_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            student_number TEXT UNIQUE,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS professors(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT,
            department TEXT
        )",
        [],
    )?;

    // Professor lists are JSON arrays of tagged instructor references (or null).
    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            course_type TEXT NOT NULL,
            academic_hours INTEGER NOT NULL,
            weeks INTEGER NOT NULL,
            theory_sections INTEGER NOT NULL,
            practical_sections INTEGER NOT NULL,
            theory_professors TEXT NOT NULL DEFAULT '[]',
            practical_professors TEXT NOT NULL DEFAULT '[]',
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedule(
            id TEXT PRIMARY KEY,
            section_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            section_number INTEGER NOT NULL,
            day TEXT NOT NULL,
            week INTEGER NOT NULL,
            start_slot INTEGER NOT NULL,
            duration_minutes INTEGER NOT NULL,
            start_minutes INTEGER NOT NULL,
            end_minutes INTEGER NOT NULL,
            instructor TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    ensure_schedule_color(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedule_week_day ON schedule(week, day)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedule_course ON schedule(course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_sessions(
            id TEXT PRIMARY KEY,
            placement_id TEXT NOT NULL,
            token TEXT NOT NULL,
            opened_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            closed_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_sessions_placement ON attendance_sessions(placement_id)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_records(
            session_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            checked_in_at TEXT NOT NULL,
            PRIMARY KEY(session_id, student_id),
            FOREIGN KEY(session_id) REFERENCES attendance_sessions(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS collection_revisions(
            collection TEXT PRIMARY KEY,
            revision INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

// Workspaces created before placements carried a display color.
fn ensure_schedule_color(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "schedule", "color")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE schedule ADD COLUMN color TEXT NOT NULL DEFAULT '#4f46e5'",
        [],
    )?;
    conn.execute(
        "UPDATE schedule SET color = '#059669' WHERE kind = 'practical'",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt
        .query_map([], |r| r.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|n| n == column))
}

/// Decoding error for a text column holding a value outside its enum.
pub fn unknown_text(idx: usize, what: &str, raw: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("unknown {}: {:?}", what, raw).into(),
    )
}

pub fn bump_revision(conn: &Connection, collection: &str) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO collection_revisions(collection, revision) VALUES(?, 1)
         ON CONFLICT(collection) DO UPDATE SET revision = revision + 1",
        [collection],
    )?;
    revision(conn, collection)
}

pub fn revision(conn: &Connection, collection: &str) -> anyhow::Result<i64> {
    let rev: Option<i64> = conn
        .query_row(
            "SELECT revision FROM collection_revisions WHERE collection = ?",
            [collection],
            |r| r.get(0),
        )
        .optional()?;
    Ok(rev.unwrap_or(0))
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}
