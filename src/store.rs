use anyhow::Context;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::catalog::{InstructorRef, SectionKind};
use crate::db;
use crate::schedule::Placement;
use crate::timegrid::Weekday;

/// Persistence boundary for placed sections (the `schedule` collection).
pub trait ScheduleStore {
    fn load_placements(&self) -> anyhow::Result<Vec<Placement>>;
    /// Insert or replace by id.
    fn upsert_placement(&self, placement: &Placement) -> anyhow::Result<()>;
    /// Returns false when no placement had that id.
    fn delete_placement(&self, id: &str) -> anyhow::Result<bool>;
    /// Removes every placement of `week` as one unit of work.
    fn delete_week(&self, week: i64) -> anyhow::Result<usize>;
}

pub struct SqliteScheduleStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteScheduleStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

const PLACEMENT_COLUMNS: &str = "id, section_id, course_id, kind, section_number, day, week,
     start_slot, duration_minutes, start_minutes, end_minutes, color, instructor, created_at";

fn placement_from_row(r: &Row<'_>) -> rusqlite::Result<Placement> {
    let kind: String = r.get(3)?;
    let day: String = r.get(5)?;
    let instructor: Option<String> = r.get(12)?;
    let instructor = instructor
        .map(|s| serde_json::from_str::<InstructorRef>(&s))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(12, Type::Text, Box::new(e)))?;
    Ok(Placement {
        id: r.get(0)?,
        section_id: r.get(1)?,
        course_id: r.get(2)?,
        kind: SectionKind::parse(&kind)
            .ok_or_else(|| db::unknown_text(3, "section kind", &kind))?,
        section_number: r.get(4)?,
        day: Weekday::parse(&day).ok_or_else(|| db::unknown_text(5, "weekday", &day))?,
        week: r.get(6)?,
        start_slot: r.get(7)?,
        duration_minutes: r.get(8)?,
        start_minutes: r.get(9)?,
        end_minutes: r.get(10)?,
        color: r.get(11)?,
        instructor,
        created_at: r.get(13)?,
    })
}

/// Inserts or updates one placement row. Runs in the caller's transaction.
pub(crate) fn write_placement_row(conn: &Connection, p: &Placement) -> anyhow::Result<()> {
    let instructor = p
        .instructor
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        "INSERT INTO schedule(id, section_id, course_id, kind, section_number, day, week,
            start_slot, duration_minutes, start_minutes, end_minutes, color, instructor, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            day = excluded.day,
            week = excluded.week,
            start_slot = excluded.start_slot,
            duration_minutes = excluded.duration_minutes,
            start_minutes = excluded.start_minutes,
            end_minutes = excluded.end_minutes,
            color = excluded.color,
            instructor = excluded.instructor",
        rusqlite::params![
            p.id,
            p.section_id,
            p.course_id,
            p.kind.as_str(),
            p.section_number,
            p.day.as_str(),
            p.week,
            p.start_slot,
            p.duration_minutes,
            p.start_minutes,
            p.end_minutes,
            p.color,
            instructor,
            p.created_at,
        ],
    )
    .context("failed to upsert placement")?;
    Ok(())
}

/// Deletes one placement with its attendance sessions and check-ins.
/// Runs in the caller's transaction.
pub(crate) fn delete_placement_row(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    conn.execute(
        "DELETE FROM attendance_records WHERE session_id IN (
           SELECT id FROM attendance_sessions WHERE placement_id = ?
         )",
        [id],
    )
    .context("failed to delete attendance records")?;
    conn.execute("DELETE FROM attendance_sessions WHERE placement_id = ?", [id])
        .context("failed to delete attendance sessions")?;
    let n = conn
        .execute("DELETE FROM schedule WHERE id = ?", [id])
        .context("failed to delete placement")?;
    Ok(n > 0)
}

fn delete_week_rows(conn: &Connection, week: i64) -> anyhow::Result<usize> {
    conn.execute(
        "DELETE FROM attendance_records WHERE session_id IN (
           SELECT s.id FROM attendance_sessions s
           JOIN schedule p ON p.id = s.placement_id
           WHERE p.week = ?
         )",
        [week],
    )
    .context("failed to delete attendance records")?;
    conn.execute(
        "DELETE FROM attendance_sessions WHERE placement_id IN (
           SELECT id FROM schedule WHERE week = ?
         )",
        [week],
    )
    .context("failed to delete attendance sessions")?;
    let n = conn
        .execute("DELETE FROM schedule WHERE week = ?", [week])
        .context("failed to clear week")?;
    Ok(n)
}

impl SqliteScheduleStore<'_> {
    pub fn get(&self, id: &str) -> anyhow::Result<Option<Placement>> {
        let sql = format!("SELECT {} FROM schedule WHERE id = ?", PLACEMENT_COLUMNS);
        self.conn
            .query_row(&sql, [id], placement_from_row)
            .optional()
            .context("failed to read placement")
    }
}

impl ScheduleStore for SqliteScheduleStore<'_> {
    fn load_placements(&self) -> anyhow::Result<Vec<Placement>> {
        let sql = format!(
            "SELECT {} FROM schedule ORDER BY week, day, start_minutes",
            PLACEMENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], placement_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("failed to load schedule")?;
        Ok(rows)
    }

    fn upsert_placement(&self, p: &Placement) -> anyhow::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        write_placement_row(&tx, p)?;
        db::bump_revision(&tx, db::COLLECTION_SCHEDULE)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_placement(&self, id: &str) -> anyhow::Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let removed = delete_placement_row(&tx, id)?;
        if removed {
            db::bump_revision(&tx, db::COLLECTION_SCHEDULE)?;
        }
        tx.commit()?;
        Ok(removed)
    }

    fn delete_week(&self, week: i64) -> anyhow::Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let n = delete_week_rows(&tx, week)?;
        if n > 0 {
            db::bump_revision(&tx, db::COLLECTION_SCHEDULE)?;
        }
        tx.commit()?;
        Ok(n)
    }
}

#[cfg(test)]
pub use memory::MemoryScheduleStore;
