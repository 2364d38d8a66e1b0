//! Row access for the `users`, `professors` and `courses` collections.

use anyhow::Context;
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::catalog::{self, Course, CourseType, InstructorRef, Professor, ProfessorDirectory};
use crate::db;
use crate::error::ScheduleError;
use crate::schedule::{self, EditPolicy};
use crate::store::{self, ScheduleStore, SqliteScheduleStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Student,
    Professor,
    SubAdmin,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "student" => Some(Self::Student),
            "professor" => Some(Self::Professor),
            "subAdmin" | "sub-admin" | "subadmin" => Some(Self::SubAdmin),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Professor => "professor",
            Self::SubAdmin => "subAdmin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub role: Role,
    pub full_name: String,
    pub email: String,
    pub student_number: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub role: Role,
    pub full_name: String,
    pub email: String,
    pub student_number: Option<String>,
    pub department: Option<String>,
}

fn user_from_row(r: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = r.get(1)?;
    Ok(User {
        id: r.get(0)?,
        role: Role::parse(&role).ok_or_else(|| db::unknown_text(1, "role", &role))?,
        full_name: r.get(2)?,
        email: r.get(3)?,
        student_number: r.get(4)?,
        created_at: r.get(5)?,
    })
}

pub fn list_users(conn: &Connection, role: Option<Role>) -> anyhow::Result<Vec<User>> {
    let mut stmt = conn.prepare(
        "SELECT id, role, full_name, email, student_number, created_at
         FROM users
         WHERE (?1 IS NULL OR role = ?1)
         ORDER BY full_name, id",
    )?;
    let rows = stmt
        .query_map([role.map(Role::as_str)], user_from_row)?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to list users")?;
    Ok(rows)
}

pub fn get_user(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    conn.query_row(
        "SELECT id, role, full_name, email, student_number, created_at FROM users WHERE id = ?",
        [id],
        user_from_row,
    )
    .optional()
    .context("failed to read user")
}

pub fn register_user(conn: &Connection, input: NewUser) -> Result<User, ScheduleError> {
    let full_name = input.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(ScheduleError::validation("fullName must not be empty"));
    }
    let email = input.email.trim().to_ascii_lowercase();
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(ScheduleError::validation("email is not valid"));
    }
    let student_number = input
        .student_number
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    match input.role {
        Role::Student if student_number.is_none() => {
            return Err(ScheduleError::validation(
                "studentNumber is required for students",
            ))
        }
        Role::Student => {}
        _ if student_number.is_some() => {
            return Err(ScheduleError::validation(
                "studentNumber is only valid for students",
            ))
        }
        _ => {}
    }

    let taken: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE email = ?", [&email], |r| r.get(0))
        .optional()?;
    if taken.is_some() {
        return Err(ScheduleError::validation("email is already registered"));
    }
    if let Some(no) = &student_number {
        let taken: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM users WHERE student_number = ?",
                [no],
                |r| r.get(0),
            )
            .optional()?;
        if taken.is_some() {
            return Err(ScheduleError::validation(
                "studentNumber is already registered",
            ));
        }
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        role: input.role,
        full_name,
        email,
        student_number,
        created_at: Utc::now().to_rfc3339(),
    };

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO users(id, role, full_name, email, student_number, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &user.id,
            user.role.as_str(),
            &user.full_name,
            &user.email,
            &user.student_number,
            &user.created_at,
        ),
    )?;
    db::bump_revision(&tx, db::COLLECTION_USERS)?;
    if user.role == Role::Professor {
        let department = input
            .department
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        tx.execute(
            "INSERT INTO professors(id, name, email, department) VALUES(?, ?, ?, ?)",
            (&user.id, &user.full_name, &user.email, department),
        )?;
        db::bump_revision(&tx, db::COLLECTION_PROFESSORS)?;
    }
    tx.commit()?;
    Ok(user)
}

pub fn delete_user(conn: &Connection, id: &str) -> Result<User, ScheduleError> {
    let Some(user) = get_user(conn, id)? else {
        return Err(ScheduleError::not_found("user", id));
    };
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM attendance_records WHERE student_id = ?",
        [id],
    )?;
    tx.execute("DELETE FROM users WHERE id = ?", [id])?;
    db::bump_revision(&tx, db::COLLECTION_USERS)?;
    if tx.execute("DELETE FROM professors WHERE id = ?", [id])? > 0 {
        db::bump_revision(&tx, db::COLLECTION_PROFESSORS)?;
    }
    tx.commit()?;
    Ok(user)
}

pub fn list_professors(conn: &Connection) -> anyhow::Result<Vec<Professor>> {
    let mut stmt =
        conn.prepare("SELECT id, name, email, department FROM professors ORDER BY name, id")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Professor {
                id: r.get(0)?,
                name: r.get(1)?,
                email: r.get(2)?,
                department: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to list professors")?;
    Ok(rows)
}

pub fn professor_directory(conn: &Connection) -> anyhow::Result<ProfessorDirectory> {
    Ok(ProfessorDirectory::new(&list_professors(conn)?))
}

fn parse_professor_list(idx: usize, raw: &str) -> rusqlite::Result<Vec<Option<InstructorRef>>> {
    serde_json::from_str::<Vec<Option<InstructorRef>>>(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn course_from_row(r: &Row<'_>) -> rusqlite::Result<Course> {
    let course_type: String = r.get(3)?;
    let theory: String = r.get(8)?;
    let practical: String = r.get(9)?;
    Ok(Course {
        id: r.get(0)?,
        code: r.get(1)?,
        name: r.get(2)?,
        course_type: CourseType::parse(&course_type)
            .ok_or_else(|| db::unknown_text(3, "course type", &course_type))?,
        academic_hours: r.get(4)?,
        weeks: r.get(5)?,
        theory_sections: r.get(6)?,
        practical_sections: r.get(7)?,
        theory_professors: parse_professor_list(8, &theory)?,
        practical_professors: parse_professor_list(9, &practical)?,
    })
}

const COURSE_COLUMNS: &str = "id, code, name, course_type, academic_hours, weeks,
     theory_sections, practical_sections, theory_professors, practical_professors";

pub fn list_courses(conn: &Connection) -> anyhow::Result<Vec<Course>> {
    let sql = format!(
        "SELECT {} FROM courses ORDER BY sort_order, id",
        COURSE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], course_from_row)?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to list courses")?;
    Ok(rows)
}

pub fn get_course(conn: &Connection, id: &str) -> anyhow::Result<Option<Course>> {
    let sql = format!("SELECT {} FROM courses WHERE id = ?", COURSE_COLUMNS);
    conn.query_row(&sql, [id], course_from_row)
        .optional()
        .context("failed to read course")
}

/// Course fields as sent by a client; professor entries are raw JSON.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseInput {
    pub code: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub course_type: Option<String>,
    pub academic_hours: Option<i64>,
    pub weeks: Option<i64>,
    pub theory_sections: Option<i64>,
    pub practical_sections: Option<i64>,
    pub theory_professors: Option<Vec<Value>>,
    pub practical_professors: Option<Vec<Value>>,
}

fn resolve_list(raw: &[Value], directory: &ProfessorDirectory) -> Vec<Option<InstructorRef>> {
    raw.iter()
        .map(|v| InstructorRef::from_raw(v, directory))
        .collect()
}

/// Applies `input` over `base` (or over an empty course when creating).
fn merge_course(
    base: Option<Course>,
    input: CourseInput,
    directory: &ProfessorDirectory,
) -> Result<Course, ScheduleError> {
    let mut course = match base {
        Some(c) => c,
        None => Course {
            id: Uuid::new_v4().to_string(),
            code: input
                .code
                .clone()
                .ok_or_else(|| ScheduleError::validation("missing code"))?,
            name: input
                .name
                .clone()
                .ok_or_else(|| ScheduleError::validation("missing name"))?,
            course_type: CourseType::Theory,
            academic_hours: 0,
            weeks: 0,
            theory_sections: 0,
            practical_sections: 0,
            theory_professors: Vec::new(),
            practical_professors: Vec::new(),
        },
    };
    if let Some(code) = input.code {
        course.code = code;
    }
    if let Some(name) = input.name {
        course.name = name;
    }
    if let Some(t) = input.course_type {
        course.course_type = CourseType::parse(&t).ok_or_else(|| {
            ScheduleError::validation("type must be one of: theory, practical, theory-practical")
        })?;
    }
    if let Some(v) = input.academic_hours {
        course.academic_hours = v;
    }
    if let Some(v) = input.weeks {
        course.weeks = v;
    }
    if let Some(v) = input.theory_sections {
        course.theory_sections = v;
    }
    if let Some(v) = input.practical_sections {
        course.practical_sections = v;
    }
    if let Some(list) = input.theory_professors {
        course.theory_professors = resolve_list(&list, directory);
    }
    if let Some(list) = input.practical_professors {
        course.practical_professors = resolve_list(&list, directory);
    }
    course.normalize()?;
    Ok(course)
}

fn ensure_code_free(conn: &Connection, code: &str, except_id: &str) -> Result<(), ScheduleError> {
    let taken: Option<String> = conn
        .query_row(
            "SELECT id FROM courses WHERE code = ? AND id <> ?",
            (code, except_id),
            |r| r.get(0),
        )
        .optional()?;
    if taken.is_some() {
        return Err(ScheduleError::validation(format!(
            "course code {} already exists",
            code
        )));
    }
    Ok(())
}

fn professors_json(list: &[Option<InstructorRef>]) -> anyhow::Result<String> {
    serde_json::to_string(list).context("failed to encode professor list")
}

pub fn create_course(conn: &Connection, input: CourseInput) -> Result<Course, ScheduleError> {
    let directory = professor_directory(conn)?;
    let course = merge_course(None, input, &directory)?;
    ensure_code_free(conn, &course.code, &course.id)?;

    let tx = conn.unchecked_transaction()?;
    let next_sort: i64 = tx.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM courses",
        [],
        |r| r.get(0),
    )?;
    tx.execute(
        "INSERT INTO courses(id, code, name, course_type, academic_hours, weeks,
            theory_sections, practical_sections, theory_professors, practical_professors, sort_order)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            course.id,
            course.code,
            course.name,
            course.course_type.as_str(),
            course.academic_hours,
            course.weeks,
            course.theory_sections,
            course.practical_sections,
            professors_json(&course.theory_professors)?,
            professors_json(&course.practical_professors)?,
            next_sort,
        ],
    )?;
    db::bump_revision(&tx, db::COLLECTION_COURSES)?;
    tx.commit()?;
    Ok(course)
}

/// A course edit together with what it did to that course's placements.
#[derive(Debug)]
pub struct CourseUpdate {
    pub course: Course,
    pub removed_placements: usize,
    pub refreshed_placements: usize,
}

/// Updates a course and makes its placements follow the rebuilt sections in
/// the same transaction. Placements of vanished sections are deleted with
/// their attendance; the rest take the section's duration and instructor.
pub fn update_course(
    conn: &Connection,
    id: &str,
    patch: CourseInput,
    policy: &EditPolicy,
) -> Result<CourseUpdate, ScheduleError> {
    let Some(existing) = get_course(conn, id)? else {
        return Err(ScheduleError::not_found("course", id));
    };
    let directory = professor_directory(conn)?;
    let course = merge_course(Some(existing), patch, &directory)?;
    ensure_code_free(conn, &course.code, &course.id)?;

    let placements = SqliteScheduleStore::new(conn).load_placements()?;
    let sections = catalog::build_sections(std::slice::from_ref(&course));
    let plan = schedule::reconcile_course(&placements, &course.id, &sections, policy)?;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE courses SET code = ?, name = ?, course_type = ?, academic_hours = ?, weeks = ?,
            theory_sections = ?, practical_sections = ?, theory_professors = ?, practical_professors = ?
         WHERE id = ?",
        rusqlite::params![
            course.code,
            course.name,
            course.course_type.as_str(),
            course.academic_hours,
            course.weeks,
            course.theory_sections,
            course.practical_sections,
            professors_json(&course.theory_professors)?,
            professors_json(&course.practical_professors)?,
            course.id,
        ],
    )?;
    db::bump_revision(&tx, db::COLLECTION_COURSES)?;
    for placement_id in &plan.removed {
        store::delete_placement_row(&tx, placement_id)?;
    }
    for placement in &plan.refreshed {
        store::write_placement_row(&tx, placement)?;
    }
    if !plan.is_empty() {
        db::bump_revision(&tx, db::COLLECTION_SCHEDULE)?;
    }
    tx.commit()?;

    if !plan.is_empty() {
        tracing::info!(
            course = %course.id,
            removed = plan.removed.len(),
            refreshed = plan.refreshed.len(),
            "placements follow course edit"
        );
    }
    Ok(CourseUpdate {
        course,
        removed_placements: plan.removed.len(),
        refreshed_placements: plan.refreshed.len(),
    })
}

/// Deletes a course together with its placements. Returns the placement count removed.
pub fn delete_course(conn: &Connection, id: &str) -> Result<usize, ScheduleError> {
    if get_course(conn, id)?.is_none() {
        return Err(ScheduleError::not_found("course", id));
    }
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM attendance_records WHERE session_id IN (
           SELECT s.id FROM attendance_sessions s
           JOIN schedule p ON p.id = s.placement_id
           WHERE p.course_id = ?
         )",
        [id],
    )?;
    tx.execute(
        "DELETE FROM attendance_sessions WHERE placement_id IN (
           SELECT id FROM schedule WHERE course_id = ?
         )",
        [id],
    )?;
    let removed = tx.execute("DELETE FROM schedule WHERE course_id = ?", [id])?;
    if removed > 0 {
        db::bump_revision(&tx, db::COLLECTION_SCHEDULE)?;
    }
    tx.execute("DELETE FROM courses WHERE id = ?", [id])?;
    db::bump_revision(&tx, db::COLLECTION_COURSES)?;
    tx.commit()?;
    Ok(removed)
}
