use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup;
use crate::ipc::types::{AppState, Request};
use crate::registry::{self, Role};
use crate::store::SqliteScheduleStore;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

const QR_PREFIX: &str = "uniscan:attend";

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    fn db(e: impl std::fmt::Display) -> Self {
        Self {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Session {
    id: String,
    placement_id: String,
    token: String,
    opened_at: String,
    expires_at: String,
    closed_at: Option<String>,
}

impl Session {
    fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.expires_at)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.closed_at.is_none() && self.expires_at().is_some_and(|t| now < t)
    }

    fn qr_payload(&self) -> String {
        format!("{}:{}:{}", QR_PREFIX, self.id, self.token)
    }

    fn to_json(&self, now: DateTime<Utc>) -> serde_json::Value {
        json!({
            "sessionId": self.id,
            "placementId": self.placement_id,
            "openedAt": self.opened_at,
            "expiresAt": self.expires_at,
            "closedAt": self.closed_at,
            "open": self.is_open_at(now),
            "qrPayload": self.qr_payload(),
        })
    }
}

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: format!("missing {}", key),
            details: None,
        })
}

fn session_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: r.get(0)?,
        placement_id: r.get(1)?,
        token: r.get(2)?,
        opened_at: r.get(3)?,
        expires_at: r.get(4)?,
        closed_at: r.get(5)?,
    })
}

fn load_session(conn: &Connection, session_id: &str) -> Result<Session, HandlerErr> {
    conn.query_row(
        "SELECT id, placement_id, token, opened_at, expires_at, closed_at
         FROM attendance_sessions WHERE id = ?",
        [session_id],
        session_from_row,
    )
    .optional()
    .map_err(HandlerErr::db)?
    .ok_or_else(|| HandlerErr {
        code: "not_found",
        message: "attendance session not found".to_string(),
        details: Some(json!({ "sessionId": session_id })),
    })
}

fn attendance_open(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let placement_id = get_required_str(params, "placementId")?;
    let placement = SqliteScheduleStore::new(conn)
        .get(&placement_id)
        .map_err(HandlerErr::db)?;
    if placement.is_none() {
        return Err(HandlerErr {
            code: "not_found",
            message: "placement not found".to_string(),
            details: Some(json!({ "placementId": placement_id })),
        });
    }

    let now = Utc::now();
    let mut stmt = conn
        .prepare(
            "SELECT id, placement_id, token, opened_at, expires_at, closed_at
             FROM attendance_sessions
             WHERE placement_id = ? AND closed_at IS NULL
             ORDER BY opened_at DESC",
        )
        .map_err(HandlerErr::db)?;
    let existing = stmt
        .query_map([&placement_id], session_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::db)?;
    if let Some(open) = existing.into_iter().find(|s| s.is_open_at(now)) {
        let mut v = open.to_json(now);
        v["reused"] = json!(true);
        return Ok(v);
    }

    let ttl = setup::load_token_ttl_minutes(conn).map_err(HandlerErr::db)?;
    let session = Session {
        id: Uuid::new_v4().to_string(),
        placement_id,
        token: Uuid::new_v4().simple().to_string(),
        opened_at: now.to_rfc3339(),
        expires_at: (now + Duration::minutes(ttl)).to_rfc3339(),
        closed_at: None,
    };
    conn.execute(
        "INSERT INTO attendance_sessions(id, placement_id, token, opened_at, expires_at, closed_at)
         VALUES(?, ?, ?, ?, ?, NULL)",
        (
            &session.id,
            &session.placement_id,
            &session.token,
            &session.opened_at,
            &session.expires_at,
        ),
    )
    .map_err(|e| HandlerErr {
        code: "db_insert_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "attendance_sessions" })),
    })?;
    tracing::info!(session = %session.id, placement = %session.placement_id, ttl, "attendance session opened");

    let mut v = session.to_json(now);
    v["reused"] = json!(false);
    Ok(v)
}

fn attendance_check_in(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let session_id = get_required_str(params, "sessionId")?;
    let token = get_required_str(params, "token")?;
    let student_id = get_required_str(params, "studentId")?;

    let session = load_session(conn, &session_id)?;
    if session.token != token {
        tracing::warn!(session = %session_id, student = %student_id, "check-in with wrong token");
        return Err(HandlerErr {
            code: "bad_token",
            message: "token does not match this session".to_string(),
            details: None,
        });
    }
    let now = Utc::now();
    if !session.is_open_at(now) {
        return Err(HandlerErr {
            code: "session_closed",
            message: "attendance session is closed or expired".to_string(),
            details: Some(json!({ "expiresAt": session.expires_at, "closedAt": session.closed_at })),
        });
    }

    let student = registry::get_user(conn, &student_id).map_err(HandlerErr::db)?;
    match student {
        Some(u) if u.role == Role::Student => {}
        Some(_) => {
            return Err(HandlerErr {
                code: "bad_params",
                message: "only students can check in".to_string(),
                details: None,
            })
        }
        None => {
            return Err(HandlerErr {
                code: "not_found",
                message: "student not found".to_string(),
                details: Some(json!({ "studentId": student_id })),
            })
        }
    }

    let checked_in_at = now.to_rfc3339();
    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO attendance_records(session_id, student_id, checked_in_at)
             VALUES(?, ?, ?)",
            (&session_id, &student_id, &checked_in_at),
        )
        .map_err(|e| HandlerErr {
            code: "db_insert_failed",
            message: e.to_string(),
            details: Some(json!({ "table": "attendance_records" })),
        })?;
    if inserted > 0 {
        tracing::info!(session = %session_id, student = %student_id, "student checked in");
    }
    Ok(json!({
        "ok": true,
        "sessionId": session_id,
        "studentId": student_id,
        "alreadyCheckedIn": inserted == 0
    }))
}

fn attendance_close(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let session_id = get_required_str(params, "sessionId")?;
    let session = load_session(conn, &session_id)?;
    if session.closed_at.is_none() {
        conn.execute(
            "UPDATE attendance_sessions SET closed_at = ? WHERE id = ?",
            (Utc::now().to_rfc3339(), &session_id),
        )
        .map_err(|e| HandlerErr {
            code: "db_update_failed",
            message: e.to_string(),
            details: None,
        })?;
        tracing::info!(session = %session_id, "attendance session closed");
    }
    let session = load_session(conn, &session_id)?;
    Ok(session.to_json(Utc::now()))
}

fn attendance_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let session_id = get_required_str(params, "sessionId")?;
    let session = load_session(conn, &session_id)?;
    let mut stmt = conn
        .prepare(
            "SELECT r.student_id, u.full_name, u.student_number, r.checked_in_at
             FROM attendance_records r
             LEFT JOIN users u ON u.id = r.student_id
             WHERE r.session_id = ?
             ORDER BY r.checked_in_at, r.student_id",
        )
        .map_err(HandlerErr::db)?;
    let records = stmt
        .query_map([&session_id], |r| {
            let student_id: String = r.get(0)?;
            let name: Option<String> = r.get(1)?;
            let number: Option<String> = r.get(2)?;
            let at: String = r.get(3)?;
            Ok(json!({
                "studentId": student_id,
                "fullName": name,
                "studentNumber": number,
                "checkedInAt": at
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::db)?;
    Ok(json!({
        "session": session.to_json(Utc::now()),
        "count": records.len(),
        "records": records
    }))
}

fn dispatch(
    state: &mut AppState,
    req: &Request,
    f: fn(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.open" => Some(dispatch(state, req, attendance_open)),
        "attendance.checkIn" => Some(dispatch(state, req, attendance_check_in)),
        "attendance.close" => Some(dispatch(state, req, attendance_close)),
        "attendance.list" => Some(dispatch(state, req, attendance_list)),
        _ => None,
    }
}
