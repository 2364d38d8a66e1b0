use crate::catalog;
use crate::error::ScheduleError;
use crate::export;
use crate::ipc::error::{err, fail, ok};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{
    db_conn, optional_day, optional_i64, optional_str, required_day, required_i64, required_str,
};
use crate::ipc::types::{AppState, Request};
use crate::registry;
use crate::schedule::{Placement, PlacementEditor};
use crate::store::SqliteScheduleStore;
use rusqlite::Connection;
use serde_json::json;
use std::path::PathBuf;

fn with_editor<'c, T>(
    conn: &'c Connection,
    f: impl FnOnce(&mut PlacementEditor<'_, SqliteScheduleStore<'c>>) -> Result<T, ScheduleError>,
) -> Result<T, ScheduleError> {
    let policy = setup::load_edit_policy(conn)?;
    let store = SqliteScheduleStore::new(conn);
    let mut editor = PlacementEditor::load(&store, policy)?;
    f(&mut editor)
}

fn placement_json(p: &Placement, directory: &catalog::ProfessorDirectory) -> serde_json::Value {
    let mut v = json!(p);
    v["instructorName"] = json!(directory.display_name(p.instructor.as_ref()));
    v
}

fn handle_place(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let section_id = match required_str(req, "sectionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let day = match required_day(req, "day") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let week = match required_i64(req, "week") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let start_slot = match required_i64(req, "startSlot") {
        Ok(v) => v,
        Err(e) => return e,
    };

    // The catalog is derived from the current course set on every call.
    let courses = match registry::list_courses(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(section) = catalog::build_sections(&courses)
        .into_iter()
        .find(|s| s.id == section_id)
    else {
        return fail(&req.id, &ScheduleError::not_found("section", section_id));
    };

    match with_editor(conn, |editor| editor.place(&section, day, week, start_slot)) {
        Ok(p) => ok(&req.id, json!({ "placementId": p.id, "placement": p })),
        Err(e) => fail(&req.id, &e),
    }
}

fn handle_move(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let placement_id = match required_str(req, "placementId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let day = match required_day(req, "day") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let start_slot = match required_i64(req, "startSlot") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match with_editor(conn, |editor| editor.move_to(&placement_id, day, start_slot)) {
        Ok(p) => ok(&req.id, json!({ "placement": p })),
        Err(e) => fail(&req.id, &e),
    }
}

fn handle_resize(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let placement_id = match required_str(req, "placementId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let duration = match required_i64(req, "durationMinutes") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match with_editor(conn, |editor| editor.resize(&placement_id, duration)) {
        Ok(p) => ok(&req.id, json!({ "placement": p })),
        Err(e) => fail(&req.id, &e),
    }
}

fn handle_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let placement_id = match required_str(req, "placementId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match with_editor(conn, |editor| editor.remove(&placement_id)) {
        Ok(p) => ok(&req.id, json!({ "ok": true, "placementId": p.id })),
        Err(e) => fail(&req.id, &e),
    }
}

fn handle_clear_week(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let week = match required_i64(req, "week") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match with_editor(conn, |editor| editor.clear_week(week)) {
        Ok(removed) => ok(&req.id, json!({ "ok": true, "week": week, "removed": removed })),
        Err(e) => fail(&req.id, &e),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "placements": [] }));
    };
    let week = match optional_i64(req, "week") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let day = match optional_day(req, "day") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let directory = match registry::professor_directory(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    match with_editor(conn, |editor| Ok(editor.list(week, day))) {
        Ok(list) => {
            let rows: Vec<_> = list.iter().map(|p| placement_json(p, &directory)).collect();
            ok(&req.id, json!({ "placements": rows }))
        }
        Err(e) => fail(&req.id, &e),
    }
}

fn handle_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let week = match required_i64(req, "week") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let out_dir = match optional_str(req, "outDir").map(PathBuf::from) {
        Some(p) => p,
        None => match state.workspace.as_ref() {
            Some(ws) => ws.join("exports"),
            None => return err(&req.id, "no_workspace", "select a workspace first", None),
        },
    };

    let loaded = registry::list_courses(conn).and_then(|courses| {
        let professors = registry::list_professors(conn)?;
        let pretty = setup::load_pretty_export(conn)?;
        Ok((courses, professors, pretty))
    });
    let (courses, professors, pretty) = match loaded {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let placements = match with_editor(conn, |editor| Ok(editor.list(Some(week), None))) {
        Ok(v) => v,
        Err(e) => return fail(&req.id, &e),
    };

    let count = placements.len();
    let doc = export::build_export(courses, professors, placements, week);
    match export::write_export(&doc, &out_dir, pretty) {
        Ok(path) => {
            tracing::info!(week, path = %path.display(), sections = count, "schedule exported");
            ok(
                &req.id,
                json!({
                    "ok": true,
                    "path": path.to_string_lossy(),
                    "fileName": export::export_file_name(week),
                    "scheduledSections": count
                }),
            )
        }
        Err(e) => err(
            &req.id,
            "io_failed",
            e.to_string(),
            Some(json!({ "dir": out_dir.to_string_lossy() })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedule.place" => Some(handle_place(state, req)),
        "schedule.move" => Some(handle_move(state, req)),
        "schedule.resize" => Some(handle_resize(state, req)),
        "schedule.remove" => Some(handle_remove(state, req)),
        "schedule.clearWeek" => Some(handle_clear_week(state, req)),
        "schedule.list" => Some(handle_list(state, req)),
        "schedule.export" => Some(handle_export(state, req)),
        _ => None,
    }
}
