use crate::catalog::{self, Course, ProfessorDirectory};
use crate::ipc::error::{err, fail, ok};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use crate::registry::{self, CourseInput};
use serde_json::json;

fn course_json(course: &Course, directory: &ProfessorDirectory) -> serde_json::Value {
    let names = |list: &[Option<catalog::InstructorRef>]| -> Vec<String> {
        list.iter()
            .map(|p| directory.display_name(p.as_ref()))
            .collect()
    };
    let mut v = json!(course);
    v["theoryProfessorNames"] = json!(names(course.theory_professors.as_slice()));
    v["practicalProfessorNames"] = json!(names(course.practical_professors.as_slice()));
    v
}

fn parse_input(req: &Request, key: &str) -> Result<CourseInput, serde_json::Value> {
    let Some(raw) = req.params.get(key).filter(|v| v.is_object()) else {
        return Err(err(
            &req.id,
            "bad_params",
            format!("{} must be an object", key),
            None,
        ));
    };
    serde_json::from_value(raw.clone())
        .map_err(|e| err(&req.id, "bad_params", e.to_string(), None))
}

fn handle_courses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "courses": [] }));
    };
    let loaded = registry::list_courses(conn)
        .and_then(|courses| Ok((courses, registry::professor_directory(conn)?)));
    match loaded {
        Ok((courses, directory)) => {
            let rows: Vec<_> = courses.iter().map(|c| course_json(c, &directory)).collect();
            ok(&req.id, json!({ "courses": rows }))
        }
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_courses_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let input = match parse_input(req, "input") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match registry::create_course(conn, input) {
        Ok(course) => {
            tracing::info!(course = %course.id, code = %course.code, "course created");
            ok(&req.id, json!({ "courseId": course.id, "course": course }))
        }
        Err(e) => fail(&req.id, &e),
    }
}

fn handle_courses_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch = match parse_input(req, "patch") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let policy = match setup::load_edit_policy(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    match registry::update_course(conn, &course_id, patch, &policy) {
        Ok(update) => {
            tracing::info!(course = %update.course.id, "course updated");
            ok(
                &req.id,
                json!({
                    "course": update.course,
                    "removedPlacements": update.removed_placements,
                    "refreshedPlacements": update.refreshed_placements
                }),
            )
        }
        Err(e) => fail(&req.id, &e),
    }
}

fn handle_courses_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match registry::delete_course(conn, &course_id) {
        Ok(removed) => {
            tracing::info!(course = %course_id, placements = removed, "course deleted");
            ok(
                &req.id,
                json!({ "ok": true, "removedPlacements": removed }),
            )
        }
        Err(e) => fail(&req.id, &e),
    }
}

fn handle_sections_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "sections": [] }));
    };
    let loaded = registry::list_courses(conn)
        .and_then(|courses| Ok((courses, registry::professor_directory(conn)?)));
    let (courses, directory) = match loaded {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let sections: Vec<_> = catalog::build_sections(&courses)
        .into_iter()
        .map(|s| {
            let mut v = json!(s);
            v["instructorName"] = json!(directory.display_name(s.instructor.as_ref()));
            v
        })
        .collect();
    ok(&req.id, json!({ "sections": sections }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.list" => Some(handle_courses_list(state, req)),
        "courses.create" => Some(handle_courses_create(state, req)),
        "courses.update" => Some(handle_courses_update(state, req)),
        "courses.delete" => Some(handle_courses_delete(state, req)),
        "sections.list" => Some(handle_sections_list(state, req)),
        _ => None,
    }
}
