use crate::ipc::error::{err, fail, ok};
use crate::ipc::helpers::{db_conn, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::registry::{self, NewUser, Role};
use serde_json::json;

fn parse_role(req: &Request, raw: &str) -> Result<Role, serde_json::Value> {
    Role::parse(raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            "role must be one of: student, professor, subAdmin",
            None,
        )
    })
}

fn handle_users_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let role = match required_str(req, "role").and_then(|r| parse_role(req, &r)) {
        Ok(r) => r,
        Err(e) => return e,
    };
    let full_name = match required_str(req, "fullName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let input = NewUser {
        role,
        full_name,
        email,
        student_number: optional_str(req, "studentNumber"),
        department: optional_str(req, "department"),
    };
    match registry::register_user(conn, input) {
        Ok(user) => {
            tracing::info!(user = %user.id, role = user.role.as_str(), "user registered");
            ok(&req.id, json!({ "userId": user.id, "user": user }))
        }
        Err(e) => fail(&req.id, &e),
    }
}

fn handle_users_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "users": [] }));
    };
    let role = match optional_str(req, "role") {
        None => None,
        Some(r) => match parse_role(req, &r) {
            Ok(r) => Some(r),
            Err(e) => return e,
        },
    };
    match registry::list_users(conn, role) {
        Ok(users) => ok(&req.id, json!({ "users": users })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_users_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let user_id = match required_str(req, "userId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match registry::delete_user(conn, &user_id) {
        Ok(user) => {
            tracing::info!(user = %user.id, "user deleted");
            ok(&req.id, json!({ "ok": true, "userId": user.id }))
        }
        Err(e) => fail(&req.id, &e),
    }
}

fn handle_professors_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "professors": [] }));
    };
    match registry::list_professors(conn) {
        Ok(professors) => ok(&req.id, json!({ "professors": professors })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.register" => Some(handle_users_register(state, req)),
        "users.list" => Some(handle_users_list(state, req)),
        "users.delete" => Some(handle_users_delete(state, req)),
        "professors.list" => Some(handle_professors_list(state, req)),
        _ => None,
    }
}
