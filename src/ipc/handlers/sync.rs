use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::db_conn;
use crate::ipc::types::{AppState, Request};
use crate::registry;
use crate::store::{ScheduleStore, SqliteScheduleStore};
use rusqlite::Connection;
use serde_json::{json, Map, Value};

fn collection_snapshot(conn: &Connection, collection: &str) -> anyhow::Result<Value> {
    Ok(match collection {
        db::COLLECTION_USERS => json!(registry::list_users(conn, None)?),
        db::COLLECTION_PROFESSORS => json!(registry::list_professors(conn)?),
        db::COLLECTION_COURSES => json!(registry::list_courses(conn)?),
        _ => json!(SqliteScheduleStore::new(conn).load_placements()?),
    })
}

fn handle_revisions(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mut out = Map::new();
    for collection in db::COLLECTIONS {
        match db::revision(conn, collection) {
            Ok(rev) => {
                out.insert(collection.to_string(), json!(rev));
            }
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }
    ok(&req.id, Value::Object(out))
}

/// Pull-based subscription: full current set of every collection that moved
/// past the caller's last seen revision.
fn handle_changes(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let since = req.params.get("since");
    if since.is_some_and(|v| !v.is_object() && !v.is_null()) {
        return err(&req.id, "bad_params", "since must be an object", None);
    }

    let mut changed = Map::new();
    for collection in db::COLLECTIONS {
        let seen = since
            .and_then(|v| v.get(collection))
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        let current = match db::revision(conn, collection) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
        if current <= seen {
            continue;
        }
        match collection_snapshot(conn, collection) {
            Ok(items) => {
                changed.insert(
                    collection.to_string(),
                    json!({ "revision": current, "items": items }),
                );
            }
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }
    ok(&req.id, json!({ "changed": changed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sync.revisions" => Some(handle_revisions(state, req)),
        "sync.changes" => Some(handle_changes(state, req)),
        _ => None,
    }
}
