use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::timegrid::{self, Weekday};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match db::open_db(&path) {
        Ok(conn) => {
            tracing::info!(workspace = %path.display(), "workspace opened");
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => {
            tracing::error!(workspace = %path.display(), error = %e, "workspace open failed");
            err(&req.id, "db_open_failed", format!("{e:?}"), None)
        }
    }
}

/// Static description of the term grid so clients never hardcode it.
fn handle_grid_describe(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let slots: Vec<serde_json::Value> = (0..timegrid::SLOT_COUNT)
        .map(|slot| {
            json!({
                "slot": slot,
                "startMinutes": timegrid::minutes_from_slot(slot),
                "label": timegrid::slot_to_clock_time(slot),
            })
        })
        .collect();
    let days: Vec<serde_json::Value> = Weekday::ALL
        .iter()
        .map(|d| json!({ "id": d.as_str(), "label": d.label() }))
        .collect();
    ok(
        &req.id,
        json!({
            "slotMinutes": timegrid::SLOT_MINUTES,
            "dayStartMinutes": timegrid::DAY_START_MINUTES,
            "dayEndMinutes": timegrid::DAY_END_MINUTES,
            "maxWeeks": timegrid::MAX_WEEKS,
            "slots": slots,
            "days": days,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "grid.describe" => Some(handle_grid_describe(state, req)),
        _ => None,
    }
}
