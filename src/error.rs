use serde_json::json;
use thiserror::Error;

use crate::timegrid::Weekday;

/// Errors raised by the scheduling and registry layers.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Malformed or missing input; nothing was changed.
    #[error("{message}")]
    Validation { message: String },

    /// Candidate placement overlaps an existing one.
    #[error("conflicts with {placement_id} on {} week {week} ({start}-{end})", .day.label())]
    Conflict {
        placement_id: String,
        day: Weekday,
        week: i64,
        start: i64,
        end: i64,
    },

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// The store rejected the write; local state was left as it was.
    #[error(transparent)]
    Persistence(#[from] anyhow::Error),
}

impl ScheduleError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            id: id.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "bad_params",
            Self::Conflict { .. } => "conflict",
            Self::NotFound { .. } => "not_found",
            Self::Persistence(_) => "db_update_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Conflict {
                placement_id,
                day,
                week,
                start,
                end,
            } => Some(json!({
                "placementId": placement_id,
                "day": day.as_str(),
                "week": week,
                "startMinutes": start,
                "endMinutes": end,
            })),
            Self::NotFound { what, id } => Some(json!({ "kind": what, "id": id })),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for ScheduleError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Persistence(e.into())
    }
}
