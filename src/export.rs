use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::catalog::{Course, Professor, ProfessorDirectory};
use crate::schedule::Placement;
use crate::timegrid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledSection {
    #[serde(flatten)]
    pub placement: Placement,
    pub instructor_name: String,
    pub start_time: String,
    pub end_time: String,
}

/// Contents of `term-table-week-<N>.json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermTableExport {
    pub courses: Vec<Course>,
    pub scheduled_sections: Vec<ScheduledSection>,
    pub professors: Vec<Professor>,
    pub generated_at: String,
    pub week_number: i64,
}

pub fn export_file_name(week: i64) -> String {
    format!("term-table-week-{}.json", week)
}

pub fn build_export(
    courses: Vec<Course>,
    professors: Vec<Professor>,
    week_placements: Vec<Placement>,
    week: i64,
) -> TermTableExport {
    let directory = ProfessorDirectory::new(&professors);
    let scheduled_sections = week_placements
        .into_iter()
        .map(|p| ScheduledSection {
            instructor_name: directory.display_name(p.instructor.as_ref()),
            start_time: timegrid::minutes_to_clock_time(p.start_minutes),
            end_time: timegrid::minutes_to_clock_time(p.end_minutes),
            placement: p,
        })
        .collect();
    TermTableExport {
        courses,
        scheduled_sections,
        professors,
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        week_number: week,
    }
}

pub fn write_export(doc: &TermTableExport, out_dir: &Path, pretty: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create directory {}", out_dir.to_string_lossy()))?;
    let path = out_dir.join(export_file_name(doc.week_number));
    let text = if pretty {
        serde_json::to_string_pretty(doc)
    } else {
        serde_json::to_string(doc)
    }
    .context("failed to serialize export")?;
    std::fs::write(&path, text)
        .with_context(|| format!("failed to write {}", path.to_string_lossy()))?;
    Ok(path)
}
