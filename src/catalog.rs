//! Courses, instructor references and the derived section catalog.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::ScheduleError;

pub const PRACTICAL_DURATION_MINUTES: i64 = 120;
pub const MAX_ACADEMIC_HOURS: i64 = 4;
pub const MAX_COURSE_WEEKS: i64 = 15;
pub const MAX_SECTIONS: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourseType {
    #[serde(rename = "theory", alias = "theory-only")]
    Theory,
    #[serde(rename = "practical", alias = "practical-only")]
    Practical,
    #[serde(rename = "theory-practical")]
    TheoryPractical,
}

impl CourseType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "theory" | "theory-only" => Some(Self::Theory),
            "practical" | "practical-only" => Some(Self::Practical),
            "theory-practical" => Some(Self::TheoryPractical),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Theory => "theory",
            Self::Practical => "practical",
            Self::TheoryPractical => "theory-practical",
        }
    }
}

/// A persisted professor reference, normalized at the boundary.
///
/// Course records historically hold either a professor id or a free-form
/// name; both collapse into this type before anything else looks at them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum InstructorRef {
    Professor { id: String },
    Named { name: String },
}

impl InstructorRef {
    /// Accepts `"id-or-name"`, `{"id": ..}`, `{"name": ..}`, the tagged form
    /// and `null`. A bare string is an id only when the directory knows it.
    pub fn from_raw(raw: &Value, directory: &ProfessorDirectory) -> Option<Self> {
        match raw {
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    None
                } else if directory.contains(s) {
                    Some(Self::Professor { id: s.to_string() })
                } else {
                    Some(Self::Named {
                        name: s.to_string(),
                    })
                }
            }
            Value::Object(obj) => {
                let text = |key: &str| {
                    obj.get(key)
                        .and_then(|v| v.as_str())
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                };
                if let Some(id) = text("id") {
                    Some(Self::Professor { id })
                } else {
                    text("name").map(|name| Self::Named { name })
                }
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Professor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

/// Lookup table from professor id to display name.
#[derive(Debug, Clone, Default)]
pub struct ProfessorDirectory {
    names: HashMap<String, String>,
}

impl ProfessorDirectory {
    pub fn new(professors: &[Professor]) -> Self {
        Self {
            names: professors
                .iter()
                .map(|p| (p.id.clone(), p.name.clone()))
                .collect(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.names.contains_key(id)
    }

    pub fn display_name(&self, instructor: Option<&InstructorRef>) -> String {
        match instructor {
            None => "Unassigned".to_string(),
            Some(InstructorRef::Named { name }) => name.clone(),
            Some(InstructorRef::Professor { id }) => {
                self.names.get(id).cloned().unwrap_or_else(|| id.clone())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub course_type: CourseType,
    pub academic_hours: i64,
    pub weeks: i64,
    pub theory_sections: i64,
    pub practical_sections: i64,
    #[serde(default)]
    pub theory_professors: Vec<Option<InstructorRef>>,
    #[serde(default)]
    pub practical_professors: Vec<Option<InstructorRef>>,
}

impl Course {
    /// Enforces the declared section counts for the course type and sizes
    /// the professor lists to match them.
    pub fn normalize(&mut self) -> Result<(), ScheduleError> {
        self.code = self.code.trim().to_string();
        self.name = self.name.trim().to_string();
        if self.code.is_empty() {
            return Err(ScheduleError::validation("course code must not be empty"));
        }
        if self.name.is_empty() {
            return Err(ScheduleError::validation("course name must not be empty"));
        }
        if !(1..=MAX_ACADEMIC_HOURS).contains(&self.academic_hours) {
            return Err(ScheduleError::validation(format!(
                "academicHours must be in 1..={}",
                MAX_ACADEMIC_HOURS
            )));
        }
        if !(1..=MAX_COURSE_WEEKS).contains(&self.weeks) {
            return Err(ScheduleError::validation(format!(
                "weeks must be in 1..={}",
                MAX_COURSE_WEEKS
            )));
        }

        match self.course_type {
            CourseType::Theory => self.practical_sections = 0,
            CourseType::Practical => self.theory_sections = 0,
            CourseType::TheoryPractical => self.practical_sections = self.theory_sections * 2,
        }
        let (needs_theory, needs_practical) = match self.course_type {
            CourseType::Theory => (true, false),
            CourseType::Practical => (false, true),
            CourseType::TheoryPractical => (true, true),
        };
        if needs_theory && !(1..=MAX_SECTIONS).contains(&self.theory_sections) {
            return Err(ScheduleError::validation(format!(
                "theorySections must be in 1..={}",
                MAX_SECTIONS
            )));
        }
        if needs_practical && !(1..=MAX_SECTIONS * 2).contains(&self.practical_sections) {
            return Err(ScheduleError::validation(format!(
                "practicalSections must be in 1..={}",
                MAX_SECTIONS * 2
            )));
        }

        self.theory_professors
            .resize(self.theory_sections as usize, None);
        self.practical_professors
            .resize(self.practical_sections as usize, None);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Theory,
    Practical,
}

impl SectionKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "theory" => Some(Self::Theory),
            "practical" => Some(Self::Practical),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Theory => "theory",
            Self::Practical => "practical",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::Theory => "#4f46e5",
            Self::Practical => "#059669",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub course_id: String,
    pub course_code: String,
    pub course_name: String,
    pub kind: SectionKind,
    pub section_number: i64,
    pub duration_minutes: i64,
    pub instructor: Option<InstructorRef>,
}

pub fn section_id(course_id: &str, kind: SectionKind, section_number: i64) -> String {
    format!("{}-{}-{}", course_id, kind.as_str(), section_number)
}

fn emit_sections(
    out: &mut Vec<Section>,
    course: &Course,
    kind: SectionKind,
    count: i64,
    professors: &[Option<InstructorRef>],
    duration_minutes: i64,
) {
    // Courses that went through normalize always carry one entry per
    // section, so an empty list only shows up on a course built by hand.
    if count <= 0 || professors.is_empty() {
        return;
    }
    for idx in 0..count {
        let number = idx + 1;
        out.push(Section {
            id: section_id(&course.id, kind, number),
            course_id: course.id.clone(),
            course_code: course.code.clone(),
            course_name: course.name.clone(),
            kind,
            section_number: number,
            duration_minutes,
            instructor: professors.get(idx as usize).cloned().flatten(),
        });
    }
}

/// Derives the orderable sections of every course, theory before practical.
pub fn build_sections(courses: &[Course]) -> Vec<Section> {
    let mut out = Vec::new();
    for course in courses {
        emit_sections(
            &mut out,
            course,
            SectionKind::Theory,
            course.theory_sections,
            &course.theory_professors,
            course.academic_hours * 60,
        );
        emit_sections(
            &mut out,
            course,
            SectionKind::Practical,
            course.practical_sections,
            &course.practical_professors,
            PRACTICAL_DURATION_MINUTES,
        );
    }
    out
}
