//! Placement editor for the weekly term table.
//!
//! The editor works on a snapshot of the `schedule` collection taken when it
//! is loaded. Every mutation is checked against that snapshot, written to the
//! store, and only then applied to the snapshot, so a failed write never
//! leaves the local view ahead of the store.
//!
//! Two daemons pointed at the same workspace are not coordinated: each one
//! checks conflicts against its own snapshot, so concurrent edits of the same
//! week can still produce overlapping placements.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::catalog::{InstructorRef, Section, SectionKind};
use crate::conflict::{first_conflict, Occupies, TimeBlock};
use crate::error::ScheduleError;
use crate::store::ScheduleStore;
use crate::timegrid::{self, Weekday, DAY_END_MINUTES, MAX_DURATION_MINUTES, SLOT_MINUTES};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub id: String,
    pub section_id: String,
    pub course_id: String,
    pub kind: SectionKind,
    pub section_number: i64,
    pub day: Weekday,
    pub week: i64,
    pub start_slot: i64,
    pub duration_minutes: i64,
    pub start_minutes: i64,
    pub end_minutes: i64,
    pub color: String,
    pub instructor: Option<InstructorRef>,
    pub created_at: String,
}

impl Occupies for Placement {
    fn block(&self) -> TimeBlock {
        TimeBlock {
            day: self.day,
            week: self.week,
            start: self.start_minutes,
            end: self.end_minutes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditPolicy {
    /// Re-run the conflict check on move and resize, not only on place.
    pub revalidate_on_edit: bool,
    /// Reject placements that run past the end of the grid.
    pub enforce_day_end: bool,
}

impl Default for EditPolicy {
    fn default() -> Self {
        Self {
            revalidate_on_edit: true,
            enforce_day_end: false,
        }
    }
}

pub struct PlacementEditor<'s, S: ScheduleStore> {
    store: &'s S,
    placements: Vec<Placement>,
    policy: EditPolicy,
}

fn validate_week(week: i64) -> Result<(), ScheduleError> {
    if !timegrid::is_valid_week(week) {
        return Err(ScheduleError::validation(format!(
            "week must be in 1..={}",
            timegrid::MAX_WEEKS
        )));
    }
    Ok(())
}

fn validate_duration(minutes: i64) -> Result<(), ScheduleError> {
    if !(1..=MAX_DURATION_MINUTES).contains(&minutes) {
        return Err(ScheduleError::validation(format!(
            "duration must be in 1..={} minutes",
            MAX_DURATION_MINUTES
        )));
    }
    Ok(())
}

/// Applies to place, move and resize whether or not edits are re-validated.
fn check_day_end(policy: &EditPolicy, block: &TimeBlock) -> Result<(), ScheduleError> {
    if policy.enforce_day_end && block.end > DAY_END_MINUTES {
        return Err(ScheduleError::validation(format!(
            "placement ends at {}, after the last slot ({})",
            timegrid::minutes_to_clock_time(block.end),
            timegrid::minutes_to_clock_time(DAY_END_MINUTES)
        )));
    }
    Ok(())
}

fn conflict_with(block: &TimeBlock, existing: &Placement) -> ScheduleError {
    tracing::warn!(
        blocking = %existing.id,
        day = block.day.as_str(),
        week = block.week,
        start = block.start,
        end = block.end,
        "placement rejected: conflict"
    );
    ScheduleError::Conflict {
        placement_id: existing.id.clone(),
        day: existing.day,
        week: existing.week,
        start: existing.start_minutes,
        end: existing.end_minutes,
    }
}

fn validate_slot(slot: i64) -> Result<(), ScheduleError> {
    if !timegrid::is_valid_slot(slot) {
        return Err(ScheduleError::validation(format!(
            "startSlot must be in 0..={}",
            timegrid::LAST_SLOT
        )));
    }
    Ok(())
}

impl<'s, S: ScheduleStore> PlacementEditor<'s, S> {
    pub fn load(store: &'s S, policy: EditPolicy) -> Result<Self, ScheduleError> {
        let placements = store.load_placements()?;
        Ok(Self {
            store,
            placements,
            policy,
        })
    }

    /// Placements ordered by week, weekday and start time.
    pub fn list(&self, week: Option<i64>, day: Option<Weekday>) -> Vec<Placement> {
        let mut out: Vec<Placement> = self
            .placements
            .iter()
            .filter(|p| week.map_or(true, |w| p.week == w))
            .filter(|p| day.map_or(true, |d| p.day == d))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            (a.week, a.day.index(), a.start_minutes, &a.id).cmp(&(
                b.week,
                b.day.index(),
                b.start_minutes,
                &b.id,
            ))
        });
        out
    }

    fn find(&self, id: &str) -> Result<usize, ScheduleError> {
        self.placements
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| ScheduleError::not_found("placement", id))
    }

    fn check_free(&self, block: &TimeBlock, exclude: Option<&str>) -> Result<(), ScheduleError> {
        let others = self
            .placements
            .iter()
            .filter(|p| exclude != Some(p.id.as_str()));
        match first_conflict(block, others) {
            Some(existing) => Err(conflict_with(block, existing)),
            None => Ok(()),
        }
    }

    fn next_id(&self, section_id: &str, day: Weekday, slot: i64) -> String {
        let mut ts = Utc::now().timestamp_millis();
        loop {
            let id = format!("{}-{}-{}-{}", section_id, day.as_str(), slot, ts);
            if !self.placements.iter().any(|p| p.id == id) {
                return id;
            }
            ts += 1;
        }
    }

    fn persist(&self, placement: &Placement) -> Result<(), ScheduleError> {
        self.store.upsert_placement(placement).map_err(|e| {
            tracing::error!(placement = %placement.id, error = %e, "store write failed");
            ScheduleError::Persistence(e)
        })
    }

    pub fn place(
        &mut self,
        section: &Section,
        day: Weekday,
        week: i64,
        start_slot: i64,
    ) -> Result<Placement, ScheduleError> {
        validate_week(week)?;
        validate_slot(start_slot)?;
        validate_duration(section.duration_minutes)?;

        let start = timegrid::minutes_from_slot(start_slot);
        let block = TimeBlock::new(day, week, start, section.duration_minutes);
        check_day_end(&self.policy, &block)?;
        self.check_free(&block, None)?;

        let placement = Placement {
            id: self.next_id(&section.id, day, start_slot),
            section_id: section.id.clone(),
            course_id: section.course_id.clone(),
            kind: section.kind,
            section_number: section.section_number,
            day,
            week,
            start_slot,
            duration_minutes: section.duration_minutes,
            start_minutes: block.start,
            end_minutes: block.end,
            color: section.kind.color().to_string(),
            instructor: section.instructor.clone(),
            created_at: Utc::now().to_rfc3339(),
        };
        self.persist(&placement)?;
        tracing::info!(
            placement = %placement.id,
            day = day.as_str(),
            week,
            start = placement.start_minutes,
            end = placement.end_minutes,
            "placement created"
        );
        self.placements.push(placement.clone());
        Ok(placement)
    }

    pub fn resize(
        &mut self,
        id: &str,
        new_duration_minutes: i64,
    ) -> Result<Placement, ScheduleError> {
        validate_duration(new_duration_minutes)?;
        if new_duration_minutes % SLOT_MINUTES != 0 {
            return Err(ScheduleError::validation(format!(
                "duration must be a multiple of {} minutes",
                SLOT_MINUTES
            )));
        }
        let idx = self.find(id)?;
        let mut updated = self.placements[idx].clone();
        updated.duration_minutes = new_duration_minutes;
        updated.end_minutes = updated.start_minutes + new_duration_minutes;
        check_day_end(&self.policy, &updated.block())?;
        if self.policy.revalidate_on_edit {
            self.check_free(&updated.block(), Some(id))?;
        }
        self.persist(&updated)?;
        tracing::info!(
            placement = %id,
            duration = new_duration_minutes,
            end = updated.end_minutes,
            "placement resized"
        );
        self.placements[idx] = updated.clone();
        Ok(updated)
    }

    pub fn move_to(
        &mut self,
        id: &str,
        day: Weekday,
        start_slot: i64,
    ) -> Result<Placement, ScheduleError> {
        validate_slot(start_slot)?;
        let idx = self.find(id)?;
        let mut updated = self.placements[idx].clone();
        updated.day = day;
        updated.start_slot = start_slot;
        updated.start_minutes = timegrid::minutes_from_slot(start_slot);
        updated.end_minutes = updated.start_minutes + updated.duration_minutes;
        check_day_end(&self.policy, &updated.block())?;
        if self.policy.revalidate_on_edit {
            self.check_free(&updated.block(), Some(id))?;
        }
        self.persist(&updated)?;
        tracing::info!(
            placement = %id,
            day = day.as_str(),
            start = updated.start_minutes,
            end = updated.end_minutes,
            "placement moved"
        );
        self.placements[idx] = updated.clone();
        Ok(updated)
    }

    pub fn remove(&mut self, id: &str) -> Result<Placement, ScheduleError> {
        let idx = self.find(id)?;
        let removed = self.store.delete_placement(id).map_err(|e| {
            tracing::error!(placement = %id, error = %e, "store delete failed");
            ScheduleError::Persistence(e)
        })?;
        if !removed {
            // Someone else deleted it since the snapshot was taken.
            tracing::debug!(placement = %id, "placement already gone from store");
        }
        tracing::info!(placement = %id, "placement removed");
        Ok(self.placements.remove(idx))
    }

    pub fn clear_week(&mut self, week: i64) -> Result<usize, ScheduleError> {
        validate_week(week)?;
        let removed = self.store.delete_week(week).map_err(|e| {
            tracing::error!(week, error = %e, "store clear week failed");
            ScheduleError::Persistence(e)
        })?;
        self.placements.retain(|p| p.week != week);
        tracing::info!(week, removed, "week cleared");
        Ok(removed)
    }
}

/// What a course edit does to the placements of that course.
#[derive(Debug, Default, PartialEq)]
pub struct CourseReconciliation {
    /// Placements whose section is no longer derived from the course.
    pub removed: Vec<String>,
    /// Surviving placements with the section's current duration and instructor.
    pub refreshed: Vec<Placement>,
}

impl CourseReconciliation {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.refreshed.is_empty()
    }
}

/// Plans how `placements` follow a course whose sections are now `sections`.
///
/// Refreshed placements keep their start and are checked like a resize: the
/// day end always, conflicts when edits are re-validated.
pub fn reconcile_course(
    placements: &[Placement],
    course_id: &str,
    sections: &[Section],
    policy: &EditPolicy,
) -> Result<CourseReconciliation, ScheduleError> {
    let mut plan = CourseReconciliation::default();
    for p in placements.iter().filter(|p| p.course_id == course_id) {
        let Some(section) = sections.iter().find(|s| s.id == p.section_id) else {
            plan.removed.push(p.id.clone());
            continue;
        };
        if p.duration_minutes == section.duration_minutes && p.instructor == section.instructor {
            continue;
        }
        let mut updated = p.clone();
        updated.duration_minutes = section.duration_minutes;
        updated.end_minutes = updated.start_minutes + section.duration_minutes;
        updated.instructor = section.instructor.clone();
        plan.refreshed.push(updated);
    }

    let staying: Vec<&Placement> = placements
        .iter()
        .filter(|p| !plan.removed.contains(&p.id))
        .map(|p| plan.refreshed.iter().find(|r| r.id == p.id).unwrap_or(p))
        .collect();
    for updated in &plan.refreshed {
        let block = updated.block();
        check_day_end(policy, &block)?;
        if !policy.revalidate_on_edit {
            continue;
        }
        let others = staying.iter().copied().filter(|p| p.id != updated.id);
        if let Some(existing) = first_conflict(&block, others) {
            return Err(conflict_with(&block, existing));
        }
    }
    Ok(plan)
}
