use crate::timegrid::Weekday;

/// A half-open `[start, end)` interval of minutes-of-day on one day of one week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBlock {
    pub day: Weekday,
    pub week: i64,
    pub start: i64,
    pub end: i64,
}

impl TimeBlock {
    pub fn new(day: Weekday, week: i64, start: i64, duration_minutes: i64) -> Self {
        Self {
            day,
            week,
            start,
            end: start + duration_minutes,
        }
    }
}

fn intrudes(candidate: &TimeBlock, existing: &TimeBlock) -> bool {
    let (cs, ce) = (candidate.start, candidate.end);
    let (es, ee) = (existing.start, existing.end);

    let starts_inside = cs >= es && cs < ee;
    let ends_inside = ce > es && ce < ee;
    let contains = es < ee && cs <= es && ce >= ee;
    // Only reachable for zero-length candidates; the cases above cover the rest.
    let contained = cs > es && ce < ee;

    starts_inside || ends_inside || contains || contained
}

/// Overlap test between two blocks. Touching blocks do not overlap.
pub fn overlaps(candidate: &TimeBlock, existing: &TimeBlock) -> bool {
    if candidate.day != existing.day || candidate.week != existing.week {
        return false;
    }
    intrudes(candidate, existing) || intrudes(existing, candidate)
}

/// Anything that occupies a block of the term table.
pub trait Occupies {
    fn block(&self) -> TimeBlock;
}

impl Occupies for TimeBlock {
    fn block(&self) -> TimeBlock {
        *self
    }
}

/// First entry of `existing` that overlaps `candidate`, in iteration order.
pub fn first_conflict<'a, T, I>(candidate: &TimeBlock, existing: I) -> Option<&'a T>
where
    T: Occupies + 'a,
    I: IntoIterator<Item = &'a T>,
{
    existing
        .into_iter()
        .find(|e| overlaps(candidate, &e.block()))
}

pub fn has_conflict<'a, T, I>(candidate: &TimeBlock, existing: I) -> bool
where
    T: Occupies + 'a,
    I: IntoIterator<Item = &'a T>,
{
    first_conflict(candidate, existing).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timegrid::minutes_from_slot;

    fn block(day: Weekday, week: i64, slot: i64, minutes: i64) -> TimeBlock {
        TimeBlock::new(day, week, minutes_from_slot(slot), minutes)
    }

    #[test]
    fn touching_blocks_do_not_conflict() {
        let a = block(Weekday::Monday, 1, 0, 60);
        let b = block(Weekday::Monday, 1, 2, 60);
        assert!(!overlaps(&a, &b));
        assert!(!overlaps(&b, &a));
    }

    #[test]
    fn overlap_cases() {
        let existing = block(Weekday::Monday, 1, 0, 120);
        // starts inside
        assert!(overlaps(&block(Weekday::Monday, 1, 1, 120), &existing));
        // ends inside
        assert!(overlaps(
            &TimeBlock::new(Weekday::Monday, 1, 450, 60),
            &existing
        ));
        // contains
        assert!(overlaps(
            &TimeBlock::new(Weekday::Monday, 1, 450, 240),
            &existing
        ));
        // identical
        assert!(overlaps(&existing, &existing));
    }

    #[test]
    fn other_day_or_week_never_conflicts() {
        let existing = block(Weekday::Monday, 1, 0, 120);
        assert!(!overlaps(&block(Weekday::Tuesday, 1, 0, 120), &existing));
        assert!(!overlaps(&block(Weekday::Monday, 2, 0, 120), &existing));
    }

    #[test]
    fn zero_length_candidate_inside_existing_conflicts() {
        let existing = block(Weekday::Friday, 3, 2, 90);
        let point = TimeBlock::new(Weekday::Friday, 3, minutes_from_slot(3), 0);
        assert!(overlaps(&point, &existing));
        let at_end = TimeBlock::new(Weekday::Friday, 3, existing.end, 0);
        assert!(!overlaps(&at_end, &existing));
        assert!(!overlaps(&existing, &at_end));
        assert!(overlaps(&existing, &point));
    }

    #[test]
    fn conflict_is_symmetric() {
        let mut blocks = Vec::new();
        for slot in 0..6 {
            for minutes in [30, 60, 120, 180] {
                blocks.push(block(Weekday::Wednesday, 4, slot, minutes));
            }
        }
        for a in &blocks {
            for b in &blocks {
                assert_eq!(overlaps(a, b), overlaps(b, a), "{:?} vs {:?}", a, b);
            }
        }
    }

    #[test]
    fn has_conflict_scans_all() {
        let existing = vec![
            block(Weekday::Monday, 1, 0, 60),
            block(Weekday::Monday, 1, 4, 60),
        ];
        assert!(has_conflict(&block(Weekday::Monday, 1, 5, 30), &existing));
        assert!(!has_conflict(&block(Weekday::Monday, 1, 2, 60), &existing));
        assert_eq!(
            first_conflict(&block(Weekday::Monday, 1, 3, 60), &existing),
            Some(&existing[1])
        );
    }
}
