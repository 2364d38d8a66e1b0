use serde::{Deserialize, Serialize};

pub const SLOT_MINUTES: i64 = 30;
/// 08:00 expressed as minutes of day.
pub const DAY_START_MINUTES: i64 = 8 * 60;
/// The grid stops at 16:30; no slot starts there.
pub const DAY_END_MINUTES: i64 = 16 * 60 + 30;
pub const SLOT_COUNT: i64 = (DAY_END_MINUTES - DAY_START_MINUTES) / SLOT_MINUTES;
pub const LAST_SLOT: i64 = SLOT_COUNT - 1;
pub const MAX_WEEKS: i64 = 15;
/// Longest block a placement may cover: the whole grid day.
pub const MAX_DURATION_MINUTES: i64 = DAY_END_MINUTES - DAY_START_MINUTES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Weekday {
    pub const ALL: [Weekday; 5] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monday" | "mon" => Some(Self::Monday),
            "tuesday" | "tue" => Some(Self::Tuesday),
            "wednesday" | "wed" => Some(Self::Wednesday),
            "thursday" | "thu" => Some(Self::Thursday),
            "friday" | "fri" => Some(Self::Friday),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
        }
    }

    pub fn index(self) -> i64 {
        match self {
            Self::Monday => 0,
            Self::Tuesday => 1,
            Self::Wednesday => 2,
            Self::Thursday => 3,
            Self::Friday => 4,
        }
    }
}

pub fn is_valid_slot(slot: i64) -> bool {
    (0..=LAST_SLOT).contains(&slot)
}

pub fn is_valid_week(week: i64) -> bool {
    (1..=MAX_WEEKS).contains(&week)
}

pub fn minutes_from_slot(slot: i64) -> i64 {
    DAY_START_MINUTES + SLOT_MINUTES * slot
}

pub fn minutes_to_clock_time(minutes: i64) -> String {
    let hour24 = minutes.div_euclid(60).rem_euclid(24);
    let minute = minutes.rem_euclid(60);
    let suffix = if hour24 >= 12 { "PM" } else { "AM" };
    let hour12 = match hour24 % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:{:02} {}", hour12, minute, suffix)
}

pub fn slot_to_clock_time(slot: i64) -> String {
    minutes_to_clock_time(minutes_from_slot(slot))
}
