use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a placed slot, unique across all terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(pub u64);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// School day of the weekly timetable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Day {
    pub const COUNT: usize = 5;
    pub const ALL: [Day; Day::COUNT] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
    ];

    /// Row index of this day inside a grid
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Day {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Day::ALL
            .into_iter()
            .find(|d| d.name().to_lowercase() == lower || d.name()[..3].to_lowercase() == lower)
            .ok_or_else(|| format!("Unknown day: {}", s))
    }
}

/// One scheduled occurrence of a subject for a class level.
///
/// The slot covers `start_period..=start_period + duration - 1` on `day`.
/// `duration` is fixed when the slot is created; a move only changes
/// `day` and `start_period`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub term: String,
    pub day: Day,
    pub start_period: u8,
    pub duration: u8,
    pub subject_code: String,
    pub subject_name: String,
    pub teacher_id: Option<String>,
    pub teacher_name: Option<String>,
    pub room_id: Option<String>,
    pub room_name: Option<String>,
    pub class_level: String,
    pub department_name: String,
}

impl Slot {
    pub fn end_period(&self) -> u8 {
        self.start_period
            .saturating_add(self.duration)
            .saturating_sub(1)
    }

    pub fn periods(&self) -> RangeInclusive<u8> {
        self.start_period..=self.end_period()
    }

    /// Every grid this slot is placed in: its class level, and its teacher when assigned
    pub fn grid_keys(&self) -> Vec<GridKey> {
        let mut keys = vec![GridKey::ClassLevel(self.class_level.clone())];
        if let Some(teacher_id) = &self.teacher_id {
            keys.push(GridKey::Teacher(teacher_id.clone()));
        }
        keys
    }
}

/// Second half of a grid's identity; the first half is the term
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum GridKey {
    ClassLevel(String),
    Teacher(String),
}

impl GridKey {
    pub fn contains(&self, slot: &Slot) -> bool {
        match self {
            GridKey::ClassLevel(level) => slot.class_level == *level,
            GridKey::Teacher(id) => slot.teacher_id.as_deref() == Some(id.as_str()),
        }
    }
}

impl fmt::Display for GridKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridKey::ClassLevel(level) => write!(f, "class level {}", level),
            GridKey::Teacher(id) => write!(f, "teacher {}", id),
        }
    }
}

/// Periods no slot may ever occupy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservedKind {
    Lunch,
    Assembly,
}

/// What a single `(day, period)` cell of a grid holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellView<'a> {
    Empty,
    SlotStart(&'a Slot),
    /// Part of a multi-period slot whose start cell is earlier on the same day
    Continuation(SlotId),
    Reserved(ReservedKind),
}
