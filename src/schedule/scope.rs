use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::types::{Slot, SlotId};

/// Filter dimension of a clear request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum ScopeMode {
    All,
    Department(String),
    ClassLevel(String),
    Teacher(String),
}

impl ScopeMode {
    /// Builds a mode from the `mode`/`value` pair sent by clients.
    ///
    /// Accepts `all`, `department` (`dept`), `class_level` (`class`) and `teacher`.
    /// The value is matched exactly, so padded values are rejected rather than trimmed.
    pub fn from_parts(mode: &str, value: Option<&str>) -> Result<Self, String> {
        let value = value.filter(|v| !v.trim().is_empty());
        if let Some(v) = value {
            if v != v.trim() {
                return Err(format!("Clear value {:?} has leading or trailing whitespace", v));
            }
        }
        let required = |name: &str| {
            value
                .map(str::to_string)
                .ok_or_else(|| format!("A value is required when clearing by {}", name))
        };

        match mode.trim().to_lowercase().as_str() {
            "all" => Ok(ScopeMode::All),
            "department" | "dept" => required("department").map(ScopeMode::Department),
            "class_level" | "class" => required("class level").map(ScopeMode::ClassLevel),
            "teacher" => required("teacher").map(ScopeMode::Teacher),
            other => Err(format!("Unknown clear mode: {}", other)),
        }
    }

    /// Exact, case-sensitive match on the slot attribute the mode names
    pub fn matches(&self, slot: &Slot) -> bool {
        match self {
            ScopeMode::All => true,
            ScopeMode::Department(name) => slot.department_name == *name,
            ScopeMode::ClassLevel(level) => slot.class_level == *level,
            ScopeMode::Teacher(id) => slot.teacher_id.as_deref() == Some(id.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub term: String,
    pub mode: ScopeMode,
}

impl Scope {
    pub fn new(term: impl Into<String>, mode: ScopeMode) -> Self {
        Self {
            term: term.into(),
            mode,
        }
    }

    pub fn matches(&self, slot: &Slot) -> bool {
        slot.term == self.term && self.mode.matches(slot)
    }
}

/// Ids of the slots a clear request covers
pub fn resolve<'a>(scope: &Scope, slots: impl IntoIterator<Item = &'a Slot>) -> BTreeSet<SlotId> {
    slots
        .into_iter()
        .filter(|slot| scope.matches(slot))
        .map(|slot| slot.id)
        .collect()
}
