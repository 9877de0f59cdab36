use serde::{Deserialize, Serialize};

use crate::schedule::{Day, GridKey, Scope, ScopeMode, SlotId, TOTAL_PERIODS};

/// Manual placement of one subject lesson
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualAddRequest {
    pub term: String,
    pub day: Day,
    pub subject_id: String,
    pub class_level: String,
    pub start_period: u8,
    /// Overrides the subject's default teacher
    #[serde(default)]
    pub teacher_id: Option<String>,
    /// Overrides the subject's default room
    #[serde(default)]
    pub room_id: Option<String>,
    /// Taken from the class level's configuration when absent
    #[serde(default)]
    pub department: Option<String>,
}

/// Drag-and-drop relocation of a placed slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    pub id: SlotId,
    #[serde(alias = "newDay")]
    pub new_day: Day,
    #[serde(alias = "newStart")]
    pub new_start: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<SlotId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearRequest {
    pub term: String,
    pub mode: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub term: String,
    pub department: String,
    #[serde(alias = "classLevel")]
    pub class_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateAllRequest {
    pub term: String,
}

/// Selects one grid of a term: a class level or a teacher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridQuery {
    pub term: String,
    #[serde(default, alias = "classLevel")]
    pub class_level: Option<String>,
    #[serde(default)]
    pub teacher: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

fn require(value: &str, what: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", what));
    }
    Ok(())
}

/// Validates a manual add request
pub fn validate_manual_add(req: &ManualAddRequest) -> Result<(), String> {
    require(&req.term, "Term")?;
    require(&req.subject_id, "Subject")?;
    require(&req.class_level, "Class level")?;
    if req.start_period < 1 || req.start_period > TOTAL_PERIODS {
        return Err(format!(
            "Start period must be between 1 and {}, got {}",
            TOTAL_PERIODS, req.start_period
        ));
    }
    Ok(())
}

pub fn validate_bulk_delete(req: &BulkDeleteRequest) -> Result<(), String> {
    if req.ids.is_empty() {
        return Err("At least one slot id is required".to_string());
    }
    Ok(())
}

pub fn validate_generate(req: &GenerateRequest) -> Result<(), String> {
    require(&req.term, "Term")?;
    require(&req.class_level, "Class level")?;
    Ok(())
}

impl ClearRequest {
    /// Resolves the `mode`/`value` pair into a typed scope
    pub fn scope(&self) -> Result<Scope, String> {
        require(&self.term, "Term")?;
        let mode = ScopeMode::from_parts(&self.mode, self.value.as_deref())?;
        Ok(Scope::new(self.term.trim(), mode))
    }
}

impl GridQuery {
    pub fn grid_key(&self) -> Result<GridKey, String> {
        require(&self.term, "Term")?;
        let class_level = self.class_level.as_deref().map(str::trim).filter(|v| !v.is_empty());
        let teacher = self.teacher.as_deref().map(str::trim).filter(|v| !v.is_empty());
        match (class_level, teacher) {
            (Some(level), None) => Ok(GridKey::ClassLevel(level.to_string())),
            (None, Some(teacher)) => Ok(GridKey::Teacher(teacher.to_string())),
            (Some(_), Some(_)) => Err("Choose either a class level or a teacher, not both".to_string()),
            (None, None) => Err("A class level or a teacher is required".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual() -> ManualAddRequest {
        ManualAddRequest {
            term: "1/2569".to_string(),
            day: Day::Monday,
            subject_id: "S1".to_string(),
            class_level: "1/1".to_string(),
            start_period: 2,
            teacher_id: None,
            room_id: None,
            department: None,
        }
    }

    #[test]
    fn manual_add_requires_fields() {
        assert!(validate_manual_add(&manual()).is_ok());

        let mut req = manual();
        req.subject_id = " ".to_string();
        assert_eq!(validate_manual_add(&req), Err("Subject is required".to_string()));

        let mut req = manual();
        req.start_period = 11;
        assert!(validate_manual_add(&req).is_err());
    }

    #[test]
    fn move_accepts_camel_case_fields() {
        let req: MoveRequest =
            serde_json::from_str(r#"{"id": 4, "newDay": "tuesday", "newStart": 1}"#).unwrap();
        assert_eq!((req.id, req.new_day, req.new_start), (SlotId(4), Day::Tuesday, 1));
    }

    #[test]
    fn clear_request_builds_scope() {
        let req = ClearRequest {
            term: "1/2569".to_string(),
            mode: "class".to_string(),
            value: Some("1/1".to_string()),
        };
        assert_eq!(
            req.scope(),
            Ok(Scope::new("1/2569", ScopeMode::ClassLevel("1/1".to_string())))
        );

        let missing_value = ClearRequest {
            term: "1/2569".to_string(),
            mode: "teacher".to_string(),
            value: None,
        };
        assert!(missing_value.scope().is_err());
    }

    #[test]
    fn grid_query_needs_exactly_one_target() {
        let query = |class_level: Option<&str>, teacher: Option<&str>| GridQuery {
            term: "1/2569".to_string(),
            class_level: class_level.map(str::to_string),
            teacher: teacher.map(str::to_string),
        };
        assert_eq!(
            query(Some("1/1"), None).grid_key(),
            Ok(GridKey::ClassLevel("1/1".to_string()))
        );
        assert_eq!(
            query(None, Some("T01")).grid_key(),
            Ok(GridKey::Teacher("T01".to_string()))
        );
        assert!(query(Some("1/1"), Some("T01")).grid_key().is_err());
        assert!(query(None, Some("")).grid_key().is_err());
    }
}
