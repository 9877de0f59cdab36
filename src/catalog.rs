use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use csv::{Reader, StringRecord};
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// Subject as configured in the curriculum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub code: String,
    pub name: String,
    pub theory_hours: u8,
    pub practice_hours: u8,
    pub default_teacher_id: Option<String>,
    pub default_room_id: Option<String>,
}

impl Subject {
    /// Periods one lesson of this subject occupies (theory + practice, at least one)
    pub fn duration(&self) -> u8 {
        self.theory_hours.saturating_add(self.practice_hours).max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassLevel {
    pub level: String,
    pub department: String,
}

#[async_trait]
pub trait SubjectCatalog: Send + Sync {
    async fn subject(&self, id: &str) -> StoreResult<Option<Subject>>;
    async fn teacher_name(&self, id: &str) -> StoreResult<Option<String>>;
    async fn room_name(&self, id: &str) -> StoreResult<Option<String>>;
    /// Every class level with its department, in configuration order
    async fn class_levels(&self) -> StoreResult<Vec<ClassLevel>>;
}

#[async_trait]
pub trait CurriculumRules: Send + Sync {
    /// Whether curriculum rules exist for exactly this level and department
    async fn has_rules(&self, class_level: &str, department: &str) -> StoreResult<bool>;
}

/// Catalog held in memory, optionally loaded from CSV files in the data directory:
/// `subjects.csv`, `teachers.csv`, `rooms.csv`, `classes.csv` and `curriculum.csv`.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    subjects: HashMap<String, Subject>,
    teachers: HashMap<String, String>,
    rooms: HashMap<String, String>,
    class_levels: Vec<ClassLevel>,
    rules: HashSet<(String, String)>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subjects.insert(subject.id.clone(), subject);
        self
    }

    pub fn with_teacher(mut self, id: &str, name: &str) -> Self {
        self.teachers.insert(id.to_string(), name.to_string());
        self
    }

    pub fn with_room(mut self, id: &str, name: &str) -> Self {
        self.rooms.insert(id.to_string(), name.to_string());
        self
    }

    pub fn with_class_level(mut self, level: &str, department: &str) -> Self {
        self.class_levels.push(ClassLevel {
            level: level.to_string(),
            department: department.to_string(),
        });
        self
    }

    pub fn with_rule(mut self, level: &str, department: &str) -> Self {
        self.rules.insert((level.to_string(), department.to_string()));
        self
    }

    /// Loads every catalog file found in `dir`. Missing files leave that part empty.
    pub fn load_csv<P: AsRef<Path>>(dir: P) -> StoreResult<Self> {
        let dir = dir.as_ref();
        let mut catalog = Catalog::new();

        for_each_record(&dir.join("subjects.csv"), |headers, record| {
            let get = field(headers, record);
            let id = get("id");
            if id.is_empty() {
                return;
            }
            let (theory_hours, practice_hours) =
                match (parse_hours(&get("theory_hours")), parse_hours(&get("practice_hours"))) {
                    (Some(theory), Some(practice)) => (theory, practice),
                    _ => {
                        log::warn!(
                            "Skipping subject {}: invalid hours (theory {:?}, practice {:?})",
                            id,
                            get("theory_hours"),
                            get("practice_hours")
                        );
                        return;
                    }
                };
            catalog.subjects.insert(
                id.clone(),
                Subject {
                    code: get("code"),
                    name: get("name"),
                    theory_hours,
                    practice_hours,
                    default_teacher_id: non_empty(get("teacher_id")),
                    default_room_id: non_empty(get("room_id")),
                    id,
                },
            );
        })?;

        for_each_record(&dir.join("teachers.csv"), |headers, record| {
            let get = field(headers, record);
            if let Some(id) = non_empty(get("id")) {
                catalog.teachers.insert(id, get("name"));
            }
        })?;

        for_each_record(&dir.join("rooms.csv"), |headers, record| {
            let get = field(headers, record);
            if let Some(id) = non_empty(get("id")) {
                catalog.rooms.insert(id, get("name"));
            }
        })?;

        for_each_record(&dir.join("classes.csv"), |headers, record| {
            let get = field(headers, record);
            if let Some(level) = non_empty(get("level")) {
                catalog.class_levels.push(ClassLevel {
                    level,
                    department: get("department"),
                });
            }
        })?;

        for_each_record(&dir.join("curriculum.csv"), |headers, record| {
            let get = field(headers, record);
            if let Some(level) = non_empty(get("level")) {
                catalog.rules.insert((level, get("department")));
            }
        })?;

        log::info!(
            "Loaded catalog: {} subjects, {} teachers, {} rooms, {} class levels, {} curriculum rules",
            catalog.subjects.len(),
            catalog.teachers.len(),
            catalog.rooms.len(),
            catalog.class_levels.len(),
            catalog.rules.len()
        );
        Ok(catalog)
    }
}

fn for_each_record<F>(path: &Path, mut handle: F) -> StoreResult<()>
where
    F: FnMut(&StringRecord, &StringRecord),
{
    if !path.exists() {
        log::warn!("Catalog file {} not found, skipping", path.display());
        return Ok(());
    }
    let mut reader = Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    for result in reader.records() {
        let record = result?;
        handle(&headers, &record);
    }
    Ok(())
}

/// Looks a column up by header name (trimmed, case-insensitive)
fn field<'a>(headers: &'a StringRecord, record: &'a StringRecord) -> impl Fn(&str) -> String + 'a {
    move |name| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .and_then(|i| record.get(i))
            .unwrap_or("")
            .trim()
            .to_string()
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Parses an hour count. Empty means 0; anything else must be a whole number of hours.
fn parse_hours(value: &str) -> Option<u8> {
    let value = value.trim();
    if value.is_empty() {
        return Some(0);
    }
    value.parse().ok()
}

#[async_trait]
impl SubjectCatalog for Catalog {
    async fn subject(&self, id: &str) -> StoreResult<Option<Subject>> {
        Ok(self.subjects.get(id).cloned())
    }

    async fn teacher_name(&self, id: &str) -> StoreResult<Option<String>> {
        Ok(self.teachers.get(id).cloned())
    }

    async fn room_name(&self, id: &str) -> StoreResult<Option<String>> {
        Ok(self.rooms.get(id).cloned())
    }

    async fn class_levels(&self) -> StoreResult<Vec<ClassLevel>> {
        Ok(self.class_levels.clone())
    }
}

#[async_trait]
impl CurriculumRules for Catalog {
    async fn has_rules(&self, class_level: &str, department: &str) -> StoreResult<bool> {
        Ok(self
            .rules
            .contains(&(class_level.to_string(), department.to_string())))
    }
}
