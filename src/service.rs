//! Schedule service: the only component that changes persisted schedule state.
//!
//! Every mutation runs under a per-term write lock for its whole
//! read-validate-write cycle. Teacher grids span class levels, so the term is
//! the smallest key covering every grid one mutation inspects.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::audit::{AuditAction, AuditEntry, AuditSink};
use crate::catalog::{CurriculumRules, SubjectCatalog};
use crate::error::{GeneratorError, ScheduleError, StoreError};
use crate::form::{
    validate_bulk_delete, validate_generate, validate_manual_add, BulkDeleteRequest,
    GenerateRequest, ManualAddRequest, MoveRequest,
};
use crate::generator::{AutoGenerator, GeneratedSlot};
use crate::schedule::{resolve, Grid, GridKey, Scope, ScopeMode, Slot, SlotId};
use crate::store::SlotStore;

const RESOURCE: &str = "Schedule";
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(200);

/// Result of a bulk delete or a scoped clear
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub succeeded: usize,
    pub not_found: usize,
    pub not_found_ids: Vec<SlotId>,
    pub failed: usize,
    pub failures: Vec<ClassFailure>,
}

impl DeleteReport {
    fn missing(&mut self, id: SlotId) {
        self.not_found += 1;
        self.not_found_ids.push(id);
    }

    fn merge(&mut self, other: DeleteReport) {
        self.succeeded += other.succeeded;
        self.not_found += other.not_found;
        self.not_found_ids.extend(other.not_found_ids);
        self.failed += other.failed;
        self.failures.extend(other.failures);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateOutcome {
    pub term: String,
    pub class_level: String,
    pub removed: usize,
    pub placed: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassFailure {
    pub class_level: String,
    pub department: String,
    pub reason: String,
}

/// Summary of a generate-all run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub skipped_levels: Vec<String>,
    pub failures: Vec<ClassFailure>,
}

pub struct ScheduleService {
    store: Arc<dyn SlotStore>,
    catalog: Arc<dyn SubjectCatalog>,
    curriculum: Arc<dyn CurriculumRules>,
    generator: Arc<dyn AutoGenerator>,
    audit: Arc<dyn AuditSink>,
    batch_delay: Duration,
    term_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ScheduleService {
    pub fn new(
        store: Arc<dyn SlotStore>,
        catalog: Arc<dyn SubjectCatalog>,
        curriculum: Arc<dyn CurriculumRules>,
        generator: Arc<dyn AutoGenerator>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            catalog,
            curriculum,
            generator,
            audit,
            batch_delay: DEFAULT_BATCH_DELAY,
            term_locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Pause between external generator calls in a batch run
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    /// Current grid for a class level or teacher
    pub async fn view(&self, term: &str, key: &GridKey) -> Result<Grid, ScheduleError> {
        self.load_grid(term.trim(), key).await
    }

    pub async fn manual_add(&self, req: ManualAddRequest, actor: &str) -> Result<Slot, ScheduleError> {
        validate_manual_add(&req).map_err(ScheduleError::Validation)?;
        let term = req.term.trim().to_string();
        let class_level = req.class_level.trim().to_string();

        let subject = self
            .catalog
            .subject(req.subject_id.trim())
            .await?
            .ok_or_else(|| ScheduleError::Validation(format!("Unknown subject: {}", req.subject_id)))?;
        let department_name = match non_blank(req.department) {
            Some(department) => department,
            None => self.department_of(&class_level).await?,
        };
        let teacher_id = non_blank(req.teacher_id).or_else(|| subject.default_teacher_id.clone());
        let room_id = non_blank(req.room_id).or_else(|| subject.default_room_id.clone());
        let teacher_name = match &teacher_id {
            Some(id) => self.catalog.teacher_name(id).await?,
            None => None,
        };
        let room_name = match &room_id {
            Some(id) => self.catalog.room_name(id).await?,
            None => None,
        };

        let _guard = self.lock_term(&term).await;
        let id = self.next_id().await?;
        let slot = Slot {
            id,
            term,
            day: req.day,
            start_period: req.start_period,
            duration: subject.duration(),
            subject_code: subject.code,
            subject_name: subject.name,
            teacher_id,
            teacher_name,
            room_id,
            room_name,
            class_level,
            department_name,
        };

        self.check_fits(&slot).await?;
        self.store.save_slots(std::slice::from_ref(&slot)).await?;

        log::info!(
            "Placed {} for {} on {} periods {}-{} (slot {})",
            slot.subject_code,
            slot.class_level,
            slot.day,
            slot.start_period,
            slot.end_period(),
            slot.id
        );
        self.record(
            AuditEntry::new(AuditAction::Create, RESOURCE, actor)
                .resource_id(slot.id)
                .details(format!(
                    "{} {} {} period {} ({})",
                    slot.class_level, slot.subject_code, slot.day, slot.start_period, slot.term
                )),
        )
        .await;
        Ok(slot)
    }

    pub async fn move_slot(&self, req: MoveRequest, actor: &str) -> Result<Slot, ScheduleError> {
        let located = self
            .store
            .find_slot(req.id)
            .await?
            .ok_or(ScheduleError::NotFound(req.id))?;
        let _guard = self.lock_term(&located.term).await;
        let current = self
            .store
            .find_slot(req.id)
            .await?
            .ok_or(ScheduleError::NotFound(req.id))?;

        for key in current.grid_keys() {
            let mut grid = self.load_grid(&current.term, &key).await?;
            if let Err(e) = grid.move_to(current.id, req.new_day, req.new_start) {
                log::warn!(
                    "Rejected move of slot {} to {} period {} in {}: {}",
                    current.id,
                    req.new_day,
                    req.new_start,
                    key,
                    e
                );
                return Err(ScheduleError::from_move(key, e));
            }
        }

        let mut moved = current.clone();
        moved.day = req.new_day;
        moved.start_period = req.new_start;
        self.store.save_slots(std::slice::from_ref(&moved)).await?;

        log::info!(
            "Moved slot {} from {} period {} to {} period {}",
            moved.id,
            current.day,
            current.start_period,
            moved.day,
            moved.start_period
        );
        self.record(
            AuditEntry::new(AuditAction::Update, RESOURCE, actor)
                .resource_id(moved.id)
                .details(format!(
                    "moved {} {} period {} -> {} period {}",
                    moved.subject_code, current.day, current.start_period, moved.day, moved.start_period
                )),
        )
        .await;
        Ok(moved)
    }

    /// Best-effort delete: missing ids are counted and skipped, the rest are removed
    pub async fn bulk_delete(
        &self,
        req: BulkDeleteRequest,
        actor: &str,
    ) -> Result<DeleteReport, ScheduleError> {
        validate_bulk_delete(&req).map_err(ScheduleError::Validation)?;
        let unique: BTreeSet<SlotId> = req.ids.into_iter().collect();

        let mut report = DeleteReport::default();
        let mut by_term: BTreeMap<String, Vec<SlotId>> = BTreeMap::new();
        for id in unique {
            match self.store.find_slot(id).await? {
                Some(slot) => by_term.entry(slot.term).or_default().push(id),
                None => report.missing(id),
            }
        }

        for (term, ids) in by_term {
            let _guard = self.lock_term(&term).await;
            report.merge(self.remove_locked(&term, &ids).await?);
        }

        if report.not_found > 0 {
            log::warn!("Bulk delete skipped missing slots {:?}", report.not_found_ids);
        }
        log::info!(
            "Bulk delete removed {} slots ({} not found, {} failed)",
            report.succeeded,
            report.not_found,
            report.failed
        );
        self.record(
            AuditEntry::new(AuditAction::Delete, RESOURCE, actor).details(format!(
                "bulk delete: {} removed, {} not found, {} failed",
                report.succeeded, report.not_found, report.failed
            )),
        )
        .await;
        Ok(report)
    }

    /// Removes every slot of the term matching the scope
    pub async fn clear(&self, scope: Scope, actor: &str) -> Result<DeleteReport, ScheduleError> {
        let _guard = self.lock_term(&scope.term).await;
        let report = self.clear_locked(&scope).await?;

        log::info!(
            "Cleared {:?} in {}: {} slots removed, {} failed",
            scope.mode,
            scope.term,
            report.succeeded,
            report.failed
        );
        self.record(
            AuditEntry::new(AuditAction::Delete, RESOURCE, actor).details(format!(
                "clear {:?} in {}: {} removed, {} failed",
                scope.mode, scope.term, report.succeeded, report.failed
            )),
        )
        .await;
        Ok(report)
    }

    /// Replaces a class's schedule for the term with the external generator's result.
    ///
    /// The generated lessons are validated as a whole before anything is
    /// written; on any failure the previous schedule stays untouched.
    pub async fn generate_for_class(
        &self,
        req: GenerateRequest,
        actor: &str,
    ) -> Result<GenerateOutcome, ScheduleError> {
        validate_generate(&req).map_err(ScheduleError::Validation)?;
        let term = req.term.trim().to_string();
        let class_level = req.class_level.trim().to_string();
        let department = match non_blank(Some(req.department)) {
            Some(department) => department,
            None => self.department_of(&class_level).await?,
        };

        let result = match self.generator.generate(&term, &department, &class_level).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Auto-generation for {} in {} failed: {}", class_level, term, e);
                return Err(e.into());
            }
        };
        if !result.success {
            let message = if result.message.is_empty() {
                "generator reported failure".to_string()
            } else {
                result.message
            };
            log::error!("Auto-generation for {} in {} declined: {}", class_level, term, message);
            return Err(GeneratorError::Rejected(message).into());
        }
        let generated = result.slots.ok_or_else(|| {
            GeneratorError::InvalidResult("response carried no schedule".to_string())
        })?;

        let _guard = self.lock_term(&term).await;
        let ids = self.store.allocate_ids(generated.len()).await?;
        let new_slots: Vec<Slot> = generated
            .into_iter()
            .zip(ids)
            .map(|(g, id)| slot_from_generated(g, id, &term, &class_level, &department))
            .collect();

        let term_slots = self.store.load_term(&term).await?;
        let scope = Scope::new(term.clone(), ScopeMode::ClassLevel(class_level.clone()));
        let old_ids = resolve(&scope, &term_slots);

        if let Err(e) = check_generated(&term, &class_level, &new_slots, &term_slots, &old_ids) {
            log::error!("Generated schedule for {} in {} rejected: {}", class_level, term, e);
            return Err(e);
        }

        let removed: Vec<SlotId> = old_ids.into_iter().collect();
        self.store.replace_slots(&removed, &new_slots).await?;

        let message = if result.message.is_empty() {
            format!("Generated {} lessons for {}", new_slots.len(), class_level)
        } else {
            result.message
        };
        log::info!(
            "Applied generated schedule for {} in {}: {} removed, {} placed",
            class_level,
            term,
            removed.len(),
            new_slots.len()
        );
        self.record(
            AuditEntry::new(AuditAction::Create, RESOURCE, actor).details(format!(
                "auto-generated {} ({}) in {}: {} removed, {} placed",
                class_level,
                department,
                term,
                removed.len(),
                new_slots.len()
            )),
        )
        .await;

        Ok(GenerateOutcome {
            term,
            class_level,
            removed: removed.len(),
            placed: new_slots.len(),
            message,
        })
    }

    /// Generates every configured class in turn, pausing between generator calls.
    ///
    /// Classes without curriculum rules are skipped; a failing class is
    /// recorded and the batch carries on.
    pub async fn generate_all(&self, term: &str, actor: &str) -> Result<BatchReport, ScheduleError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(ScheduleError::Validation("Term is required".to_string()));
        }
        let classes = self.catalog.class_levels().await?;
        let mut report = BatchReport {
            total: classes.len(),
            ..Default::default()
        };
        let mut called = false;

        for (index, class) in classes.into_iter().enumerate() {
            let has_rules = match self.curriculum.has_rules(&class.level, &class.department).await {
                Ok(has_rules) => has_rules,
                Err(e) => {
                    log::error!("Curriculum lookup for {} failed: {}", class.level, e);
                    report.failed += 1;
                    report.failures.push(ClassFailure {
                        class_level: class.level,
                        department: class.department,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if !has_rules {
                log::warn!("Skipping {} ({}): no curriculum rules", class.level, class.department);
                report.skipped += 1;
                report.skipped_levels.push(class.level);
                continue;
            }

            if called && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
            called = true;

            log::info!("Generating ({}/{}) {}", index + 1, report.total, class.level);
            let req = GenerateRequest {
                term: term.to_string(),
                department: class.department.clone(),
                class_level: class.level.clone(),
            };
            match self.generate_for_class(req, actor).await {
                Ok(_) => report.succeeded += 1,
                Err(e) => {
                    report.failed += 1;
                    report.failures.push(ClassFailure {
                        class_level: class.level,
                        department: class.department,
                        reason: e.to_string(),
                    });
                }
            }
        }

        log::info!(
            "Batch generation for {}: {} succeeded, {} failed, {} skipped",
            term,
            report.succeeded,
            report.failed,
            report.skipped
        );
        Ok(report)
    }

    async fn lock_term(&self, term: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.term_locks.lock().unwrap_or_else(PoisonError::into_inner);
            // An entry only the map references is idle
            locks.retain(|t, lock| t == term || Arc::strong_count(lock) > 1);
            locks.entry(term.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    async fn load_grid(&self, term: &str, key: &GridKey) -> Result<Grid, ScheduleError> {
        let slots = self.store.load_slots(term, key).await?;
        Grid::hydrate(term, key.clone(), slots).map_err(|(slot, e)| {
            log::error!("Stored slot {} does not fit {} in {}: {}", slot.id, key, term, e);
            inconsistent(term, key, &slot, &e)
        })
    }

    async fn next_id(&self) -> Result<SlotId, ScheduleError> {
        self.store
            .allocate_ids(1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Inconsistent("store allocated no id".to_string()).into())
    }

    async fn department_of(&self, class_level: &str) -> Result<String, ScheduleError> {
        self.catalog
            .class_levels()
            .await?
            .into_iter()
            .find(|c| c.level == class_level)
            .map(|c| c.department)
            .ok_or_else(|| ScheduleError::Validation(format!("Unknown class level: {}", class_level)))
    }

    /// Checks a new slot against its class grid and, when it has one, its teacher's grid
    async fn check_fits(&self, slot: &Slot) -> Result<(), ScheduleError> {
        for key in slot.grid_keys() {
            let mut grid = self.load_grid(&slot.term, &key).await?;
            if let Err(e) = grid.place(slot.clone()) {
                log::warn!(
                    "Rejected {} for {} on {} period {} in {}: {}",
                    slot.subject_code,
                    slot.class_level,
                    slot.day,
                    slot.start_period,
                    key,
                    e
                );
                return Err(ScheduleError::placement(key, e));
            }
        }
        Ok(())
    }

    async fn clear_locked(&self, scope: &Scope) -> Result<DeleteReport, ScheduleError> {
        let slots = self.store.load_term(&scope.term).await?;
        let ids: Vec<SlotId> = resolve(scope, &slots).into_iter().collect();
        self.remove_locked(&scope.term, &ids).await
    }

    /// Shared deletion path of bulk delete and clear; the caller holds the term lock.
    ///
    /// Ids are checked against a fresh read of the term, so ids resolved
    /// before the lock was taken are counted as not found if they are gone.
    /// Deletion runs per class level: a class whose delete fails is reported
    /// and the remaining classes are still removed. No grid is rebuilt here,
    /// so stored slots that overlap can still be deleted.
    async fn remove_locked(&self, term: &str, ids: &[SlotId]) -> Result<DeleteReport, ScheduleError> {
        let mut report = DeleteReport::default();
        let stored: HashMap<SlotId, Slot> = self
            .store
            .load_term(term)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        let mut by_class: BTreeMap<String, Vec<SlotId>> = BTreeMap::new();
        for &id in ids {
            match stored.get(&id) {
                Some(slot) => by_class.entry(slot.class_level.clone()).or_default().push(id),
                None => report.missing(id),
            }
        }

        for (class_level, ids) in by_class {
            match self.store.delete_slots(&ids).await {
                Ok(deleted) => report.succeeded += deleted,
                Err(e) => {
                    log::error!("Deleting {} slots of {} in {} failed: {}", ids.len(), class_level, term, e);
                    report.failed += ids.len();
                    report.failures.push(ClassFailure {
                        department: ids
                            .first()
                            .and_then(|id| stored.get(id))
                            .map(|s| s.department_name.clone())
                            .unwrap_or_default(),
                        class_level,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    async fn record(&self, entry: AuditEntry) {
        if let Err(e) = self.audit.log_action(entry).await {
            log::warn!("Audit log write failed: {}", e);
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn inconsistent(term: &str, key: &GridKey, slot: &Slot, err: &impl std::fmt::Display) -> ScheduleError {
    StoreError::Inconsistent(format!("slot {} in {} of {}: {}", slot.id, key, term, err)).into()
}

fn slot_from_generated(
    generated: GeneratedSlot,
    id: SlotId,
    term: &str,
    class_level: &str,
    department: &str,
) -> Slot {
    Slot {
        id,
        term: term.to_string(),
        day: generated.day,
        start_period: generated.start_period,
        duration: generated.duration,
        subject_code: generated.subject_code,
        subject_name: generated.subject_name,
        teacher_id: generated.teacher_id,
        teacher_name: generated.teacher_name,
        room_id: generated.room_id,
        room_name: generated.room_name,
        class_level: class_level.to_string(),
        department_name: department.to_string(),
    }
}

/// Validates a generated class schedule as a whole: the lessons must fit one
/// class grid, and each teacher's lessons must fit around that teacher's
/// lessons in other classes.
fn check_generated(
    term: &str,
    class_level: &str,
    new_slots: &[Slot],
    term_slots: &[Slot],
    replaced: &BTreeSet<SlotId>,
) -> Result<(), ScheduleError> {
    let rejected = |slot: &Slot, key: &GridKey, e: &dyn std::fmt::Display| -> ScheduleError {
        GeneratorError::InvalidResult(format!(
            "{} on {} period {} does not fit {}: {}",
            slot.subject_code, slot.day, slot.start_period, key, e
        ))
        .into()
    };

    let class_key = GridKey::ClassLevel(class_level.to_string());
    let mut class_grid = Grid::new(term, class_key.clone());
    for slot in new_slots {
        class_grid
            .place(slot.clone())
            .map_err(|e| rejected(slot, &class_key, &e))?;
    }

    let mut teacher_grids: HashMap<String, Grid> = HashMap::new();
    for slot in new_slots {
        let Some(teacher_id) = &slot.teacher_id else {
            continue;
        };
        let key = GridKey::Teacher(teacher_id.clone());
        let grid = match teacher_grids.entry(teacher_id.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let kept = term_slots
                    .iter()
                    .filter(|s| !replaced.contains(&s.id) && key.contains(s))
                    .cloned();
                let grid = Grid::hydrate(term, key.clone(), kept)
                    .map_err(|(bad, e)| inconsistent(term, &key, &bad, &e))?;
                entry.insert(grid)
            }
        };
        grid.place(slot.clone()).map_err(|e| rejected(slot, &key, &e))?;
    }

    Ok(())
}
