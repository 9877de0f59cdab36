use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::schedule::{GridKey, Slot, SlotId};

use super::SlotStore;

#[derive(Debug, Default)]
struct MemoryState {
    slots: BTreeMap<SlotId, Slot>,
    last_id: u64,
}

/// In-process store used by tests and when no data directory is wanted
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store; later allocations continue after the highest seeded id
    pub fn with_slots(slots: impl IntoIterator<Item = Slot>) -> Self {
        let slots: BTreeMap<SlotId, Slot> = slots.into_iter().map(|s| (s.id, s)).collect();
        let last_id = slots.keys().next_back().map(|id| id.0).unwrap_or(0);
        Self {
            state: Mutex::new(MemoryState { slots, last_id }),
        }
    }

    /// Snapshot of every stored slot in id order
    pub fn all(&self) -> Vec<Slot> {
        self.lock().slots.values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SlotStore for MemoryStore {
    async fn load_slots(&self, term: &str, key: &GridKey) -> StoreResult<Vec<Slot>> {
        Ok(self
            .lock()
            .slots
            .values()
            .filter(|s| s.term == term && key.contains(s))
            .cloned()
            .collect())
    }

    async fn load_term(&self, term: &str) -> StoreResult<Vec<Slot>> {
        Ok(self
            .lock()
            .slots
            .values()
            .filter(|s| s.term == term)
            .cloned()
            .collect())
    }

    async fn find_slot(&self, id: SlotId) -> StoreResult<Option<Slot>> {
        Ok(self.lock().slots.get(&id).cloned())
    }

    async fn save_slots(&self, slots: &[Slot]) -> StoreResult<()> {
        let mut state = self.lock();
        for slot in slots {
            state.last_id = state.last_id.max(slot.id.0);
            state.slots.insert(slot.id, slot.clone());
        }
        Ok(())
    }

    async fn delete_slots(&self, ids: &[SlotId]) -> StoreResult<usize> {
        let mut state = self.lock();
        let unique: HashSet<SlotId> = ids.iter().copied().collect();
        Ok(unique
            .into_iter()
            .filter(|id| state.slots.remove(id).is_some())
            .count())
    }

    async fn replace_slots(&self, remove: &[SlotId], insert: &[Slot]) -> StoreResult<()> {
        let mut state = self.lock();
        for id in remove {
            state.slots.remove(id);
        }
        for slot in insert {
            state.last_id = state.last_id.max(slot.id.0);
            state.slots.insert(slot.id, slot.clone());
        }
        Ok(())
    }

    async fn allocate_ids(&self, count: usize) -> StoreResult<Vec<SlotId>> {
        let mut state = self.lock();
        let first = state.last_id + 1;
        state.last_id += count as u64;
        Ok((first..first + count as u64).map(SlotId).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Day;

    fn slot(id: u64, level: &str, teacher: &str) -> Slot {
        Slot {
            id: SlotId(id),
            term: "1/2569".to_string(),
            day: Day::Monday,
            start_period: 1,
            duration: 1,
            subject_code: "SUB".to_string(),
            subject_name: "Subject".to_string(),
            teacher_id: Some(teacher.to_string()),
            teacher_name: None,
            room_id: None,
            room_name: None,
            class_level: level.to_string(),
            department_name: "Science".to_string(),
        }
    }

    #[tokio::test]
    async fn loads_by_grid_key() {
        let store = MemoryStore::with_slots(vec![slot(1, "1/1", "T01"), slot(2, "1/2", "T01")]);
        let by_class = store
            .load_slots("1/2569", &GridKey::ClassLevel("1/1".to_string()))
            .await
            .unwrap();
        assert_eq!(by_class.len(), 1);
        let by_teacher = store
            .load_slots("1/2569", &GridKey::Teacher("T01".to_string()))
            .await
            .unwrap();
        assert_eq!(by_teacher.len(), 2);
        assert!(store.load_term("2/2569").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ids_continue_after_seeded_slots() {
        let store = MemoryStore::with_slots(vec![slot(7, "1/1", "T01")]);
        assert_eq!(store.allocate_ids(2).await.unwrap(), vec![SlotId(8), SlotId(9)]);
        assert_eq!(store.allocate_ids(1).await.unwrap(), vec![SlotId(10)]);
    }

    #[tokio::test]
    async fn delete_counts_only_existing_ids() {
        let store = MemoryStore::with_slots(vec![slot(1, "1/1", "T01"), slot(2, "1/1", "T01")]);
        let deleted = store
            .delete_slots(&[SlotId(1), SlotId(1), SlotId(5)])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.all().len(), 1);
    }
}
