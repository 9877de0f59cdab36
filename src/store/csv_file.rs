use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use csv::{ReaderBuilder, WriterBuilder};
use tokio::sync::Mutex;

use crate::error::StoreResult;
use crate::schedule::{GridKey, Slot, SlotId};

use super::SlotStore;

const SCHEDULE_FILE: &str = "schedule.csv";

/// Keeps every slot in `<data_dir>/schedule.csv`.
///
/// The file is read whole and rewritten whole through a temporary file that
/// is renamed over the original, so a failed write leaves the old file intact.
pub struct CsvStore {
    path: PathBuf,
    file_lock: Mutex<()>,
    last_id: AtomicU64,
}

impl CsvStore {
    pub fn open<P: AsRef<Path>>(data_dir: P) -> StoreResult<Self> {
        fs::create_dir_all(data_dir.as_ref())?;
        let path = data_dir.as_ref().join(SCHEDULE_FILE);
        let last_id = read_slots(&path)?
            .iter()
            .map(|s| s.id.0)
            .max()
            .unwrap_or(0);
        log::debug!("Opened slot store {} (last id {})", path.display(), last_id);
        Ok(Self {
            path,
            file_lock: Mutex::new(()),
            last_id: AtomicU64::new(last_id),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_where<F>(&self, keep: F) -> StoreResult<Vec<Slot>>
    where
        F: Fn(&Slot) -> bool + Send,
    {
        let _guard = self.file_lock.lock().await;
        Ok(read_slots(&self.path)?.into_iter().filter(|s| keep(s)).collect())
    }

    /// Applies `change` to the full slot map and writes the result back
    async fn rewrite<F, T>(&self, change: F) -> StoreResult<T>
    where
        F: FnOnce(&mut BTreeMap<SlotId, Slot>) -> T + Send,
        T: Send,
    {
        let _guard = self.file_lock.lock().await;
        let mut slots: BTreeMap<SlotId, Slot> = read_slots(&self.path)?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();
        let result = change(&mut slots);
        write_slots(&self.path, slots.values())?;
        Ok(result)
    }
}

fn read_slots(path: &Path) -> StoreResult<Vec<Slot>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut slots = Vec::new();
    for record in reader.deserialize() {
        slots.push(record?);
    }
    Ok(slots)
}

fn write_slots<'a>(path: &Path, slots: impl Iterator<Item = &'a Slot>) -> StoreResult<()> {
    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = WriterBuilder::new().has_headers(true).from_path(&tmp)?;
        for slot in slots {
            writer.serialize(slot)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl SlotStore for CsvStore {
    async fn load_slots(&self, term: &str, key: &GridKey) -> StoreResult<Vec<Slot>> {
        self.load_where(|s| s.term == term && key.contains(s)).await
    }

    async fn load_term(&self, term: &str) -> StoreResult<Vec<Slot>> {
        self.load_where(|s| s.term == term).await
    }

    async fn find_slot(&self, id: SlotId) -> StoreResult<Option<Slot>> {
        Ok(self.load_where(|s| s.id == id).await?.into_iter().next())
    }

    async fn save_slots(&self, slots: &[Slot]) -> StoreResult<()> {
        if let Some(max) = slots.iter().map(|s| s.id.0).max() {
            self.last_id.fetch_max(max, Ordering::SeqCst);
        }
        self.rewrite(|all| {
            for slot in slots {
                all.insert(slot.id, slot.clone());
            }
        })
        .await
    }

    async fn delete_slots(&self, ids: &[SlotId]) -> StoreResult<usize> {
        self.rewrite(|all| ids.iter().filter(|id| all.remove(*id).is_some()).count())
            .await
    }

    async fn replace_slots(&self, remove: &[SlotId], insert: &[Slot]) -> StoreResult<()> {
        if let Some(max) = insert.iter().map(|s| s.id.0).max() {
            self.last_id.fetch_max(max, Ordering::SeqCst);
        }
        self.rewrite(|all| {
            for id in remove {
                all.remove(id);
            }
            for slot in insert {
                all.insert(slot.id, slot.clone());
            }
        })
        .await
    }

    async fn allocate_ids(&self, count: usize) -> StoreResult<Vec<SlotId>> {
        let count = count as u64;
        let first = self.last_id.fetch_add(count, Ordering::SeqCst) + 1;
        Ok((first..first + count).map(SlotId).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Day;

    fn slot(id: u64, level: &str, teacher: Option<&str>) -> Slot {
        Slot {
            id: SlotId(id),
            term: "1/2569".to_string(),
            day: Day::Thursday,
            start_period: 6,
            duration: 2,
            subject_code: "ENG201".to_string(),
            subject_name: "English, Reading".to_string(),
            teacher_id: teacher.map(str::to_string),
            teacher_name: teacher.map(|t| format!("Teacher {}", t)),
            room_id: Some("R101".to_string()),
            room_name: Some("Room 101".to_string()),
            class_level: level.to_string(),
            department_name: "Languages".to_string(),
        }
    }

    #[tokio::test]
    async fn slots_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = CsvStore::open(dir.path()).unwrap();
            store
                .save_slots(&[slot(1, "1/1", Some("T01")), slot(2, "1/2", None)])
                .await
                .unwrap();
        }

        let store = CsvStore::open(dir.path()).unwrap();
        let found = store.find_slot(SlotId(2)).await.unwrap().unwrap();
        assert_eq!(found, slot(2, "1/2", None));
        assert_eq!(store.allocate_ids(1).await.unwrap(), vec![SlotId(3)]);
    }

    #[tokio::test]
    async fn replace_swaps_class_slots() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::open(dir.path()).unwrap();
        store
            .save_slots(&[slot(1, "1/1", Some("T01")), slot(2, "1/2", Some("T01"))])
            .await
            .unwrap();

        store
            .replace_slots(&[SlotId(1)], &[slot(3, "1/1", Some("T02"))])
            .await
            .unwrap();

        let class = store
            .load_slots("1/2569", &GridKey::ClassLevel("1/1".to_string()))
            .await
            .unwrap();
        assert_eq!(class.iter().map(|s| s.id).collect::<Vec<_>>(), vec![SlotId(3)]);
        let teacher = store
            .load_slots("1/2569", &GridKey::Teacher("T01".to_string()))
            .await
            .unwrap();
        assert_eq!(teacher.len(), 1);
        assert!(!store.path().with_extension("csv.tmp").exists());
    }

    #[tokio::test]
    async fn delete_reports_existing_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::open(dir.path()).unwrap();
        store.save_slots(&[slot(1, "1/1", None)]).await.unwrap();
        assert_eq!(store.delete_slots(&[SlotId(1), SlotId(4)]).await.unwrap(), 1);
        assert!(store.load_term("1/2569").await.unwrap().is_empty());
    }
}
