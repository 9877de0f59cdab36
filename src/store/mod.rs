//! Persistence of placed slots.
//!
//! The schedule service is the only caller. Stores hold no placement logic;
//! they keep whatever the service hands them.

mod csv_file;
mod memory;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::schedule::{GridKey, Slot, SlotId};

pub use csv_file::CsvStore;
pub use memory::MemoryStore;

#[async_trait]
pub trait SlotStore: Send + Sync {
    /// Slots of one grid for a term
    async fn load_slots(&self, term: &str, key: &GridKey) -> StoreResult<Vec<Slot>>;

    /// Every slot of a term
    async fn load_term(&self, term: &str) -> StoreResult<Vec<Slot>>;

    async fn find_slot(&self, id: SlotId) -> StoreResult<Option<Slot>>;

    /// Inserts or overwrites by id
    async fn save_slots(&self, slots: &[Slot]) -> StoreResult<()>;

    /// Returns how many of `ids` existed and were deleted
    async fn delete_slots(&self, ids: &[SlotId]) -> StoreResult<usize>;

    /// Deletes `remove` and inserts `insert` as one change; on error neither is applied
    async fn replace_slots(&self, remove: &[SlotId], insert: &[Slot]) -> StoreResult<()>;

    /// Reserves `count` fresh ids
    async fn allocate_ids(&self, count: usize) -> StoreResult<Vec<SlotId>>;
}
