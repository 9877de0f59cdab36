use std::collections::BTreeMap;

use crate::error::{MoveError, NotFoundError, PlacementError};

use super::slot_utils::{reserved_kind, span_periods, TOTAL_PERIODS};
use super::types::{CellView, Day, GridKey, Slot, SlotId};
use super::validator::check_placement;

const COLUMNS: usize = TOTAL_PERIODS as usize + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    Empty,
    Start(SlotId),
    Continuation(SlotId),
}

/// Day x period placement matrix for one `(term, class level | teacher)` key.
///
/// A slot is stored once; its start cell points at it and the remaining
/// cells of its span hold continuation markers. No cell is ever claimed by
/// two slots: every mutation validates before it writes.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    term: String,
    key: GridKey,
    cells: [[Cell; COLUMNS]; Day::COUNT],
    slots: BTreeMap<SlotId, Slot>,
}

impl Grid {
    pub fn new(term: impl Into<String>, key: GridKey) -> Self {
        Self {
            term: term.into(),
            key,
            cells: [[Cell::Empty; COLUMNS]; Day::COUNT],
            slots: BTreeMap::new(),
        }
    }

    /// Builds a grid from stored slots, failing on the first one that does not fit
    pub fn hydrate(
        term: impl Into<String>,
        key: GridKey,
        slots: impl IntoIterator<Item = Slot>,
    ) -> Result<Self, (Slot, PlacementError)> {
        let mut grid = Grid::new(term, key);
        for slot in slots {
            if let Err(e) = grid.place(slot.clone()) {
                return Err((slot, e));
            }
        }
        Ok(grid)
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn key(&self) -> &GridKey {
        &self.key
    }

    /// Places `slot` if every cell of its span is free
    pub fn place(&mut self, slot: Slot) -> Result<(), PlacementError> {
        if self.slots.contains_key(&slot.id) {
            return Err(PlacementError::AlreadyPlaced(slot.id));
        }
        check_placement(self, slot.day, slot.start_period, slot.duration, None)?;

        self.mark(slot.id, slot.day, slot.start_period, slot.duration);
        self.slots.insert(slot.id, slot);
        Ok(())
    }

    /// Clears the slot's start cell and continuation markers
    pub fn remove(&mut self, id: SlotId) -> Result<Slot, NotFoundError> {
        let slot = self.slots.remove(&id).ok_or(NotFoundError(id))?;
        self.unmark(slot.day, slot.start_period, slot.duration);
        Ok(slot)
    }

    /// Relocates a slot, keeping its duration.
    ///
    /// The new position is validated with the slot's own cells counted as
    /// free. On failure the grid is left exactly as it was.
    pub fn move_to(&mut self, id: SlotId, day: Day, start_period: u8) -> Result<&Slot, MoveError> {
        let (old_day, old_start, duration) = match self.slots.get(&id) {
            Some(slot) => (slot.day, slot.start_period, slot.duration),
            None => return Err(NotFoundError(id).into()),
        };
        check_placement(self, day, start_period, duration, Some(id))?;

        self.unmark(old_day, old_start, duration);
        self.mark(id, day, start_period, duration);

        let slot = self.slots.get_mut(&id).ok_or(NotFoundError(id))?;
        slot.day = day;
        slot.start_period = start_period;
        Ok(slot)
    }

    /// What occupies `(day, period)`. `None` outside the grid's columns.
    pub fn cell_at(&self, day: Day, period: u8) -> Option<CellView<'_>> {
        if let Some(kind) = reserved_kind(period) {
            return Some(CellView::Reserved(kind));
        }
        let cell = self.cells[day.index()].get(usize::from(period))?;
        Some(match *cell {
            Cell::Empty => CellView::Empty,
            Cell::Start(id) => match self.slots.get(&id) {
                Some(slot) => CellView::SlotStart(slot),
                None => CellView::Empty,
            },
            Cell::Continuation(id) => CellView::Continuation(id),
        })
    }

    /// Id of the slot covering `(day, period)`, whether at its start or continuation
    pub fn occupant(&self, day: Day, period: u8) -> Option<SlotId> {
        match self.cells[day.index()].get(usize::from(period))? {
            Cell::Start(id) | Cell::Continuation(id) => Some(*id),
            Cell::Empty => None,
        }
    }

    pub fn slot(&self, id: SlotId) -> Option<&Slot> {
        self.slots.get(&id)
    }

    pub fn contains(&self, id: SlotId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Placed slots in id order
    pub fn slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn mark(&mut self, id: SlotId, day: Day, start_period: u8, duration: u8) {
        let row = &mut self.cells[day.index()];
        for period in span_periods(start_period, duration) {
            row[usize::from(period)] = if period == start_period {
                Cell::Start(id)
            } else {
                Cell::Continuation(id)
            };
        }
    }

    fn unmark(&mut self, day: Day, start_period: u8, duration: u8) {
        let row = &mut self.cells[day.index()];
        for period in span_periods(start_period, duration) {
            row[usize::from(period)] = Cell::Empty;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{ReservedKind, LUNCH_PERIOD};
    use proptest::prelude::*;

    fn slot(id: u64, day: Day, start: u8, duration: u8) -> Slot {
        Slot {
            id: SlotId(id),
            term: "1/2569".to_string(),
            day,
            start_period: start,
            duration,
            subject_code: format!("SUB{}", id),
            subject_name: "Subject".to_string(),
            teacher_id: Some("T01".to_string()),
            teacher_name: Some("Teacher".to_string()),
            room_id: None,
            room_name: None,
            class_level: "1/1".to_string(),
            department_name: "Science".to_string(),
        }
    }

    fn grid() -> Grid {
        Grid::new("1/2569", GridKey::ClassLevel("1/1".to_string()))
    }

    #[test]
    fn place_marks_start_and_continuations() {
        let mut grid = grid();
        grid.place(slot(1, Day::Monday, 2, 3)).unwrap();

        assert!(matches!(grid.cell_at(Day::Monday, 2), Some(CellView::SlotStart(s)) if s.id == SlotId(1)));
        assert_eq!(grid.cell_at(Day::Monday, 3), Some(CellView::Continuation(SlotId(1))));
        assert_eq!(grid.cell_at(Day::Monday, 4), Some(CellView::Continuation(SlotId(1))));
        assert_eq!(grid.cell_at(Day::Monday, 1), Some(CellView::Empty));
        assert_eq!(grid.cell_at(Day::Tuesday, 2), Some(CellView::Empty));
    }

    #[test]
    fn reserved_and_out_of_grid_cells() {
        let grid = grid();
        assert_eq!(grid.cell_at(Day::Friday, 5), Some(CellView::Reserved(ReservedKind::Lunch)));
        assert_eq!(grid.cell_at(Day::Friday, 0), Some(CellView::Reserved(ReservedKind::Assembly)));
        assert_eq!(grid.cell_at(Day::Friday, 11), None);
    }

    #[test]
    fn placing_the_same_id_twice_is_rejected() {
        let mut grid = grid();
        grid.place(slot(1, Day::Monday, 1, 1)).unwrap();
        assert_eq!(
            grid.place(slot(1, Day::Tuesday, 1, 1)),
            Err(PlacementError::AlreadyPlaced(SlotId(1)))
        );
    }

    #[test]
    fn remove_clears_every_cell() {
        let mut grid = grid();
        grid.place(slot(1, Day::Wednesday, 6, 3)).unwrap();
        let removed = grid.remove(SlotId(1)).unwrap();
        assert_eq!(removed.id, SlotId(1));
        for period in 6..=8 {
            assert_eq!(grid.cell_at(Day::Wednesday, period), Some(CellView::Empty));
        }
        assert!(grid.is_empty());
    }

    #[test]
    fn removing_a_missing_slot_leaves_grid_untouched() {
        let mut grid = grid();
        grid.place(slot(1, Day::Monday, 1, 2)).unwrap();
        let before = grid.clone();
        assert_eq!(grid.remove(SlotId(9)), Err(NotFoundError(SlotId(9))));
        assert_eq!(grid, before);
    }

    #[test]
    fn move_can_overlap_its_own_cells() {
        let mut grid = grid();
        grid.place(slot(1, Day::Monday, 1, 3)).unwrap();
        let moved = grid.move_to(SlotId(1), Day::Monday, 2).unwrap();
        assert_eq!((moved.start_period, moved.duration), (2, 3));
        assert_eq!(grid.cell_at(Day::Monday, 1), Some(CellView::Empty));
        assert_eq!(grid.occupant(Day::Monday, 4), Some(SlotId(1)));
    }

    #[test]
    fn failed_move_keeps_original_position() {
        let mut grid = grid();
        grid.place(slot(1, Day::Monday, 1, 2)).unwrap();
        grid.place(slot(2, Day::Tuesday, 2, 2)).unwrap();
        let before = grid.clone();

        let err = grid.move_to(SlotId(1), Day::Tuesday, 3).unwrap_err();
        assert!(matches!(
            err,
            MoveError::Placement(PlacementError::SlotConflict { conflicting: SlotId(2), .. })
        ));
        assert_eq!(grid, before);

        let err = grid.move_to(SlotId(1), Day::Monday, LUNCH_PERIOD).unwrap_err();
        assert!(matches!(err, MoveError::Placement(PlacementError::OverlapsLunch { .. })));
        assert_eq!(grid, before);
    }

    #[test]
    fn hydrate_reports_the_slot_that_does_not_fit() {
        let result = Grid::hydrate(
            "1/2569",
            GridKey::ClassLevel("1/1".to_string()),
            vec![slot(1, Day::Monday, 1, 2), slot(2, Day::Monday, 2, 1)],
        );
        let (bad, err) = result.unwrap_err();
        assert_eq!(bad.id, SlotId(2));
        assert!(err.is_conflict());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Place { day: usize, start: u8, duration: u8 },
        Move { pick: usize, day: usize, start: u8 },
        Remove { pick: usize },
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..Day::COUNT, 0u8..=11, 0u8..=5)
                .prop_map(|(day, start, duration)| Op::Place { day, start, duration }),
            (0usize..16, 0..Day::COUNT, 0u8..=11)
                .prop_map(|(pick, day, start)| Op::Move { pick, day, start }),
            (0usize..16).prop_map(|pick| Op::Remove { pick }),
        ]
    }

    fn assert_invariants(grid: &Grid) {
        for day in Day::ALL {
            for period in 1..=TOTAL_PERIODS {
                let claims = grid
                    .slots()
                    .filter(|s| s.day == day && s.periods().contains(&period))
                    .count();
                assert!(claims <= 1, "{} period {} claimed {} times", day, period, claims);
                assert_eq!(grid.occupant(day, period).is_some(), claims == 1);
            }
        }
        for slot in grid.slots() {
            assert_ne!(slot.start_period, LUNCH_PERIOD);
            assert!(!slot.periods().contains(&LUNCH_PERIOD));
            assert!(slot.end_period() <= TOTAL_PERIODS);
        }
    }

    proptest! {
        #[test]
        fn random_operations_preserve_grid_invariants(ops in prop::collection::vec(op(), 1..60)) {
            let mut grid = grid();
            let mut next_id = 1u64;
            let mut durations = BTreeMap::new();

            for op in ops {
                let ids: Vec<SlotId> = grid.slots().map(|s| s.id).collect();
                match op {
                    Op::Place { day, start, duration } => {
                        if grid.place(slot(next_id, Day::ALL[day], start, duration)).is_ok() {
                            durations.insert(SlotId(next_id), duration);
                        }
                        next_id += 1;
                    }
                    Op::Move { pick, day, start } => {
                        if ids.is_empty() {
                            continue;
                        }
                        let id = ids[pick % ids.len()];
                        let before = grid.clone();
                        if grid.move_to(id, Day::ALL[day], start).is_err() {
                            prop_assert_eq!(&grid, &before);
                        }
                    }
                    Op::Remove { pick } => {
                        if ids.is_empty() {
                            prop_assert!(grid.remove(SlotId(pick as u64 + 1000)).is_err());
                            continue;
                        }
                        let id = ids[pick % ids.len()];
                        prop_assert!(grid.remove(id).is_ok());
                        durations.remove(&id);
                    }
                }
                assert_invariants(&grid);
                for slot in grid.slots() {
                    prop_assert_eq!(durations.get(&slot.id).copied(), Some(slot.duration));
                }
            }
        }
    }
}
