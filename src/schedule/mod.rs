pub mod types;
pub mod slot_utils;
pub mod validator;
pub mod grid;
pub mod scope;

pub use types::{CellView, Day, GridKey, ReservedKind, Slot, SlotId};
pub use slot_utils::{period_label, period_to_time, ASSEMBLY_PERIOD, LUNCH_PERIOD, TOTAL_PERIODS};
pub use validator::{check_placement, check_span};
pub use grid::Grid;
pub use scope::{resolve, Scope, ScopeMode};
