use thiserror::Error;

use crate::schedule::{Day, GridKey, SlotId, LUNCH_PERIOD, TOTAL_PERIODS};

/// Why a slot cannot occupy the requested cells
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("start period {start} is outside periods 1-{}", TOTAL_PERIODS)]
    OutOfRange { start: u8 },
    #[error("a slot must last at least one period")]
    InvalidDuration,
    #[error("a {duration}-period slot starting at period {start} runs past period {}", TOTAL_PERIODS)]
    ExceedsDayBounds { start: u8, duration: u8 },
    #[error("a {duration}-period slot starting at period {start} overlaps the lunch break (period {})", LUNCH_PERIOD)]
    OverlapsLunch { start: u8, duration: u8 },
    #[error("{day} period {period} is already taken by slot {conflicting}")]
    SlotConflict {
        conflicting: SlotId,
        day: Day,
        period: u8,
    },
    #[error("slot {0} is already placed in this grid")]
    AlreadyPlaced(SlotId),
}

impl PlacementError {
    /// Stable reason code reported to clients
    pub fn code(&self) -> &'static str {
        match self {
            PlacementError::OutOfRange { .. } => "out_of_range",
            PlacementError::InvalidDuration => "invalid_duration",
            PlacementError::ExceedsDayBounds { .. } => "exceeds_day_bounds",
            PlacementError::OverlapsLunch { .. } => "overlaps_lunch",
            PlacementError::SlotConflict { .. } | PlacementError::AlreadyPlaced(_) => {
                "placement_conflict"
            }
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            PlacementError::SlotConflict { .. } | PlacementError::AlreadyPlaced(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("slot {0} not found")]
pub struct NotFoundError(pub SlotId);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error(transparent)]
    Placement(#[from] PlacementError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage CSV failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("stored schedule is inconsistent: {0}")]
    Inconsistent(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeneratorError {
    #[error("auto-generation is not configured")]
    Unavailable,
    #[error("auto-generator did not answer in time")]
    Timeout,
    #[error("auto-generator request failed: {0}")]
    Request(String),
    #[error("auto-generator declined: {0}")]
    Rejected(String),
    #[error("auto-generator returned an unusable schedule: {0}")]
    InvalidResult(String),
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit log I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("audit log CSV failed: {0}")]
    Csv(#[from] csv::Error),
}

/// Outcome taxonomy of every schedule operation
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("{source} ({key})")]
    Placement {
        key: GridKey,
        #[source]
        source: PlacementError,
    },
    #[error("slot {0} not found")]
    NotFound(SlotId),
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl ScheduleError {
    pub fn placement(key: GridKey, source: PlacementError) -> Self {
        ScheduleError::Placement { key, source }
    }

    pub fn from_move(key: GridKey, err: MoveError) -> Self {
        match err {
            MoveError::NotFound(NotFoundError(id)) => ScheduleError::NotFound(id),
            MoveError::Placement(source) => ScheduleError::Placement { key, source },
        }
    }

    /// Stable reason code reported to clients
    pub fn code(&self) -> &'static str {
        match self {
            ScheduleError::Validation(_) => "validation_error",
            ScheduleError::Placement { source, .. } => source.code(),
            ScheduleError::NotFound(_) => "not_found",
            ScheduleError::Generator(_) => "external_generator_error",
            ScheduleError::Persistence(_) => "persistence_error",
        }
    }
}
