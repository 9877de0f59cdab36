use crate::error::PlacementError;

use super::grid::Grid;
use super::slot_utils::{span_periods, LUNCH_PERIOD, TOTAL_PERIODS};
use super::types::{Day, SlotId};

/// Checks a span against the day layout alone: period range, day end and lunch.
///
/// Rules are applied in order and the first violation is returned.
pub fn check_span(start_period: u8, duration: u8) -> Result<(), PlacementError> {
    if !(1..=TOTAL_PERIODS).contains(&start_period) {
        return Err(PlacementError::OutOfRange {
            start: start_period,
        });
    }
    if duration == 0 {
        return Err(PlacementError::InvalidDuration);
    }

    let end = u16::from(start_period) + u16::from(duration) - 1;
    if end > u16::from(TOTAL_PERIODS) {
        return Err(PlacementError::ExceedsDayBounds {
            start: start_period,
            duration,
        });
    }

    // Morning spans must finish before lunch; afternoon spans start after it.
    let crosses_lunch = start_period == LUNCH_PERIOD
        || (start_period < LUNCH_PERIOD && end >= u16::from(LUNCH_PERIOD));
    if crosses_lunch {
        return Err(PlacementError::OverlapsLunch {
            start: start_period,
            duration,
        });
    }

    Ok(())
}

/// Full placement check against the current contents of `grid`.
///
/// `moving` names the slot being relocated; cells it already holds count as free.
pub fn check_placement(
    grid: &Grid,
    day: Day,
    start_period: u8,
    duration: u8,
    moving: Option<SlotId>,
) -> Result<(), PlacementError> {
    check_span(start_period, duration)?;

    for period in span_periods(start_period, duration) {
        if let Some(occupant) = grid.occupant(day, period) {
            if Some(occupant) != moving {
                return Err(PlacementError::SlotConflict {
                    conflicting: occupant,
                    day,
                    period,
                });
            }
        }
    }

    Ok(())
}
