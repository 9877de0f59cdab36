use chrono::{Duration, NaiveTime};
use std::ops::RangeInclusive;

use super::types::ReservedKind;

/// Teaching periods per day, numbered from 1
pub const TOTAL_PERIODS: u8 = 10;
/// Lunch break; no slot may start on it or span across it
pub const LUNCH_PERIOD: u8 = 5;
/// Flag ceremony column shown before period 1
pub const ASSEMBLY_PERIOD: u8 = 0;

const FIRST_PERIOD_START_HOUR: u32 = 8;
const PERIOD_MINUTES: i64 = 60;

/// Returns the reserved activity held in `period`, if any
pub fn reserved_kind(period: u8) -> Option<ReservedKind> {
    match period {
        LUNCH_PERIOD => Some(ReservedKind::Lunch),
        ASSEMBLY_PERIOD => Some(ReservedKind::Assembly),
        _ => None,
    }
}

/// Periods covered by a span. Callers validate bounds first.
pub fn span_periods(start_period: u8, duration: u8) -> RangeInclusive<u8> {
    start_period..=start_period.saturating_add(duration).saturating_sub(1)
}

/// Clock bounds of a teaching period (period 1 = 08:00-09:00, one hour each)
pub fn period_bounds(period: u8) -> Option<(NaiveTime, NaiveTime)> {
    if !(1..=TOTAL_PERIODS).contains(&period) {
        return None;
    }
    let first = NaiveTime::from_hms_opt(FIRST_PERIOD_START_HOUR, 0, 0)?;
    let start = first + Duration::minutes(PERIOD_MINUTES * (i64::from(period) - 1));
    let end = start + Duration::minutes(PERIOD_MINUTES);
    Some((start, end))
}

/// Converts a period number to its clock range for display, e.g. "08:00-09:00"
pub fn period_to_time(period: u8) -> Option<String> {
    period_bounds(period)
        .map(|(start, end)| format!("{}-{}", start.format("%H:%M"), end.format("%H:%M")))
}

/// Column heading used by the printed and exported grid
pub fn period_label(period: u8) -> String {
    match period_to_time(period) {
        Some(time) => format!("Period {} ({})", period, time),
        None => format!("Period {}", period),
    }
}
