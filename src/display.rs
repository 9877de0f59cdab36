use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::schedule::{
    period_label, period_to_time, CellView, Day, Grid, GridKey, ReservedKind, Slot, SlotId,
    ASSEMBLY_PERIOD, TOTAL_PERIODS,
};

/// Formats a slot as "CODE NAME"
pub fn format_slot_label(slot: &Slot) -> String {
    if slot.subject_name.is_empty() {
        slot.subject_code.clone()
    } else {
        format!("{} {}", slot.subject_code, slot.subject_name)
    }
}

fn export_cell(cell: CellView<'_>) -> String {
    match cell {
        CellView::Empty => "-".to_string(),
        CellView::SlotStart(slot) => format_slot_label(slot),
        CellView::Continuation(_) => String::new(),
        CellView::Reserved(ReservedKind::Lunch) => "LUNCH".to_string(),
        CellView::Reserved(ReservedKind::Assembly) => "ASSEMBLY".to_string(),
    }
}

/// Writes the teaching periods of a grid as CSV: one row per weekday
pub fn write_grid_csv<W: Write>(grid: &Grid, writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["Day".to_string()];
    header.extend((1..=TOTAL_PERIODS).map(period_label));
    wtr.write_record(&header)?;

    for day in Day::ALL {
        let mut row = vec![day.name().to_string()];
        for period in 1..=TOTAL_PERIODS {
            row.push(grid.cell_at(day, period).map(export_cell).unwrap_or_default());
        }
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn grid_to_csv_string(grid: &Grid) -> Result<String, csv::Error> {
    let mut buf = Vec::new();
    write_grid_csv(grid, &mut buf)?;
    String::from_utf8(buf).map_err(|e| csv::Error::from(io::Error::new(io::ErrorKind::InvalidData, e)))
}

pub fn write_grid_to_file<P: AsRef<Path>>(grid: &Grid, path: P) -> Result<(), csv::Error> {
    let file = File::create(path)?;
    write_grid_csv(grid, file)
}

/// Prints a grid in a readable format
pub fn print_grid(grid: &Grid) {
    println!("\n=== {} ({}) ===", grid.key(), grid.term());
    println!("Slots placed: {}", grid.len());

    for day in Day::ALL {
        println!("\n{}:", day);
        for period in ASSEMBLY_PERIOD..=TOTAL_PERIODS {
            let label = period_label(period);
            match grid.cell_at(day, period) {
                Some(CellView::SlotStart(slot)) => {
                    let teacher = slot.teacher_name.as_deref().unwrap_or("-");
                    let room = slot.room_name.as_deref().unwrap_or("-");
                    println!(
                        "  {} -> {} ({} periods, teacher {}, room {}, id {})",
                        label,
                        format_slot_label(slot),
                        slot.duration,
                        teacher,
                        room,
                        slot.id
                    );
                }
                Some(CellView::Continuation(id)) => println!("  {} -> (continues slot {})", label, id),
                Some(CellView::Reserved(ReservedKind::Lunch)) => println!("  {} -> [LUNCH]", label),
                Some(CellView::Reserved(ReservedKind::Assembly)) => println!("  Assembly -> [FLAG CEREMONY]"),
                Some(CellView::Empty) | None => println!("  {} -> [EMPTY]", label),
            }
        }
    }
}

/// JSON shape of one grid cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CellJson {
    Empty,
    Slot {
        id: SlotId,
        subject_code: String,
        subject_name: String,
        duration: u8,
        teacher_name: Option<String>,
        room_name: Option<String>,
    },
    Continuation {
        id: SlotId,
    },
    Lunch,
    Assembly,
}

impl From<CellView<'_>> for CellJson {
    fn from(cell: CellView<'_>) -> Self {
        match cell {
            CellView::Empty => CellJson::Empty,
            CellView::SlotStart(slot) => CellJson::Slot {
                id: slot.id,
                subject_code: slot.subject_code.clone(),
                subject_name: slot.subject_name.clone(),
                duration: slot.duration,
                teacher_name: slot.teacher_name.clone(),
                room_name: slot.room_name.clone(),
            },
            CellView::Continuation(id) => CellJson::Continuation { id },
            CellView::Reserved(ReservedKind::Lunch) => CellJson::Lunch,
            CellView::Reserved(ReservedKind::Assembly) => CellJson::Assembly,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodHeading {
    pub period: u8,
    pub time: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayRow {
    pub day: Day,
    /// Indexed by period; index 0 is the assembly column
    pub cells: Vec<CellJson>,
}

/// Day x period matrix of a grid as served by the view route
#[derive(Debug, Clone, Serialize)]
pub struct GridView {
    pub term: String,
    pub grid: GridKey,
    pub periods: Vec<PeriodHeading>,
    pub days: Vec<DayRow>,
}

impl GridView {
    pub fn from_grid(grid: &Grid) -> Self {
        let periods = (ASSEMBLY_PERIOD..=TOTAL_PERIODS)
            .map(|period| PeriodHeading {
                period,
                time: period_to_time(period),
            })
            .collect();
        let days = Day::ALL
            .into_iter()
            .map(|day| DayRow {
                day,
                cells: (ASSEMBLY_PERIOD..=TOTAL_PERIODS)
                    .map(|period| grid.cell_at(day, period).map(CellJson::from).unwrap_or(CellJson::Empty))
                    .collect(),
            })
            .collect();
        Self {
            term: grid.term().to_string(),
            grid: grid.key().clone(),
            periods,
            days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_grid() -> Grid {
        let mut grid = Grid::new("1/2569", GridKey::ClassLevel("1/1".to_string()));
        grid.place(Slot {
            id: SlotId(1),
            term: "1/2569".to_string(),
            day: Day::Monday,
            start_period: 2,
            duration: 2,
            subject_code: "MATH101".to_string(),
            subject_name: "Mathematics".to_string(),
            teacher_id: None,
            teacher_name: None,
            room_id: None,
            room_name: None,
            class_level: "1/1".to_string(),
            department_name: "Science".to_string(),
        })
        .unwrap();
        grid
    }

    #[test]
    fn csv_export_renders_starts_continuations_and_lunch() {
        let csv = grid_to_csv_string(&sample_grid()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("Day,Period 1 (08:00-09:00),Period 2 (09:00-10:00)"));
        assert_eq!(lines[1], "Monday,-,MATH101 Mathematics,,-,LUNCH,-,-,-,-,-");
        assert_eq!(lines[2], "Tuesday,-,-,-,-,LUNCH,-,-,-,-,-");
    }

    #[test]
    fn view_includes_assembly_column() {
        let view = GridView::from_grid(&sample_grid());
        assert_eq!(view.periods.len(), 11);
        assert_eq!(view.periods[0].time, None);
        assert_eq!(view.periods[1].time.as_deref(), Some("08:00-09:00"));

        let monday = &view.days[0].cells;
        assert_eq!(monday[0], CellJson::Assembly);
        assert!(matches!(monday[2], CellJson::Slot { duration: 2, .. }));
        assert_eq!(monday[3], CellJson::Continuation { id: SlotId(1) });
        assert_eq!(monday[5], CellJson::Lunch);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["days"][0]["cells"][2]["kind"], "slot");
        assert_eq!(json["grid"]["kind"], "class_level");
    }
}
