//! Turns raw, header-less sheets into vehicle-class rows of hourly values.
//!
//! Two layouts are supported: the per-checkpoint exports of the sampling weeks
//! ([`normalize_checkpoint_sheet`]) and the daily sheets of the monthly bulk workbook
//! ([`normalize_bulk_sheet`]). Values are always placed in the hour slot named by the
//! column header, never by column position.

use log::debug;
use std::collections::BTreeMap;

use crate::config::*;
use crate::errors::*;

/// A row of a normalized sheet, before the vehicle class is mapped.
#[derive(PartialEq, Debug, Clone)]
pub struct ClassRow<T> {
    pub label: String,
    pub hours: [T; HOURS_PER_DAY],
}

#[derive(PartialEq, Debug, Clone)]
pub struct NormalizedSheet<T> {
    pub rows: Vec<ClassRow<T>>,
    pub warnings: Vec<Warning>,
}

/// Reads the hour of day from a header such as `"07:00"`, `"07:00:00"`,
/// `"07:00 - 08:00"` or, when `allow_bare` is set, `"7"`.
pub fn parse_hour_label(text: &str, allow_bare: bool) -> Option<usize> {
    let t = text.trim();
    let digits: String = t.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || digits.len() > 2 {
        return None;
    }
    let rest = &t[digits.len()..];
    let well_formed = rest.starts_with(':') || (allow_bare && rest.is_empty());
    if !well_formed {
        return None;
    }
    digits
        .parse::<usize>()
        .ok()
        .filter(|h| *h < HOURS_PER_DAY)
}

pub fn normalize_checkpoint_sheet(
    grid: &[Vec<Cell>],
    layout: &CheckpointSheetLayout,
) -> Result<NormalizedSheet<u64>, SheetError> {
    let body: &[Vec<Cell>] = if grid.len() > layout.preamble_rows {
        &grid[layout.preamble_rows..]
    } else {
        &[]
    };

    // Everything from the summary section onwards is not part of the class table.
    let marker = layout.terminator_marker.to_lowercase();
    let end = body
        .iter()
        .position(|row| {
            row.iter()
                .any(|c| c.as_text().to_lowercase().contains(&marker))
        })
        .unwrap_or(body.len());
    let body = &body[..end];
    debug!(
        "normalize_checkpoint_sheet: {} rows kept out of {}",
        body.len(),
        grid.len()
    );

    let (header_row, data_rows) = match body.split_first() {
        Some(x) => x,
        None => return EmptySheetSnafu {}.fail(),
    };

    let width = body.iter().map(|r| r.len()).max().unwrap_or(0);
    if width < 2 {
        return MissingClassColumnSnafu {
            column: layout.class_header.clone(),
        }
        .fail();
    }
    let mut header: Vec<String> = (0..width).map(|idx| cell_at(header_row, idx).as_text()).collect();
    header[0] = layout.index_header.clone();
    header[1] = layout.class_header.clone();
    let class_col = 1;

    let mut hour_cols: [Option<usize>; HOURS_PER_DAY] = [None; HOURS_PER_DAY];
    for (position, name) in header.iter().enumerate().skip(2) {
        if !name.contains(':') {
            continue;
        }
        let hour = match parse_hour_label(name, false) {
            Some(h) => h,
            None => {
                return UnreadableHourColumnSnafu {
                    position,
                    found: name.clone(),
                }
                .fail()
            }
        };
        if let Some(previous) = hour_cols[hour] {
            return DuplicateHourColumnSnafu {
                hour,
                first: header[previous].clone(),
                second: name.clone(),
            }
            .fail();
        }
        hour_cols[hour] = Some(position);
    }
    if hour_cols.iter().all(|c| c.is_none()) {
        return MissingHourColumnsSnafu { header }.fail();
    }

    let mut warnings: Vec<Warning> = Vec::new();
    let missing_hours: Vec<usize> = (0..HOURS_PER_DAY).filter(|h| hour_cols[*h].is_none()).collect();
    if !missing_hours.is_empty() {
        warnings.push(Warning::MissingHourSlots {
            hours: missing_hours,
        });
    }

    let mut coercion = Coercion::default();
    let mut drops = DropCounter::default();
    let mut rows: Vec<ClassRow<u64>> = Vec::new();
    for row in data_rows {
        let label = cell_at(row, class_col).as_text();
        if let Some(reason) = label_drop_reason(&label) {
            drops.add(reason);
            continue;
        }
        let mut hours: HourlyCounts = [0; HOURS_PER_DAY];
        for (hour, col) in hour_cols.iter().enumerate() {
            if let Some(col) = col {
                let v = coercion.value(cell_at(row, *col), &header[*col]);
                hours[hour] = (v + 0.5).floor() as u64;
            }
        }
        if hours.iter().all(|v| *v == 0) {
            drops.add(DropReason::AllZeroHours);
            continue;
        }
        rows.push(ClassRow { label, hours });
    }

    warnings.extend(coercion.into_warnings());
    warnings.extend(drops.into_warnings());
    Ok(NormalizedSheet { rows, warnings })
}

pub fn normalize_bulk_sheet(
    grid: &[Vec<Cell>],
    layout: &BulkSheetLayout,
) -> Result<NormalizedSheet<f64>, SheetError> {
    let marker = layout.class_marker.to_lowercase();
    let header_idx = grid
        .iter()
        .position(|row| cell_at(row, 0).as_text().to_lowercase().contains(&marker));
    let header_idx = match header_idx {
        Some(idx) => idx,
        None => {
            return MissingClassMarkerSnafu {
                marker: layout.class_marker.clone(),
            }
            .fail()
        }
    };

    let width = grid.iter().map(|r| r.len()).max().unwrap_or(0);
    if width < layout.min_columns {
        return InsufficientColumnsSnafu {
            found: width,
            required: layout.min_columns,
        }
        .fail();
    }

    let header_row = &grid[header_idx];
    for hour in 0..HOURS_PER_DAY {
        let position = hour + 1;
        let found = cell_at(header_row, position).as_text();
        if parse_hour_label(&found, true) != Some(hour) {
            return HourColumnMismatchSnafu {
                position,
                expected: hour,
                found,
            }
            .fail();
        }
    }
    let header: Vec<String> = (0..width).map(|idx| cell_at(header_row, idx).as_text()).collect();

    let noise: Vec<String> = layout.noise_markers.iter().map(|m| m.to_lowercase()).collect();
    let mut coercion = Coercion::default();
    let mut drops = DropCounter::default();
    let mut rows: Vec<ClassRow<f64>> = Vec::new();
    for row in grid[header_idx + 1..].iter() {
        let is_noise = row.iter().any(|c| {
            let t = c.as_text().to_lowercase();
            noise.iter().any(|m| t.contains(m.as_str()))
        });
        if is_noise {
            drops.add(DropReason::NoiseRow);
            continue;
        }
        let label = cell_at(row, 0).as_text();
        if let Some(reason) = label_drop_reason(&label) {
            drops.add(reason);
            continue;
        }
        let mut hours = [0.0; HOURS_PER_DAY];
        for (hour, slot) in hours.iter_mut().enumerate() {
            *slot = coercion.value(cell_at(row, hour + 1), &header[hour + 1]);
        }
        rows.push(ClassRow { label, hours });
    }
    debug!(
        "normalize_bulk_sheet: header at row {}, {} class rows",
        header_idx,
        rows.len()
    );

    let mut warnings = coercion.into_warnings();
    warnings.extend(drops.into_warnings());
    Ok(NormalizedSheet { rows, warnings })
}

const EMPTY_CELL: Cell = Cell::Empty;

fn cell_at(row: &[Cell], idx: usize) -> &Cell {
    row.get(idx).unwrap_or(&EMPTY_CELL)
}

fn label_drop_reason(label: &str) -> Option<DropReason> {
    let l = label.to_lowercase();
    if l.is_empty() {
        Some(DropReason::BlankLabel)
    } else if l.contains("total") || l.contains("sum") {
        Some(DropReason::SummaryRow)
    } else {
        None
    }
}

// Non-numeric and negative values read as 0, counted per column.
#[derive(Default)]
struct Coercion {
    non_numeric: BTreeMap<String, usize>,
    negative: BTreeMap<String, usize>,
}

impl Coercion {
    fn value(&mut self, cell: &Cell, column: &str) -> f64 {
        if cell.is_blank() {
            return 0.0;
        }
        match cell.as_number() {
            Some(v) if v < 0.0 => {
                *self.negative.entry(column.to_string()).or_insert(0) += 1;
                0.0
            }
            Some(v) => v,
            None => {
                *self.non_numeric.entry(column.to_string()).or_insert(0) += 1;
                0.0
            }
        }
    }

    fn into_warnings(self) -> Vec<Warning> {
        let mut res: Vec<Warning> = self
            .non_numeric
            .into_iter()
            .map(|(column, count)| Warning::NonNumericCells { column, count })
            .collect();
        res.extend(
            self.negative
                .into_iter()
                .map(|(column, count)| Warning::NegativeCounts { column, count }),
        );
        res
    }
}

#[derive(Default)]
struct DropCounter {
    counts: Vec<(DropReason, usize)>,
}

impl DropCounter {
    fn add(&mut self, reason: DropReason) {
        match self.counts.iter_mut().find(|(r, _)| *r == reason) {
            Some((_, n)) => *n += 1,
            None => self.counts.push((reason, 1)),
        }
    }

    fn into_warnings(self) -> Vec<Warning> {
        self.counts
            .into_iter()
            .map(|(reason, count)| Warning::RowsDropped { reason, count })
            .collect()
    }
}
