use chrono::NaiveDate;
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};

use crate::classes::{map_class_rows, ClassMapping};
use crate::config::*;
use crate::errors::*;
use crate::normalize::{normalize_bulk_sheet, normalize_checkpoint_sheet};

/// The weekly sample records, ready for the proportion estimator.
#[derive(PartialEq, Debug, Clone)]
pub struct WeeklySamples {
    /// Ordered by date, checkpoint and class.
    pub records: Vec<CheckpointRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Stages the sheets of the sampling weeks, one unit (workbook) per calendar date.
///
/// A unit or a sheet that cannot be used is recorded as a diagnostic and the
/// other units are still processed.
pub struct WeeklyBuilder {
    pub(crate) _registry: CheckpointRegistry,
    pub(crate) _mapping: ClassMapping,
    pub(crate) _layout: CheckpointSheetLayout,
    pub(crate) _records: Vec<CheckpointRecord>,
    pub(crate) _dates: BTreeSet<NaiveDate>,
    pub(crate) _diagnostics: Vec<Diagnostic>,
}

impl WeeklyBuilder {
    pub fn new(
        registry: &CheckpointRegistry,
        mapping: &ClassMapping,
        layout: &CheckpointSheetLayout,
    ) -> WeeklyBuilder {
        WeeklyBuilder {
            _registry: registry.clone(),
            _mapping: mapping.clone(),
            _layout: layout.clone(),
            _records: Vec::new(),
            _dates: BTreeSet::new(),
            _diagnostics: Vec::new(),
        }
    }

    /// Adds the sheets (name, grid) of the workbook sampled on `date`.
    ///
    /// Returns the number of records produced by the unit.
    pub fn add_unit(&mut self, label: &str, date: NaiveDate, sheets: &[(String, Grid)]) -> usize {
        if !self._dates.insert(date) {
            push_diagnostic(&mut self._diagnostics, label, Warning::DuplicateDate { date });
        }
        let assignment = self.assign_sheets(label, sheets);
        let mut produced = 0;
        for (cid, sheet_idx) in assignment {
            let (sheet_name, grid) = &sheets[sheet_idx];
            let unit = format!("{}/{}", label, sheet_name);
            produced += self.add_checkpoint_sheet(&unit, cid, date, grid);
        }
        debug!(
            "add_unit: {} ({}) produced {} records",
            label, date, produced
        );
        produced
    }

    /// Records a unit that could not be read at all.
    pub fn skip_unit(&mut self, label: &str, error: SheetError) {
        push_diagnostic(&mut self._diagnostics, label, Warning::Skipped(error));
    }

    pub fn finish(self) -> Result<WeeklySamples, PipelineError> {
        let skipped = self._diagnostics.iter().filter(|d| d.is_skip()).count();
        if self._records.is_empty() {
            return NoWeeklyDataSnafu { skipped }.fail();
        }
        let mut records = self._records;
        records.sort_by_key(|r| (r.date, r.checkpoint, r.vehicle_class));
        info!(
            "weekly samples: {} records over {} dates, {} units skipped",
            records.len(),
            self._dates.len(),
            skipped
        );
        Ok(WeeklySamples {
            records,
            diagnostics: self._diagnostics,
        })
    }

    // Explicit names first. Unresolved sheets then take the checkpoint at their
    // position, when it is still free.
    fn assign_sheets(&mut self, label: &str, sheets: &[(String, Grid)]) -> Vec<(CheckpointId, usize)> {
        let n = self._registry.len();
        let mut slots: Vec<Option<usize>> = vec![None; n];
        let mut unresolved: Vec<usize> = Vec::new();
        for (idx, (name, _)) in sheets.iter().enumerate() {
            match self._registry.match_sheet_name(name) {
                Some(cid) if slots[cid.0].is_none() => slots[cid.0] = Some(idx),
                Some(cid) => push_diagnostic(
                    &mut self._diagnostics,
                    label,
                    Warning::DuplicateCheckpointSheet {
                        sheet: name.clone(),
                        checkpoint: self._registry.name(cid),
                    },
                ),
                None => unresolved.push(idx),
            }
        }
        for idx in unresolved {
            let sheet = sheets[idx].0.clone();
            if idx < n && slots[idx].is_none() {
                slots[idx] = Some(idx);
                let checkpoint = self._registry.name(CheckpointId(idx));
                push_diagnostic(
                    &mut self._diagnostics,
                    label,
                    Warning::PositionalFallback { sheet, checkpoint },
                );
            } else {
                push_diagnostic(
                    &mut self._diagnostics,
                    label,
                    Warning::ExtraSheetIgnored { sheet },
                );
            }
        }
        if sheets.len() < n {
            push_diagnostic(
                &mut self._diagnostics,
                label,
                Warning::MissingCheckpointSheets {
                    found: sheets.len(),
                    expected: n,
                },
            );
        }
        for (cidx, slot) in slots.iter().enumerate() {
            if slot.is_none() {
                push_diagnostic(
                    &mut self._diagnostics,
                    label,
                    Warning::CheckpointWithoutSheet {
                        checkpoint: self._registry.name(CheckpointId(cidx)),
                    },
                );
            }
        }
        slots
            .into_iter()
            .enumerate()
            .filter_map(|(cidx, sheet)| sheet.map(|s| (CheckpointId(cidx), s)))
            .collect()
    }

    fn add_checkpoint_sheet(
        &mut self,
        unit: &str,
        checkpoint: CheckpointId,
        date: NaiveDate,
        grid: &[Vec<Cell>],
    ) -> usize {
        let sheet = match normalize_checkpoint_sheet(grid, &self._layout) {
            Ok(s) => s,
            Err(e) => {
                push_diagnostic(&mut self._diagnostics, unit, Warning::Skipped(e));
                return 0;
            }
        };
        let mapped = map_class_rows(&sheet.rows, &self._mapping);
        for w in sheet.warnings.into_iter().chain(mapped.warnings.into_iter()) {
            push_diagnostic(&mut self._diagnostics, unit, w);
        }
        if mapped.classes.is_empty() {
            push_diagnostic(
                &mut self._diagnostics,
                unit,
                Warning::Skipped(SheetError::EmptySheet {}),
            );
            return 0;
        }
        let count = mapped.classes.len();
        for (vehicle_class, hourly_counts) in mapped.classes {
            self._records.push(CheckpointRecord {
                checkpoint,
                date,
                vehicle_class,
                hourly_counts,
            });
        }
        count
    }
}

/// The bulk daily records of the month, ready for the disaggregator.
#[derive(PartialEq, Debug, Clone)]
pub struct BulkSamples {
    /// Ordered by date and class.
    pub records: Vec<BulkDailyRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Stages the daily sheets of the monthly bulk workbook.
///
/// ```
/// use chrono::NaiveDate;
/// use volume_split::builder::BulkBuilder;
/// use volume_split::{BulkSheetLayout, Cell, ClassMapping, PipelineError, VehicleClass};
///
/// let mapping = ClassMapping::from_pairs(&[("Bus", VehicleClass::Bus)]);
/// let mut builder = BulkBuilder::new(&mapping, &BulkSheetLayout::default());
///
/// let mut header = vec![Cell::String("Jenis Kendaraan".to_string())];
/// header.extend((0..24).map(|h| Cell::String(format!("{:02}:00", h))));
/// let mut bus = vec![Cell::String("Bus".to_string())];
/// bus.extend((0..24).map(|_| Cell::Float(2.0)));
///
/// builder.add_day_sheet("3", 2024, 7, &[header, bus]);
/// builder.add_day_sheet("Rekap", 2024, 7, &[]);
///
/// let samples = builder.finish()?;
/// assert_eq!(samples.records.len(), 1);
/// assert_eq!(samples.records[0].date, NaiveDate::from_ymd_opt(2024, 7, 3).unwrap());
/// assert_eq!(samples.records[0].total(), 48.0);
/// assert_eq!(samples.diagnostics.len(), 1);
///
/// # Ok::<(), PipelineError>(())
/// ```
pub struct BulkBuilder {
    pub(crate) _mapping: ClassMapping,
    pub(crate) _layout: BulkSheetLayout,
    pub(crate) _sums: BTreeMap<(NaiveDate, VehicleClass), [f64; HOURS_PER_DAY]>,
    pub(crate) _dates: BTreeSet<NaiveDate>,
    pub(crate) _offered: usize,
    pub(crate) _undated: usize,
    pub(crate) _diagnostics: Vec<Diagnostic>,
}

impl BulkBuilder {
    pub fn new(mapping: &ClassMapping, layout: &BulkSheetLayout) -> BulkBuilder {
        BulkBuilder {
            _mapping: mapping.clone(),
            _layout: layout.clone(),
            _sums: BTreeMap::new(),
            _dates: BTreeSet::new(),
            _offered: 0,
            _undated: 0,
            _diagnostics: Vec::new(),
        }
    }

    /// Adds the sheet holding the counts of `date`. Returns the number of classes read.
    pub fn add_sheet(&mut self, label: &str, date: NaiveDate, grid: &[Vec<Cell>]) -> usize {
        self._offered += 1;
        let sheet = match normalize_bulk_sheet(grid, &self._layout) {
            Ok(s) => s,
            Err(e) => {
                push_diagnostic(&mut self._diagnostics, label, Warning::Skipped(e));
                return 0;
            }
        };
        let mapped = map_class_rows(&sheet.rows, &self._mapping);
        for w in sheet.warnings.into_iter().chain(mapped.warnings.into_iter()) {
            push_diagnostic(&mut self._diagnostics, label, w);
        }
        if mapped.classes.is_empty() {
            push_diagnostic(
                &mut self._diagnostics,
                label,
                Warning::Skipped(SheetError::EmptySheet {}),
            );
            return 0;
        }
        if !self._dates.insert(date) {
            push_diagnostic(&mut self._diagnostics, label, Warning::DuplicateDate { date });
        }
        let count = mapped.classes.len();
        for (vc, hours) in mapped.classes {
            let acc = self
                ._sums
                .entry((date, vc))
                .or_insert([0.0; HOURS_PER_DAY]);
            for (slot, v) in acc.iter_mut().zip(hours.iter()) {
                *slot += *v;
            }
        }
        debug!("add_sheet: {} ({}) read {} classes", label, date, count);
        count
    }

    /// Adds a sheet named by its day of month.
    pub fn add_day_sheet(
        &mut self,
        sheet_name: &str,
        year: i32,
        month: u32,
        grid: &[Vec<Cell>],
    ) -> usize {
        match day_sheet_date(sheet_name, year, month) {
            Ok(date) => self.add_sheet(sheet_name, date, grid),
            Err(e) => {
                self.skip_unit(sheet_name, e);
                0
            }
        }
    }

    pub fn skip_unit(&mut self, label: &str, error: SheetError) {
        self._offered += 1;
        if error.kind() == ErrorKind::Format {
            self._undated += 1;
        }
        push_diagnostic(&mut self._diagnostics, label, Warning::Skipped(error));
    }

    pub fn finish(self) -> Result<BulkSamples, PipelineError> {
        if self._offered > 0 && self._undated == self._offered {
            return DateConversionSnafu {
                sheets: self._offered,
            }
            .fail();
        }
        let skipped = self._diagnostics.iter().filter(|d| d.is_skip()).count();
        if self._sums.is_empty() {
            return NoMonthlyDataSnafu { skipped }.fail();
        }
        let records: Vec<BulkDailyRecord> = self
            ._sums
            .into_iter()
            .map(|((date, vehicle_class), hourly_counts)| BulkDailyRecord {
                date,
                vehicle_class,
                hourly_counts,
            })
            .collect();
        info!(
            "bulk samples: {} records over {} dates, {} sheets skipped",
            records.len(),
            self._dates.len(),
            skipped
        );
        Ok(BulkSamples {
            records,
            diagnostics: self._diagnostics,
        })
    }
}

pub(crate) fn push_diagnostic(diagnostics: &mut Vec<Diagnostic>, unit: &str, warning: Warning) {
    let d = Diagnostic::new(unit, warning);
    warn!("{}", d);
    diagnostics.push(d);
}

/// Reads the calendar date of a weekly unit.
pub fn parse_unit_date(text: &str) -> Result<NaiveDate, SheetError> {
    let t = text.trim();
    for fmt in ["%d-%m-%Y", "%d/%m/%Y", "%Y-%m-%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(t, fmt) {
            return Ok(d);
        }
    }
    FormatSnafu {
        text: t,
        reason: "expected dd-mm-YYYY, dd/mm/YYYY or YYYY-mm-dd",
    }
    .fail()
}

/// The date of a bulk sheet named by its day of month (`"1"` to `"31"`).
pub fn day_sheet_date(sheet_name: &str, year: i32, month: u32) -> Result<NaiveDate, SheetError> {
    let t = sheet_name.trim();
    let day = match t.parse::<u32>() {
        Ok(d) => d,
        Err(_) => {
            return FormatSnafu {
                text: t,
                reason: "not a day of month",
            }
            .fail()
        }
    };
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(d) => Ok(d),
        None => FormatSnafu {
            text: t,
            reason: format!("day {} does not exist in {}-{:02}", day, year, month),
        }
        .fail(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(x: &str) -> Cell {
        Cell::String(x.to_string())
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    fn registry() -> CheckpointRegistry {
        CheckpointRegistry::new(vec![
            Checkpoint::new("diponegoro", Direction::Outbound),
            Checkpoint::new("imam bonjol", Direction::Internal),
            Checkpoint::new("a yani", Direction::Internal),
        ])
        .unwrap()
    }

    fn weekly_mapping() -> ClassMapping {
        ClassMapping::from_pairs(&[
            ("Sedan", VehicleClass::FourWheeler),
            ("Minivan", VehicleClass::FourWheeler),
            ("Bus", VehicleClass::Bus),
        ])
    }

    fn camera_sheet(rows: &[(&str, f64)]) -> Grid {
        let mut header = vec![Cell::Empty, Cell::Empty];
        header.extend((0..24).map(|h| s(&format!("{:02}:00", h))));
        let mut grid = vec![vec![s("title")], vec![], vec![], header];
        for (idx, (label, v)) in rows.iter().enumerate() {
            let mut row = vec![Cell::Int(idx as i64 + 1), s(label)];
            row.extend((0..24).map(|_| Cell::Float(*v)));
            grid.push(row);
        }
        grid
    }

    fn builder() -> WeeklyBuilder {
        WeeklyBuilder::new(
            &registry(),
            &weekly_mapping(),
            &CheckpointSheetLayout::default(),
        )
    }

    #[test]
    fn sheets_resolve_by_name_then_position() {
        let mut b = builder();
        let sheets = vec![
            ("3. 1 juli".to_string(), camera_sheet(&[("Bus", 1.0)])),
            ("Sheet2".to_string(), camera_sheet(&[("Sedan", 2.0), ("Minivan", 1.0)])),
            ("1. 1 juli".to_string(), camera_sheet(&[("Bus", 3.0)])),
        ];
        assert_eq!(b.add_unit("1 juli", date(1), &sheets), 3);
        let res = b.finish().unwrap();
        let keys: Vec<(usize, VehicleClass)> = res
            .records
            .iter()
            .map(|r| (r.checkpoint.0, r.vehicle_class))
            .collect();
        assert_eq!(
            keys,
            vec![
                (0, VehicleClass::Bus),
                (1, VehicleClass::FourWheeler),
                (2, VehicleClass::Bus)
            ]
        );
        assert_eq!(res.records[0].hourly_counts[0], 3);
        assert_eq!(res.records[1].total(), 72);
        assert_eq!(
            res.diagnostics,
            vec![Diagnostic::new(
                "1 juli",
                Warning::PositionalFallback {
                    sheet: "Sheet2".to_string(),
                    checkpoint: "imam bonjol".to_string()
                }
            )]
        );
    }

    #[test]
    fn taken_slots_are_not_reassigned() {
        let mut b = builder();
        let sheets = vec![
            ("Sheet1".to_string(), camera_sheet(&[("Bus", 1.0)])),
            ("1. 2 juli".to_string(), camera_sheet(&[("Bus", 2.0)])),
            ("1) again".to_string(), camera_sheet(&[("Bus", 4.0)])),
        ];
        assert_eq!(b.add_unit("2 juli", date(2), &sheets), 1);
        let res = b.finish().unwrap();
        assert_eq!(res.records[0].hourly_counts[5], 2);
        let warnings: Vec<&Warning> = res.diagnostics.iter().map(|d| &d.warning).collect();
        assert!(matches!(warnings[0], Warning::DuplicateCheckpointSheet { .. }));
        assert!(matches!(warnings[1], Warning::ExtraSheetIgnored { .. }));
        let uncovered: Vec<&Warning> = warnings[2..].to_vec();
        assert_eq!(
            uncovered,
            vec![
                &Warning::CheckpointWithoutSheet {
                    checkpoint: "imam bonjol".to_string()
                },
                &Warning::CheckpointWithoutSheet {
                    checkpoint: "a yani".to_string()
                },
            ]
        );
    }

    #[test]
    fn faulty_sheets_are_isolated() {
        let mut b = builder();
        let sheets = vec![
            ("1. 1 juli".to_string(), camera_sheet(&[("Bus", 1.0)])),
            ("2. 1 juli".to_string(), vec![vec![s("broken")]]),
        ];
        b.add_unit("1 juli", date(1), &sheets);
        b.skip_unit(
            "2 juli",
            SheetError::Format {
                text: "??".to_string(),
                reason: "no date".to_string(),
            },
        );
        let res = b.finish().unwrap();
        assert_eq!(res.records.len(), 1);
        let skips: Vec<&str> = res
            .diagnostics
            .iter()
            .filter(|d| d.is_skip())
            .map(|d| d.unit.as_str())
            .collect();
        assert_eq!(skips, vec!["1 juli/2. 1 juli", "2 juli"]);
        assert!(res.diagnostics.iter().any(|d| matches!(
            d.warning,
            Warning::MissingCheckpointSheets {
                found: 2,
                expected: 3
            }
        )));
    }

    #[test]
    fn no_weekly_record_is_fatal() {
        let mut b = builder();
        let sheets = vec![("1. x".to_string(), camera_sheet(&[("Tank", 1.0)]))];
        b.add_unit("1 juli", date(1), &sheets);
        assert_eq!(b.finish(), Err(PipelineError::NoWeeklyData { skipped: 1 }));
    }

    fn bulk_sheet(rows: &[(&str, f64)]) -> Grid {
        let mut header = vec![s("Jenis Kendaraan")];
        header.extend((0..24).map(|h| s(&format!("{:02}:00", h))));
        let mut grid = vec![header];
        for (label, v) in rows.iter() {
            let mut row = vec![s(label)];
            row.extend((0..24).map(|_| Cell::Float(*v)));
            grid.push(row);
        }
        grid
    }

    fn monthly_mapping() -> ClassMapping {
        ClassMapping::from_pairs(&[
            ("Truk", VehicleClass::Truck),
            ("Light Truck", VehicleClass::Truck),
            ("Unknown", VehicleClass::Unknown),
        ])
    }

    #[test]
    fn bulk_records_are_summed_per_date_and_class() {
        let mut b = BulkBuilder::new(&monthly_mapping(), &BulkSheetLayout::default());
        b.add_day_sheet("1", 2024, 7, &bulk_sheet(&[("Truk", 1.0), ("Light Truck", 0.5)]));
        b.add_day_sheet("2", 2024, 7, &bulk_sheet(&[("Unknown", 3.0)]));
        b.add_day_sheet("32", 2024, 7, &bulk_sheet(&[("Truk", 1.0)]));
        let res = b.finish().unwrap();
        assert_eq!(res.records.len(), 2);
        assert_eq!(res.records[0].vehicle_class, VehicleClass::Truck);
        assert_eq!(res.records[0].hourly_counts[0], 1.5);
        assert_eq!(res.records[1].vehicle_class, VehicleClass::Unknown);
        assert_eq!(res.diagnostics.len(), 1);
        assert!(matches!(
            &res.diagnostics[0].warning,
            Warning::Skipped(SheetError::Format { .. })
        ));
    }

    #[test]
    fn bulk_batch_errors() {
        let mut b = BulkBuilder::new(&monthly_mapping(), &BulkSheetLayout::default());
        b.add_day_sheet("Sheet1", 2024, 7, &bulk_sheet(&[("Truk", 1.0)]));
        b.add_day_sheet("juli", 2024, 7, &bulk_sheet(&[("Truk", 1.0)]));
        assert_eq!(b.finish(), Err(PipelineError::DateConversion { sheets: 2 }));

        let mut b = BulkBuilder::new(&monthly_mapping(), &BulkSheetLayout::default());
        b.add_day_sheet("1", 2024, 7, &vec![vec![s("nothing here")]]);
        assert_eq!(b.finish(), Err(PipelineError::NoMonthlyData { skipped: 1 }));
    }

    #[test]
    fn unit_dates() {
        assert_eq!(parse_unit_date("01-07-2024"), Ok(date(1)));
        assert_eq!(parse_unit_date("2/7/2024"), Ok(date(2)));
        assert_eq!(parse_unit_date(" 2024-07-03 "), Ok(date(3)));
        assert!(matches!(
            parse_unit_date("1 juli"),
            Err(SheetError::Format { .. })
        ));
        assert_eq!(day_sheet_date("31", 2024, 7), Ok(date(31)));
        assert!(day_sheet_date("31", 2024, 6).is_err());
    }
}
