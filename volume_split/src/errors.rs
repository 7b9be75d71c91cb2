use std::fmt::Display;

use chrono::{NaiveDate, Weekday};
use snafu::Snafu;

use crate::config::{day_name, VehicleClass};

/// A condition that makes one input unit (a sheet or a file) unusable.
///
/// These never abort the sibling units: they are turned into diagnostics.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SheetError {
    #[snafu(display("cannot resolve a calendar date from {text:?}: {reason}"))]
    Format { text: String, reason: String },
    #[snafu(display("no {column:?} column after header promotion"))]
    MissingClassColumn { column: String },
    #[snafu(display("no hour-of-day column in header {header:?}"))]
    MissingHourColumns { header: Vec<String> },
    #[snafu(display("column {position} has an unreadable hour header {found:?}"))]
    UnreadableHourColumn { position: usize, found: String },
    #[snafu(display("hour {hour} appears in two columns ({first:?} and {second:?})"))]
    DuplicateHourColumn {
        hour: usize,
        first: String,
        second: String,
    },
    #[snafu(display("column {position} should hold hour {expected} but its header is {found:?}"))]
    HourColumnMismatch {
        position: usize,
        expected: usize,
        found: String,
    },
    #[snafu(display("no row starts with the {marker:?} marker"))]
    MissingClassMarker { marker: String },
    #[snafu(display("no data rows left after filtering"))]
    EmptySheet {},
    #[snafu(display("sheet has {found} usable columns, at least {required} are needed"))]
    InsufficientColumns { found: usize, required: usize },
    /// The reader could not deliver the cells of the unit.
    #[snafu(display("unreadable: {reason}"))]
    Unreadable { reason: String },
}

/// The reporting family of a [`SheetError`].
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ErrorKind {
    Format,
    Schema,
    EmptySheet,
    InsufficientColumns,
    Unreadable,
}

impl SheetError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SheetError::Format { .. } => ErrorKind::Format,
            SheetError::EmptySheet {} => ErrorKind::EmptySheet,
            SheetError::InsufficientColumns { .. } => ErrorKind::InsufficientColumns,
            SheetError::Unreadable { .. } => ErrorKind::Unreadable,
            SheetError::MissingClassColumn { .. }
            | SheetError::MissingHourColumns { .. }
            | SheetError::UnreadableHourColumn { .. }
            | SheetError::DuplicateHourColumn { .. }
            | SheetError::HourColumnMismatch { .. }
            | SheetError::MissingClassMarker { .. } => ErrorKind::Schema,
        }
    }
}

/// Errors that abort a whole phase of the run.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PipelineError {
    #[snafu(display("no usable weekly sample data ({skipped} units skipped)"))]
    NoWeeklyData { skipped: usize },
    #[snafu(display("no usable monthly bulk data ({skipped} units skipped)"))]
    NoMonthlyData { skipped: usize },
    #[snafu(display("none of the {sheets} bulk sheets could be converted to a calendar date"))]
    DateConversion { sheets: usize },
    #[snafu(display("invalid checkpoint registry: {reason}"))]
    InvalidRegistry { reason: String },
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum DropReason {
    BlankLabel,
    SummaryRow,
    AllZeroHours,
    NoiseRow,
}

impl Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DropReason::BlankLabel => "blank vehicle class",
            DropReason::SummaryRow => "total/sum row",
            DropReason::AllZeroHours => "all hours zero",
            DropReason::NoiseRow => "sub-header row",
        };
        write!(f, "{}", s)
    }
}

/// Everything that was skipped, dropped or degraded while processing.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// The whole unit was skipped.
    Skipped(SheetError),
    NonNumericCells { column: String, count: usize },
    NegativeCounts { column: String, count: usize },
    RowsDropped { reason: DropReason, count: usize },
    UnmappedVehicleClass { label: String, rows: usize },
    MissingHourSlots { hours: Vec<usize> },
    PositionalFallback { sheet: String, checkpoint: String },
    DuplicateCheckpointSheet { sheet: String, checkpoint: String },
    MissingCheckpointSheets { found: usize, expected: usize },
    CheckpointWithoutSheet { checkpoint: String },
    ExtraSheetIgnored { sheet: String },
    DuplicateDate { date: NaiveDate },
    IncompleteWeekday {
        day: Weekday,
        dates: usize,
        expected: u32,
    },
    NoProportion {
        date: NaiveDate,
        vehicle_class: VehicleClass,
    },
    UnknownExcluded { records: usize },
}

impl Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::Skipped(e) => write!(f, "skipped: {}", e),
            Warning::NonNumericCells { column, count } => write!(
                f,
                "column {:?}: {} non-numeric cells replaced by 0",
                column, count
            ),
            Warning::NegativeCounts { column, count } => write!(
                f,
                "column {:?}: {} negative counts replaced by 0",
                column, count
            ),
            Warning::RowsDropped { reason, count } => {
                write!(f, "{} rows dropped ({})", count, reason)
            }
            Warning::UnmappedVehicleClass { label, rows } => write!(
                f,
                "vehicle class {:?} is not mapped, {} rows dropped",
                label, rows
            ),
            Warning::MissingHourSlots { hours } => {
                write!(f, "no column for hours {:?}, read as 0", hours)
            }
            Warning::PositionalFallback { sheet, checkpoint } => write!(
                f,
                "sheet {:?} does not follow the naming pattern, assigned to {} by position",
                sheet, checkpoint
            ),
            Warning::DuplicateCheckpointSheet { sheet, checkpoint } => write!(
                f,
                "sheet {:?} ignored, {} already has a sheet",
                sheet, checkpoint
            ),
            Warning::MissingCheckpointSheets { found, expected } => {
                write!(f, "only {} sheets found, {} expected", found, expected)
            }
            Warning::CheckpointWithoutSheet { checkpoint } => {
                write!(f, "no sheet was assigned to {}", checkpoint)
            }
            Warning::ExtraSheetIgnored { sheet } => {
                write!(f, "sheet {:?} matches no checkpoint, ignored", sheet)
            }
            Warning::DuplicateDate { date } => {
                write!(f, "date {} was already provided, counts are added", date)
            }
            Warning::IncompleteWeekday {
                day,
                dates,
                expected,
            } => write!(
                f,
                "{} has {} sampled dates, {} expected",
                day_name(*day),
                dates,
                expected
            ),
            Warning::NoProportion {
                date,
                vehicle_class,
            } => write!(
                f,
                "no proportion for {} on {} ({}), no estimate produced",
                vehicle_class,
                date.format("%d-%m-%Y"),
                day_name(chrono::Datelike::weekday(date))
            ),
            Warning::UnknownExcluded { records } => write!(
                f,
                "{} bulk records of class Unknown excluded from the estimates",
                records
            ),
        }
    }
}

/// A warning attached to the input unit it comes from.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub unit: String,
    pub warning: Warning,
}

impl Diagnostic {
    pub fn new(unit: &str, warning: Warning) -> Diagnostic {
        Diagnostic {
            unit: unit.to_string(),
            warning,
        }
    }

    /// True when the whole unit was dropped.
    pub fn is_skip(&self) -> bool {
        matches!(self.warning, Warning::Skipped(_))
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.unit, self.warning)
    }
}
