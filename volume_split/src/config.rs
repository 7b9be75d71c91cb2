// ********* Input data structures ***********

use std::collections::HashSet;
use std::fmt::Display;
use std::str::FromStr;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::errors::*;

/// The number of hour-of-day slots in every record.
pub const HOURS_PER_DAY: usize = 24;

/// Hourly vehicle counts, indexed by hour of day.
pub type HourlyCounts = [u64; HOURS_PER_DAY];

/// One cell of a raw, header-less sheet, as handed over by the spreadsheet reader.
#[derive(PartialEq, Debug, Clone)]
pub enum Cell {
    Empty,
    String(String),
    Float(f64),
    Int(i64),
    Bool(bool),
    /// A serial date-time. The fractional part is the time of day.
    DateTime(f64),
    Error(String),
}

/// A rectangular (possibly ragged) grid of cells with no header.
pub type Grid = Vec<Vec<Cell>>;

impl Cell {
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// The text used when matching labels, markers and headers.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::String(s) => s.trim().to_string(),
            Cell::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
            Cell::Float(f) => f.to_string(),
            Cell::Int(i) => i.to_string(),
            Cell::Bool(b) => b.to_string(),
            Cell::DateTime(f) => time_of_day_label(*f),
            Cell::Error(e) => e.clone(),
        }
    }

    /// The numeric value of the cell. Text holding a number is accepted.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Float(f) if f.is_finite() => Some(*f),
            Cell::Int(i) => Some(*i as f64),
            Cell::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }
}

// Renders the fractional part of a serial date-time as HH:MM:SS.
fn time_of_day_label(serial: f64) -> String {
    let seconds = (serial.fract().abs() * 86_400.0).round() as u32 % 86_400;
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// The canonical vehicle classes shared by the weekly and the monthly inputs.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum VehicleClass {
    #[serde(rename = "Bus")]
    Bus,
    #[serde(rename = "Truck")]
    Truck,
    #[serde(rename = "Pick-up")]
    PickUp,
    /// 4-wheeled passenger vehicles.
    #[serde(rename = "Roda 4")]
    FourWheeler,
    /// Three-wheelers.
    #[serde(rename = "Tossa")]
    ThreeWheeler,
    #[serde(rename = "Sepeda motor")]
    Motorcycle,
    #[serde(rename = "Pejalan kaki")]
    Pedestrian,
    /// Explicit bucket of the monthly inputs. Never part of the final estimates.
    #[serde(rename = "Unknown")]
    Unknown,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 8] = [
        VehicleClass::Bus,
        VehicleClass::Truck,
        VehicleClass::PickUp,
        VehicleClass::FourWheeler,
        VehicleClass::ThreeWheeler,
        VehicleClass::Motorcycle,
        VehicleClass::Pedestrian,
        VehicleClass::Unknown,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            VehicleClass::Bus => "Bus",
            VehicleClass::Truck => "Truck",
            VehicleClass::PickUp => "Pick-up",
            VehicleClass::FourWheeler => "Roda 4",
            VehicleClass::ThreeWheeler => "Tossa",
            VehicleClass::Motorcycle => "Sepeda motor",
            VehicleClass::Pedestrian => "Pejalan kaki",
            VehicleClass::Unknown => "Unknown",
        }
    }
}

impl Display for VehicleClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for VehicleClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        VehicleClass::ALL
            .iter()
            .find(|vc| vc.name().to_lowercase() == wanted)
            .copied()
            .ok_or_else(|| format!("unknown vehicle class {:?}", s))
    }
}

/// Static traffic direction of a checkpoint. Only used for reporting aggregates.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
    Internal,
}

impl Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
            Direction::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

/// The position of a checkpoint in the registry (0-based).
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct CheckpointId(pub usize);

impl CheckpointId {
    /// The 1-based ordinal used by the sheet naming convention.
    pub fn ordinal(&self) -> usize {
        self.0 + 1
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Checkpoint {
    pub name: String,
    pub direction: Direction,
}

impl Checkpoint {
    pub fn new(name: &str, direction: Direction) -> Checkpoint {
        Checkpoint {
            name: name.to_string(),
            direction,
        }
    }
}

/// The ordered set of checkpoints of a deployment.
///
/// The order must follow the ordinal convention used by the sheet names of the
/// weekly workbooks (`1. ...`, `2. ...`).
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CheckpointRegistry {
    checkpoints: Vec<Checkpoint>,
}

impl CheckpointRegistry {
    pub fn new(checkpoints: Vec<Checkpoint>) -> Result<CheckpointRegistry, PipelineError> {
        if checkpoints.is_empty() {
            return InvalidRegistrySnafu {
                reason: "no checkpoint declared",
            }
            .fail();
        }
        let mut seen: HashSet<String> = HashSet::new();
        for c in checkpoints.iter() {
            let key = c.name.trim().to_lowercase();
            if key.is_empty() {
                return InvalidRegistrySnafu {
                    reason: "empty checkpoint name",
                }
                .fail();
            }
            if !seen.insert(key) {
                return InvalidRegistrySnafu {
                    reason: format!("checkpoint {:?} declared twice", c.name),
                }
                .fail();
            }
        }
        Ok(CheckpointRegistry { checkpoints })
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = CheckpointId> {
        (0..self.checkpoints.len()).map(CheckpointId)
    }

    pub fn get(&self, id: CheckpointId) -> Option<&Checkpoint> {
        self.checkpoints.get(id.0)
    }

    /// The name of the checkpoint, or a placeholder for an id outside the registry.
    pub fn name(&self, id: CheckpointId) -> String {
        self.get(id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| format!("checkpoint_{}", id.ordinal()))
    }

    pub fn by_name(&self, name: &str) -> Option<CheckpointId> {
        let wanted = name.trim().to_lowercase();
        self.checkpoints
            .iter()
            .position(|c| c.name.trim().to_lowercase() == wanted)
            .map(CheckpointId)
    }

    pub fn by_ordinal(&self, ordinal: usize) -> Option<CheckpointId> {
        if ordinal >= 1 && ordinal <= self.checkpoints.len() {
            Some(CheckpointId(ordinal - 1))
        } else {
            None
        }
    }

    /// Resolves a sheet name of the weekly workbooks to a checkpoint.
    ///
    /// Accepted: an ordinal prefix (`"3. 23 juli"`, `"3) a yani"`) or the checkpoint name
    /// itself. Anything else is left for the positional fallback of the caller.
    pub fn match_sheet_name(&self, sheet_name: &str) -> Option<CheckpointId> {
        let trimmed = sheet_name.trim();
        let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() {
            let rest = &trimmed[digits.len()..];
            if rest.starts_with('.') || rest.starts_with(')') {
                if let Ok(ordinal) = digits.parse::<usize>() {
                    return self.by_ordinal(ordinal);
                }
            }
        }
        self.by_name(trimmed)
    }
}

// ********* Records ***********

/// Hourly counts of one vehicle class at one checkpoint on one sampled date.
#[derive(PartialEq, Debug, Clone)]
pub struct CheckpointRecord {
    pub checkpoint: CheckpointId,
    pub date: NaiveDate,
    pub vehicle_class: VehicleClass,
    pub hourly_counts: HourlyCounts,
}

impl CheckpointRecord {
    pub fn total(&self) -> u64 {
        self.hourly_counts.iter().sum()
    }
}

/// The bulk (checkpoint-unresolved) counts of one vehicle class on one date.
#[derive(PartialEq, Debug, Clone)]
pub struct BulkDailyRecord {
    pub date: NaiveDate,
    pub vehicle_class: VehicleClass,
    pub hourly_counts: [f64; HOURS_PER_DAY],
}

impl BulkDailyRecord {
    pub fn total(&self) -> f64 {
        self.hourly_counts.iter().sum()
    }
}

/// The share of a vehicle class volume observed at one checkpoint on a weekday.
#[derive(PartialEq, Debug, Clone)]
pub struct ProportionEntry {
    pub day_of_week: Weekday,
    pub checkpoint: CheckpointId,
    pub vehicle_class: VehicleClass,
    /// Daily volume of this checkpoint (after aggregation over sampled weeks).
    pub total: f64,
    /// Daily volume of this class over all the checkpoints.
    pub class_total: f64,
    pub share: f64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct EstimatedRecord {
    pub date: NaiveDate,
    pub checkpoint: CheckpointId,
    pub vehicle_class: VehicleClass,
    pub hourly_counts: HourlyCounts,
}

impl EstimatedRecord {
    pub fn total(&self) -> u64 {
        self.hourly_counts.iter().sum()
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct MissingCombination {
    pub date: NaiveDate,
    pub checkpoint: CheckpointId,
    pub vehicle_class: VehicleClass,
}

/// A bulk record that found no proportion for its weekday and class.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct JoinMiss {
    pub date: NaiveDate,
    pub vehicle_class: VehicleClass,
}

/// The English name of the day, as used in the proportion tables.
pub fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

// ********* Configuration **********

/// Layout of the sheets exported by the checkpoint cameras.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CheckpointSheetLayout {
    /// Rows of title material above the header.
    pub preamble_rows: usize,
    /// Marker of the summary section that ends the class table.
    pub terminator_marker: String,
    pub index_header: String,
    pub class_header: String,
}

impl Default for CheckpointSheetLayout {
    fn default() -> Self {
        CheckpointSheetLayout {
            preamble_rows: 3,
            terminator_marker: "vehicle type".to_string(),
            index_header: "index".to_string(),
            class_header: "vehicle class".to_string(),
        }
    }
}

/// Layout of the sheets of the monthly bulk workbook.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BulkSheetLayout {
    /// Text in the first column of the header row.
    pub class_marker: String,
    /// Rows holding any of these (case-insensitive) are sub-headers, not data.
    pub noise_markers: Vec<String>,
    /// Class column plus the 24 hour columns.
    pub min_columns: usize,
}

impl Default for BulkSheetLayout {
    fn default() -> Self {
        BulkSheetLayout {
            class_marker: "jenis kendaraan".to_string(),
            noise_markers: vec!["arah".to_string(), "keterangan".to_string(), ":".to_string()],
            min_columns: HOURS_PER_DAY + 1,
        }
    }
}

/// How the samples of the same weekday over several weeks are combined.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum AggregationStrategy {
    Sum,
    Mean,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct EstimatorSettings {
    pub sampled_weeks: u32,
    pub aggregation: AggregationStrategy,
}

impl EstimatorSettings {
    /// Sum for a single sampled week, mean as soon as weekdays repeat.
    pub fn for_weeks(sampled_weeks: u32) -> EstimatorSettings {
        EstimatorSettings {
            sampled_weeks,
            aggregation: if sampled_weeks <= 1 {
                AggregationStrategy::Sum
            } else {
                AggregationStrategy::Mean
            },
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum RoundingMode {
    HalfUp,
    Truncate,
}

/// Missing-count limits for the severity of a checkpoint in the audit.
/// A level applies when the count is strictly above its limit.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct SeverityThresholds {
    pub high: usize,
    pub medium: usize,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        SeverityThresholds {
            high: 50,
            medium: 20,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SplitRules {
    pub checkpoint_layout: CheckpointSheetLayout,
    pub bulk_layout: BulkSheetLayout,
    pub estimator: EstimatorSettings,
    pub rounding: RoundingMode,
    pub severity: SeverityThresholds,
}

impl Default for SplitRules {
    fn default() -> Self {
        SplitRules {
            checkpoint_layout: CheckpointSheetLayout::default(),
            bulk_layout: BulkSheetLayout::default(),
            estimator: EstimatorSettings::for_weeks(1),
            rounding: RoundingMode::HalfUp,
            severity: SeverityThresholds::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CheckpointRegistry {
        CheckpointRegistry::new(vec![
            Checkpoint::new("diponegoro", Direction::Outbound),
            Checkpoint::new("imam bonjol", Direction::Internal),
            Checkpoint::new("a yani", Direction::Internal),
        ])
        .unwrap()
    }

    #[test]
    fn registry_rejects_duplicates() {
        let res = CheckpointRegistry::new(vec![
            Checkpoint::new("brantas", Direction::Inbound),
            Checkpoint::new(" Brantas", Direction::Inbound),
        ]);
        assert!(matches!(res, Err(PipelineError::InvalidRegistry { .. })));
        assert!(CheckpointRegistry::new(vec![]).is_err());
    }

    #[test]
    fn sheet_names_resolve_by_ordinal_or_name() {
        let r = registry();
        assert_eq!(r.match_sheet_name("2. 23 juli"), Some(CheckpointId(1)));
        assert_eq!(r.match_sheet_name("3) anything"), Some(CheckpointId(2)));
        assert_eq!(r.match_sheet_name("A Yani"), Some(CheckpointId(2)));
        assert_eq!(r.match_sheet_name("4. 23 juli"), None);
        assert_eq!(r.match_sheet_name("Sheet1"), None);
        assert_eq!(r.match_sheet_name("23 juli"), None);
    }

    #[test]
    fn vehicle_class_names_round_trip() {
        for vc in VehicleClass::ALL {
            assert_eq!(vc.name().parse::<VehicleClass>(), Ok(vc));
        }
        assert_eq!("roda 4".parse::<VehicleClass>(), Ok(VehicleClass::FourWheeler));
        assert!("Car".parse::<VehicleClass>().is_err());
    }

    #[test]
    fn cell_text_and_numbers() {
        assert_eq!(Cell::Float(7.0).as_text(), "7");
        assert_eq!(Cell::DateTime(0.375).as_text(), "09:00:00");
        assert_eq!(Cell::String(" 12 ".to_string()).as_number(), Some(12.0));
        assert_eq!(Cell::String("n/a".to_string()).as_number(), None);
        assert_eq!(Cell::Empty.as_number(), None);
        assert!(Cell::String("  ".to_string()).is_blank());
    }

    #[test]
    fn estimator_strategy_follows_weeks() {
        assert_eq!(
            EstimatorSettings::for_weeks(1).aggregation,
            AggregationStrategy::Sum
        );
        assert_eq!(
            EstimatorSettings::for_weeks(2).aggregation,
            AggregationStrategy::Mean
        );
    }
}
