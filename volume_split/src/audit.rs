use chrono::NaiveDate;
use log::info;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use crate::config::*;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Ord, PartialOrd)]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn from_missing(missing: usize, thresholds: &SeverityThresholds) -> Severity {
        if missing > thresholds.high {
            Severity::High
        } else if missing > thresholds.medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        };
        write!(f, "{}", s)
    }
}

/// Presentational grade of the overall completeness.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum CompletenessLevel {
    Complete,
    /// At least 90%.
    Acceptable,
    Poor,
}

impl Display for CompletenessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CompletenessLevel::Complete => "complete",
            CompletenessLevel::Acceptable => "acceptable",
            CompletenessLevel::Poor => "poor",
        };
        write!(f, "{}", s)
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CheckpointGap {
    pub checkpoint: CheckpointId,
    pub missing: usize,
    pub dates_affected: usize,
    pub classes_affected: usize,
    pub severity: Severity,
}

/// The classes missing at one checkpoint on one date.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DateGap {
    pub checkpoint: CheckpointId,
    pub date: NaiveDate,
    pub missing_classes: Vec<VehicleClass>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct CompletenessReport {
    /// Size of the dates × checkpoints × classes grid.
    pub expected: usize,
    /// Sorted by date, checkpoint and class.
    pub missing: Vec<MissingCombination>,
    /// Percentage in [0, 100].
    pub completeness: f64,
    /// Only the checkpoints with missing combinations, in checkpoint order.
    pub checkpoint_gaps: Vec<CheckpointGap>,
    /// Sorted by checkpoint and date.
    pub date_gaps: Vec<DateGap>,
}

impl CompletenessReport {
    pub fn level(&self) -> CompletenessLevel {
        if self.missing.is_empty() {
            CompletenessLevel::Complete
        } else if self.completeness >= 90.0 {
            CompletenessLevel::Acceptable
        } else {
            CompletenessLevel::Poor
        }
    }
}

/// Checks that every (date, checkpoint, class) seen anywhere in the estimates is
/// present for all the combinations of the other two.
pub fn audit_completeness(
    estimates: &[EstimatedRecord],
    thresholds: &SeverityThresholds,
) -> CompletenessReport {
    let dates: BTreeSet<NaiveDate> = estimates.iter().map(|e| e.date).collect();
    let checkpoints: BTreeSet<CheckpointId> = estimates.iter().map(|e| e.checkpoint).collect();
    let classes: BTreeSet<VehicleClass> = estimates.iter().map(|e| e.vehicle_class).collect();
    let present: BTreeSet<MissingCombination> = estimates
        .iter()
        .map(|e| MissingCombination {
            date: e.date,
            checkpoint: e.checkpoint,
            vehicle_class: e.vehicle_class,
        })
        .collect();

    let expected = dates.len() * checkpoints.len() * classes.len();
    let mut missing: Vec<MissingCombination> = Vec::new();
    for date in dates.iter() {
        for checkpoint in checkpoints.iter() {
            for vehicle_class in classes.iter() {
                let key = MissingCombination {
                    date: *date,
                    checkpoint: *checkpoint,
                    vehicle_class: *vehicle_class,
                };
                if !present.contains(&key) {
                    missing.push(key);
                }
            }
        }
    }

    let completeness = if expected == 0 {
        100.0
    } else {
        (expected - missing.len()) as f64 / expected as f64 * 100.0
    };

    let mut per_checkpoint: BTreeMap<CheckpointId, Vec<&MissingCombination>> = BTreeMap::new();
    let mut per_date: BTreeMap<(CheckpointId, NaiveDate), Vec<VehicleClass>> = BTreeMap::new();
    for m in missing.iter() {
        per_checkpoint.entry(m.checkpoint).or_insert_with(Vec::new).push(m);
        per_date
            .entry((m.checkpoint, m.date))
            .or_insert_with(Vec::new)
            .push(m.vehicle_class);
    }
    let checkpoint_gaps: Vec<CheckpointGap> = per_checkpoint
        .into_iter()
        .map(|(checkpoint, ms)| {
            let dates_affected = ms.iter().map(|m| m.date).collect::<BTreeSet<_>>().len();
            let classes_affected = ms
                .iter()
                .map(|m| m.vehicle_class)
                .collect::<BTreeSet<_>>()
                .len();
            CheckpointGap {
                checkpoint,
                missing: ms.len(),
                dates_affected,
                classes_affected,
                severity: Severity::from_missing(ms.len(), thresholds),
            }
        })
        .collect();
    let date_gaps: Vec<DateGap> = per_date
        .into_iter()
        .map(|((checkpoint, date), missing_classes)| DateGap {
            checkpoint,
            date,
            missing_classes,
        })
        .collect();

    info!(
        "audit_completeness: {} of {} combinations missing ({:.2}% complete)",
        missing.len(),
        expected,
        completeness
    );
    CompletenessReport {
        expected,
        missing,
        completeness,
        checkpoint_gaps,
        date_gaps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    fn grid() -> Vec<EstimatedRecord> {
        let mut res = Vec::new();
        for d in 1..=3 {
            for cp in 0..3 {
                for vc in [VehicleClass::Bus, VehicleClass::Truck] {
                    res.push(EstimatedRecord {
                        date: date(d),
                        checkpoint: CheckpointId(cp),
                        vehicle_class: vc,
                        hourly_counts: [1; HOURS_PER_DAY],
                    });
                }
            }
        }
        res
    }

    #[test]
    fn full_grid_has_no_gap() {
        let r = audit_completeness(&grid(), &SeverityThresholds::default());
        assert_eq!(r.expected, 18);
        assert!(r.missing.is_empty());
        assert_eq!(r.completeness, 100.0);
        assert_eq!(r.level(), CompletenessLevel::Complete);
        assert!(r.checkpoint_gaps.is_empty());
    }

    #[test]
    fn one_deleted_triple_is_found() {
        let mut estimates = grid();
        let removed = estimates.remove(7);
        let r = audit_completeness(&estimates, &SeverityThresholds::default());
        assert_eq!(
            r.missing,
            vec![MissingCombination {
                date: removed.date,
                checkpoint: removed.checkpoint,
                vehicle_class: removed.vehicle_class,
            }]
        );
        assert!((r.completeness - 17.0 / 18.0 * 100.0).abs() < 1e-9);
        assert_eq!(r.level(), CompletenessLevel::Acceptable);
        assert_eq!(
            r.checkpoint_gaps,
            vec![CheckpointGap {
                checkpoint: removed.checkpoint,
                missing: 1,
                dates_affected: 1,
                classes_affected: 1,
                severity: Severity::Low,
            }]
        );
        assert_eq!(r.date_gaps[0].missing_classes, vec![removed.vehicle_class]);
    }

    #[test]
    fn empty_estimates_are_complete() {
        let r = audit_completeness(&[], &SeverityThresholds::default());
        assert_eq!(r.expected, 0);
        assert_eq!(r.completeness, 100.0);
    }

    #[test]
    fn poor_coverage() {
        let estimates: Vec<EstimatedRecord> = grid()
            .into_iter()
            .filter(|e| e.checkpoint != CheckpointId(2) || e.date == date(1))
            .collect();
        let r = audit_completeness(&estimates, &SeverityThresholds::default());
        assert_eq!(r.missing.len(), 4);
        assert_eq!(r.level(), CompletenessLevel::Poor);
        assert_eq!(r.checkpoint_gaps[0].dates_affected, 2);
        assert_eq!(r.checkpoint_gaps[0].classes_affected, 2);
        assert_eq!(r.date_gaps.len(), 2);
    }

    #[test]
    fn severity_limits_are_exclusive() {
        let t = SeverityThresholds::default();
        assert_eq!(Severity::from_missing(51, &t), Severity::High);
        assert_eq!(Severity::from_missing(50, &t), Severity::Medium);
        assert_eq!(Severity::from_missing(21, &t), Severity::Medium);
        assert_eq!(Severity::from_missing(20, &t), Severity::Low);
    }
}
