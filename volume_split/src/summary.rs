// Reporting aggregates over the estimates. They play no part in the estimation.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::config::*;

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DirectionTotal {
    pub date: NaiveDate,
    pub direction: Direction,
    pub total: u64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DailyTotal {
    pub checkpoint: CheckpointId,
    pub date: NaiveDate,
    pub total: u64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ClassShare {
    pub checkpoint: CheckpointId,
    pub vehicle_class: VehicleClass,
    pub total: u64,
    /// Percentage of the checkpoint volume over the whole period.
    pub percent: f64,
}

/// Volume per date and traffic direction. Estimates of checkpoints outside the registry
/// are left out.
pub fn direction_totals(
    estimates: &[EstimatedRecord],
    registry: &CheckpointRegistry,
) -> Vec<DirectionTotal> {
    let mut acc: BTreeMap<(NaiveDate, Direction), u64> = BTreeMap::new();
    for e in estimates.iter() {
        if let Some(c) = registry.get(e.checkpoint) {
            *acc.entry((e.date, c.direction)).or_insert(0) += e.total();
        }
    }
    acc.into_iter()
        .map(|((date, direction), total)| DirectionTotal {
            date,
            direction,
            total,
        })
        .collect()
}

pub fn daily_totals(estimates: &[EstimatedRecord]) -> Vec<DailyTotal> {
    let mut acc: BTreeMap<(CheckpointId, NaiveDate), u64> = BTreeMap::new();
    for e in estimates.iter() {
        *acc.entry((e.checkpoint, e.date)).or_insert(0) += e.total();
    }
    acc.into_iter()
        .map(|((checkpoint, date), total)| DailyTotal {
            checkpoint,
            date,
            total,
        })
        .collect()
}

pub fn class_shares(estimates: &[EstimatedRecord]) -> Vec<ClassShare> {
    let mut acc: BTreeMap<(CheckpointId, VehicleClass), u64> = BTreeMap::new();
    let mut per_checkpoint: BTreeMap<CheckpointId, u64> = BTreeMap::new();
    for e in estimates.iter() {
        *acc.entry((e.checkpoint, e.vehicle_class)).or_insert(0) += e.total();
        *per_checkpoint.entry(e.checkpoint).or_insert(0) += e.total();
    }
    acc.into_iter()
        .map(|((checkpoint, vehicle_class), total)| {
            let all = per_checkpoint.get(&checkpoint).copied().unwrap_or(0);
            let percent = if all > 0 {
                total as f64 / all as f64 * 100.0
            } else {
                0.0
            };
            ClassShare {
                checkpoint,
                vehicle_class,
                total,
                percent,
            }
        })
        .collect()
}
