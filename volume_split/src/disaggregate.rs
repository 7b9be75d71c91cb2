use chrono::Datelike;
use log::{debug, info};

use crate::config::*;
use crate::errors::*;
use crate::proportions::ProportionTable;

#[derive(PartialEq, Debug, Clone, Default)]
pub struct Disaggregation {
    /// Ordered by date, checkpoint and class. Never holds the `Unknown` class.
    pub estimates: Vec<EstimatedRecord>,
    /// Bulk records without a proportion for their weekday and class.
    pub join_misses: Vec<JoinMiss>,
    /// Number of `Unknown` bulk records left out.
    pub unknown_excluded: usize,
}

impl Disaggregation {
    pub fn warnings(&self) -> Vec<Warning> {
        let mut res: Vec<Warning> = self
            .join_misses
            .iter()
            .map(|m| Warning::NoProportion {
                date: m.date,
                vehicle_class: m.vehicle_class,
            })
            .collect();
        if self.unknown_excluded > 0 {
            res.push(Warning::UnknownExcluded {
                records: self.unknown_excluded,
            });
        }
        res
    }
}

/// Rounds a fractional estimate to a non-negative count.
pub fn round_count(x: f64, mode: RoundingMode) -> u64 {
    if !x.is_finite() || x <= 0.0 {
        return 0;
    }
    match mode {
        RoundingMode::HalfUp => (x + 0.5).floor() as u64,
        RoundingMode::Truncate => x.floor() as u64,
    }
}

/// Splits every bulk record across the checkpoints, hour by hour, with the shares of
/// its weekday and class.
pub fn disaggregate(
    bulk: &[BulkDailyRecord],
    table: &ProportionTable,
    rounding: RoundingMode,
) -> Disaggregation {
    let mut res = Disaggregation::default();
    for record in bulk.iter() {
        if record.vehicle_class == VehicleClass::Unknown {
            res.unknown_excluded += 1;
            continue;
        }
        let entries = table.lookup(record.date.weekday(), record.vehicle_class);
        if entries.is_empty() {
            debug!(
                "disaggregate: no proportion for {} on {}",
                record.vehicle_class, record.date
            );
            res.join_misses.push(JoinMiss {
                date: record.date,
                vehicle_class: record.vehicle_class,
            });
            continue;
        }
        for e in entries {
            let mut hourly_counts: HourlyCounts = [0; HOURS_PER_DAY];
            for (slot, v) in hourly_counts.iter_mut().zip(record.hourly_counts.iter()) {
                *slot = round_count(v * e.share, rounding);
            }
            res.estimates.push(EstimatedRecord {
                date: record.date,
                checkpoint: e.checkpoint,
                vehicle_class: record.vehicle_class,
                hourly_counts,
            });
        }
    }
    res.estimates
        .sort_by_key(|r| (r.date, r.checkpoint, r.vehicle_class));
    res.join_misses.sort();
    info!(
        "disaggregate: {} estimates from {} bulk records, {} join misses, {} unknown excluded",
        res.estimates.len(),
        bulk.len(),
        res.join_misses.len(),
        res.unknown_excluded
    );
    res
}
