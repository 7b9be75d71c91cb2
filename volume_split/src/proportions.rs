use chrono::{Datelike, NaiveDate, Weekday};
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::*;
use crate::errors::*;

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// The proportion entries, indexed by weekday and vehicle class.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct ProportionTable {
    entries: Vec<ProportionEntry>,
    index: BTreeMap<(u32, VehicleClass), Vec<usize>>,
}

impl ProportionTable {
    /// Builds a table from entries already in their final order.
    pub fn from_entries(entries: Vec<ProportionEntry>) -> ProportionTable {
        let mut index: BTreeMap<(u32, VehicleClass), Vec<usize>> = BTreeMap::new();
        for (idx, e) in entries.iter().enumerate() {
            index
                .entry((e.day_of_week.num_days_from_monday(), e.vehicle_class))
                .or_insert_with(Vec::new)
                .push(idx);
        }
        ProportionTable { entries, index }
    }

    pub fn entries(&self) -> &[ProportionEntry] {
        &self.entries
    }

    /// The entries of all the checkpoints for this weekday and class, in checkpoint order.
    pub fn lookup(&self, day: Weekday, vehicle_class: VehicleClass) -> Vec<&ProportionEntry> {
        match self.index.get(&(day.num_days_from_monday(), vehicle_class)) {
            Some(idxs) => idxs.iter().map(|i| &self.entries[*i]).collect(),
            None => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct ProportionEstimate {
    pub table: ProportionTable,
    /// Coverage warnings. They do not prevent the estimation.
    pub warnings: Vec<Warning>,
}

/// Computes the share of each checkpoint in the daily volume of a vehicle class, per
/// day of week.
///
/// The samples of one (weekday, checkpoint, class) over several dates are combined hour
/// by hour with the strategy of the settings. Records sharing a date are added first.
pub fn estimate_proportions(
    records: &[CheckpointRecord],
    settings: &EstimatorSettings,
) -> ProportionEstimate {
    type Key = (u32, CheckpointId, VehicleClass);
    let mut groups: BTreeMap<Key, BTreeMap<NaiveDate, HourlyCounts>> = BTreeMap::new();
    let mut dates_per_day: BTreeMap<u32, BTreeSet<NaiveDate>> = BTreeMap::new();
    for r in records.iter() {
        let day = r.date.weekday().num_days_from_monday();
        dates_per_day.entry(day).or_insert_with(BTreeSet::new).insert(r.date);
        let acc = groups
            .entry((day, r.checkpoint, r.vehicle_class))
            .or_insert_with(BTreeMap::new)
            .entry(r.date)
            .or_insert([0; HOURS_PER_DAY]);
        for (slot, v) in acc.iter_mut().zip(r.hourly_counts.iter()) {
            *slot += *v;
        }
    }

    let mut totals: Vec<(Key, f64)> = Vec::with_capacity(groups.len());
    let mut class_totals: BTreeMap<(u32, VehicleClass), f64> = BTreeMap::new();
    for (key, per_date) in groups.iter() {
        let mut aggregated = [0.0; HOURS_PER_DAY];
        for hours in per_date.values() {
            for (slot, v) in aggregated.iter_mut().zip(hours.iter()) {
                *slot += *v as f64;
            }
        }
        if settings.aggregation == AggregationStrategy::Mean {
            let n = per_date.len() as f64;
            for slot in aggregated.iter_mut() {
                *slot /= n;
            }
        }
        let total: f64 = aggregated.iter().sum();
        *class_totals.entry((key.0, key.2)).or_insert(0.0) += total;
        totals.push((*key, total));
    }

    // The key order is weekday, checkpoint, class.
    let entries: Vec<ProportionEntry> = totals
        .into_iter()
        .map(|((day, checkpoint, vehicle_class), total)| {
            let class_total = class_totals
                .get(&(day, vehicle_class))
                .copied()
                .unwrap_or(0.0);
            let share = if class_total > 0.0 {
                total / class_total
            } else {
                0.0
            };
            ProportionEntry {
                day_of_week: WEEK[day as usize],
                checkpoint,
                vehicle_class,
                total,
                class_total,
                share,
            }
        })
        .collect();

    let mut warnings: Vec<Warning> = Vec::new();
    for (idx, day) in WEEK.iter().enumerate() {
        let dates = dates_per_day
            .get(&(idx as u32))
            .map(|s| s.len())
            .unwrap_or(0);
        if dates < settings.sampled_weeks as usize {
            debug!(
                "estimate_proportions: {} has {} dates, {} expected",
                day_name(*day),
                dates,
                settings.sampled_weeks
            );
            warnings.push(Warning::IncompleteWeekday {
                day: *day,
                dates,
                expected: settings.sampled_weeks,
            });
        }
    }
    info!(
        "estimate_proportions: {} entries from {} records ({:?} over {} weeks)",
        entries.len(),
        records.len(),
        settings.aggregation,
        settings.sampled_weeks
    );
    ProportionEstimate {
        table: ProportionTable::from_entries(entries),
        warnings,
    }
}
