use log::debug;
use std::collections::BTreeMap;
use std::ops::AddAssign;

use crate::config::*;
use crate::errors::*;
use crate::normalize::ClassRow;

/// A lookup table from the raw labels of one source family to the shared classes.
///
/// Labels are matched after trimming and lowercasing.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ClassMapping {
    entries: BTreeMap<String, VehicleClass>,
}

impl ClassMapping {
    pub fn new() -> ClassMapping {
        ClassMapping::default()
    }

    pub fn from_pairs<S: AsRef<str>>(pairs: &[(S, VehicleClass)]) -> ClassMapping {
        let mut res = ClassMapping::new();
        for (label, vc) in pairs.iter() {
            res.insert(label.as_ref(), *vc);
        }
        res
    }

    /// Adds or replaces a label.
    pub fn insert(&mut self, label: &str, vehicle_class: VehicleClass) {
        self.entries.insert(normalized_label(label), vehicle_class);
    }

    pub fn resolve(&self, label: &str) -> Option<VehicleClass> {
        self.entries.get(&normalized_label(label)).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalized_label(label: &str) -> String {
    label.trim().to_lowercase()
}

#[derive(PartialEq, Debug, Clone)]
pub struct MappedRows<T> {
    /// Hourly values per class, summed over all the raw rows of the class.
    pub classes: BTreeMap<VehicleClass, [T; HOURS_PER_DAY]>,
    pub warnings: Vec<Warning>,
}

/// Maps normalized rows onto the shared vehicle classes.
///
/// Rows with the same target class are added hour by hour. Rows with an unmapped
/// label are dropped, with one warning per label.
pub fn map_class_rows<T>(rows: &[ClassRow<T>], mapping: &ClassMapping) -> MappedRows<T>
where
    T: Copy + Default + AddAssign,
{
    let mut classes: BTreeMap<VehicleClass, [T; HOURS_PER_DAY]> = BTreeMap::new();
    let mut unmapped: Vec<(String, usize)> = Vec::new();
    for row in rows.iter() {
        match mapping.resolve(&row.label) {
            Some(vc) => {
                let acc = classes
                    .entry(vc)
                    .or_insert_with(|| [T::default(); HOURS_PER_DAY]);
                for (slot, v) in acc.iter_mut().zip(row.hours.iter()) {
                    *slot += *v;
                }
            }
            None => match unmapped.iter_mut().find(|(l, _)| *l == row.label) {
                Some((_, n)) => *n += 1,
                None => unmapped.push((row.label.clone(), 1)),
            },
        }
    }
    debug!(
        "map_class_rows: {} rows into {} classes, {} unmapped labels",
        rows.len(),
        classes.len(),
        unmapped.len()
    );
    let warnings = unmapped
        .into_iter()
        .map(|(label, rows)| Warning::UnmappedVehicleClass { label, rows })
        .collect();
    MappedRows { classes, warnings }
}
