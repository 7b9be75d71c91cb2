use crate::split::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use std::collections::BTreeMap;

/// The checkpoints of the deployment, in the order of the sheet names of the weekly workbooks.
pub const DEFAULT_CHECKPOINTS: [(&str, Direction); 10] = [
    ("diponegoro", Direction::Outbound),
    ("imam bonjol", Direction::Internal),
    ("a yani", Direction::Internal),
    ("gajah mada", Direction::Internal),
    ("sudirman", Direction::Outbound),
    ("brantas", Direction::Inbound),
    ("patimura", Direction::Inbound),
    ("trunojoyo", Direction::Inbound),
    ("arumdalu", Direction::Inbound),
    ("mojorejo", Direction::Inbound),
];

/// Labels of the checkpoint cameras.
pub const DEFAULT_WEEKLY_CLASSES: [(&str, VehicleClass); 10] = [
    ("Large-Sized Coach", VehicleClass::Bus),
    ("Light Truck", VehicleClass::Truck),
    ("Minivan", VehicleClass::FourWheeler),
    ("Pedestrian", VehicleClass::Pedestrian),
    ("Pick-up Truck", VehicleClass::PickUp),
    ("SUV/MPV", VehicleClass::FourWheeler),
    ("Sedan", VehicleClass::FourWheeler),
    ("Tricycle", VehicleClass::ThreeWheeler),
    ("Truck", VehicleClass::Truck),
    ("Two Wheeler", VehicleClass::Motorcycle),
];

/// Labels of the monthly bulk workbook.
pub const DEFAULT_MONTHLY_CLASSES: [(&str, VehicleClass); 11] = [
    ("Truk", VehicleClass::Truck),
    ("Light Truck", VehicleClass::Truck),
    ("Bus", VehicleClass::Bus),
    ("Pick up Truck", VehicleClass::PickUp),
    ("Sedan", VehicleClass::FourWheeler),
    ("Minivan", VehicleClass::FourWheeler),
    ("SUV/MPV", VehicleClass::FourWheeler),
    ("Roda 3", VehicleClass::ThreeWheeler),
    ("Roda 2", VehicleClass::Motorcycle),
    ("Pedestrian", VehicleClass::Pedestrian),
    ("Unknown", VehicleClass::Unknown),
];

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputSettings {
    #[serde(rename = "reportName", default)]
    pub report_name: String,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct WeeklySource {
    #[serde(rename = "filePath")]
    pub file_path: String,
    /// The sampled date, dd-mm-YYYY.
    pub date: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct MonthlySource {
    #[serde(rename = "filePath")]
    pub file_path: String,
    pub year: i32,
    pub month: u32,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub name: String,
    pub direction: Direction,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuleSettings {
    #[serde(rename = "sampledWeeks")]
    pub sampled_weeks: Option<u32>,
    pub aggregation: Option<String>,
    pub rounding: Option<String>,
    #[serde(rename = "preambleRows")]
    pub preamble_rows: Option<usize>,
    #[serde(rename = "terminatorMarker")]
    pub terminator_marker: Option<String>,
    #[serde(rename = "classMarker")]
    pub class_marker: Option<String>,
    #[serde(rename = "minColumns")]
    pub min_columns: Option<usize>,
    #[serde(rename = "severityHigh")]
    pub severity_high: Option<usize>,
    #[serde(rename = "severityMedium")]
    pub severity_medium: Option<usize>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct SplitConfig {
    #[serde(rename = "outputSettings", default)]
    pub output_settings: OutputSettings,
    #[serde(rename = "weeklySources", default)]
    pub weekly_sources: Vec<WeeklySource>,
    #[serde(rename = "monthlySource")]
    pub monthly_source: Option<MonthlySource>,
    pub checkpoints: Option<Vec<CheckpointEntry>>,
    #[serde(rename = "weeklyClassMap")]
    pub weekly_class_map: Option<BTreeMap<String, String>>,
    #[serde(rename = "monthlyClassMap")]
    pub monthly_class_map: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub rules: RuleSettings,
}

pub fn parse_config(contents: &str) -> SplitResult<SplitConfig> {
    serde_json::from_str(contents).context(ParsingJsonSnafu {})
}

pub fn read_config(path: &str) -> SplitResult<SplitConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    parse_config(&contents)
}

pub fn read_summary(path: &str) -> SplitResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})
}

pub fn validate_rules(rules: &RuleSettings) -> SplitResult<SplitRules> {
    let mut res = SplitRules::default();

    let weeks = rules.sampled_weeks.unwrap_or(1);
    if weeks == 0 {
        whatever!("sampledWeeks must be at least 1");
    }
    res.estimator = EstimatorSettings::for_weeks(weeks);
    res.estimator.aggregation = match rules.aggregation.as_deref() {
        None => res.estimator.aggregation,
        Some("sum") => AggregationStrategy::Sum,
        Some("mean") => AggregationStrategy::Mean,
        Some(x) => whatever!("unknown aggregation {:?} (expected sum or mean)", x),
    };
    res.rounding = match rules.rounding.as_deref() {
        None | Some("halfUp") => RoundingMode::HalfUp,
        Some("truncate") => RoundingMode::Truncate,
        Some(x) => whatever!("unknown rounding {:?} (expected halfUp or truncate)", x),
    };

    if let Some(n) = rules.preamble_rows {
        res.checkpoint_layout.preamble_rows = n;
    }
    if let Some(m) = &rules.terminator_marker {
        res.checkpoint_layout.terminator_marker = m.clone();
    }
    if let Some(m) = &rules.class_marker {
        res.bulk_layout.class_marker = m.clone();
    }
    if let Some(n) = rules.min_columns {
        if n < HOURS_PER_DAY + 1 {
            whatever!("minColumns must be at least {}, got {}", HOURS_PER_DAY + 1, n);
        }
        res.bulk_layout.min_columns = n;
    }
    if let Some(n) = rules.severity_high {
        res.severity.high = n;
    }
    if let Some(n) = rules.severity_medium {
        res.severity.medium = n;
    }
    if res.severity.medium > res.severity.high {
        whatever!(
            "severityMedium ({}) is above severityHigh ({})",
            res.severity.medium,
            res.severity.high
        );
    }
    Ok(res)
}

pub fn build_registry(entries: &Option<Vec<CheckpointEntry>>) -> SplitResult<CheckpointRegistry> {
    let checkpoints: Vec<Checkpoint> = match entries {
        Some(l) => l
            .iter()
            .map(|c| Checkpoint::new(&c.name, c.direction))
            .collect(),
        None => DEFAULT_CHECKPOINTS
            .iter()
            .map(|(name, direction)| Checkpoint::new(name, *direction))
            .collect(),
    };
    CheckpointRegistry::new(checkpoints).context(PipelineSnafu {})
}

pub fn build_class_mapping(
    table: &Option<BTreeMap<String, String>>,
    defaults: &[(&str, VehicleClass)],
) -> SplitResult<ClassMapping> {
    match table {
        None => Ok(ClassMapping::from_pairs(defaults)),
        Some(t) => {
            let mut res = ClassMapping::new();
            for (label, class_name) in t.iter() {
                let vc = match class_name.parse::<VehicleClass>() {
                    Ok(vc) => vc,
                    Err(e) => whatever!("class table entry {:?}: {}", label, e),
                };
                res.insert(label, vc);
            }
            Ok(res)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "outputSettings": { "reportName": "Batu July 2024", "outputDirectory": "out" },
        "weeklySources": [
            { "filePath": "weekly/1 juli.xlsx", "date": "01-07-2024" }
        ],
        "monthlySource": { "filePath": "monthly/juli.xlsx", "year": 2024, "month": 7 },
        "checkpoints": [
            { "name": "diponegoro", "direction": "outbound" },
            { "name": "brantas", "direction": "inbound" }
        ],
        "weeklyClassMap": { "Sedan": "Roda 4", "Two Wheeler": "Sepeda motor" },
        "rules": { "sampledWeeks": 2, "rounding": "truncate", "severityHigh": 10, "severityMedium": 4 }
    }"#;

    #[test]
    fn full_config_is_read() {
        let c = parse_config(CONFIG).unwrap();
        assert_eq!(c.output_settings.report_name, "Batu July 2024");
        assert_eq!(c.weekly_sources.len(), 1);
        assert_eq!(c.monthly_source.as_ref().map(|m| m.month), Some(7));

        let rules = validate_rules(&c.rules).unwrap();
        assert_eq!(rules.estimator.sampled_weeks, 2);
        assert_eq!(rules.estimator.aggregation, AggregationStrategy::Mean);
        assert_eq!(rules.rounding, RoundingMode::Truncate);
        assert_eq!(rules.severity.high, 10);
        assert_eq!(rules.severity.medium, 4);

        let registry = build_registry(&c.checkpoints).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.by_name("Brantas"), Some(CheckpointId(1)));

        let weekly = build_class_mapping(&c.weekly_class_map, &DEFAULT_WEEKLY_CLASSES).unwrap();
        assert_eq!(weekly.len(), 2);
        assert_eq!(weekly.resolve("sedan"), Some(VehicleClass::FourWheeler));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let c = parse_config("{}").unwrap();
        assert_eq!(c, SplitConfig::default());
        assert_eq!(validate_rules(&c.rules).unwrap(), SplitRules::default());
        assert_eq!(build_registry(&None).unwrap().len(), 10);
        let monthly = build_class_mapping(&None, &DEFAULT_MONTHLY_CLASSES).unwrap();
        assert_eq!(monthly.resolve("Unknown"), Some(VehicleClass::Unknown));
        assert_eq!(monthly.resolve("Roda 2"), Some(VehicleClass::Motorcycle));
    }

    #[test]
    fn bad_options_are_rejected() {
        let bad_rounding = RuleSettings {
            rounding: Some("bankers".to_string()),
            ..RuleSettings::default()
        };
        assert!(validate_rules(&bad_rounding).is_err());
        let no_weeks = RuleSettings {
            sampled_weeks: Some(0),
            ..RuleSettings::default()
        };
        assert!(validate_rules(&no_weeks).is_err());
        let inverted = RuleSettings {
            severity_high: Some(5),
            ..RuleSettings::default()
        };
        assert!(validate_rules(&inverted).is_err());

        let mut table = BTreeMap::new();
        table.insert("Sedan".to_string(), "Car".to_string());
        assert!(build_class_mapping(&Some(table), &DEFAULT_WEEKLY_CLASSES).is_err());

        let dup = Some(vec![
            CheckpointEntry {
                name: "a".to_string(),
                direction: Direction::Inbound,
            },
            CheckpointEntry {
                name: "A".to_string(),
                direction: Direction::Outbound,
            },
        ]);
        assert!(matches!(
            build_registry(&dup),
            Err(SplitError::Pipeline { .. })
        ));
        assert!(parse_config(r#"{"rules": {"sampledWeeks": "two"}}"#).is_err());
    }
}
