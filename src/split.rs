use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use volume_split::builder::{parse_unit_date, BulkBuilder, WeeklyBuilder};
use volume_split::summary;
use volume_split::*;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use calamine::{open_workbook, Reader, Xlsx};

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::split::config_reader::*;
use crate::split::io_common::*;
use crate::split::io_excel::{read_workbook, Workbook};

pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SplitError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing CSV file {path}"))]
    WritingCsv { source: csv::Error, path: String },
    #[snafu(display("Error writing {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("The configuration file {path} has no parent directory"))]
    MissingParentDir { path: String },
    #[snafu(display("{source}"))]
    Pipeline { source: PipelineError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SplitResult<T> = Result<T, SplitError>;

/// A workbook of the sampling weeks, with the date it was sampled on.
#[derive(Debug, Clone)]
pub struct WeeklyUnit {
    pub label: String,
    pub date: String,
    /// The sheets, or the reason the file could not be opened.
    pub workbook: Result<Workbook, String>,
}

pub fn stage_weekly(
    units: &[WeeklyUnit],
    registry: &CheckpointRegistry,
    mapping: &ClassMapping,
    layout: &CheckpointSheetLayout,
) -> SplitResult<WeeklySamples> {
    let mut builder = WeeklyBuilder::new(registry, mapping, layout);
    for unit in units.iter() {
        let date = match parse_unit_date(&unit.date) {
            Ok(d) => d,
            Err(e) => {
                builder.skip_unit(&unit.label, e);
                continue;
            }
        };
        let workbook = match &unit.workbook {
            Ok(w) => w,
            Err(reason) => {
                builder.skip_unit(
                    &unit.label,
                    SheetError::Unreadable {
                        reason: reason.clone(),
                    },
                );
                continue;
            }
        };
        let mut sheets: Vec<(String, Grid)> = Vec::new();
        for (name, sheet) in workbook.iter() {
            match sheet {
                Ok(grid) => sheets.push((name.clone(), grid.clone())),
                Err(reason) => builder.skip_unit(
                    &format!("{}/{}", unit.label, name),
                    SheetError::Unreadable {
                        reason: reason.clone(),
                    },
                ),
            }
        }
        debug!(
            "stage_weekly: {} ({}) with {} sheets",
            unit.label,
            date,
            sheets.len()
        );
        builder.add_unit(&unit.label, date, &sheets);
    }
    builder.finish().context(PipelineSnafu {})
}

pub fn stage_monthly(
    workbook: &Workbook,
    year: i32,
    month: u32,
    mapping: &ClassMapping,
    layout: &BulkSheetLayout,
) -> SplitResult<BulkSamples> {
    let mut builder = BulkBuilder::new(mapping, layout);
    for (name, sheet) in workbook.iter() {
        match sheet {
            Ok(grid) => {
                builder.add_day_sheet(name, year, month, grid);
            }
            Err(reason) => builder.skip_unit(
                name,
                SheetError::Unreadable {
                    reason: reason.clone(),
                },
            ),
        }
    }
    builder.finish().context(PipelineSnafu {})
}

fn rounding_name(r: RoundingMode) -> &'static str {
    match r {
        RoundingMode::HalfUp => "halfUp",
        RoundingMode::Truncate => "truncate",
    }
}

fn aggregation_name(a: AggregationStrategy) -> &'static str {
    match a {
        AggregationStrategy::Sum => "sum",
        AggregationStrategy::Mean => "mean",
    }
}

pub fn build_summary_js(
    settings: &OutputSettings,
    rules: &SplitRules,
    registry: &CheckpointRegistry,
    result: &EstimationResult,
) -> JSValue {
    let estimates = &result.disaggregation.estimates;
    let report = &result.completeness;
    let volume: u64 = estimates.iter().map(|e| e.total()).sum();

    let checkpoints: Vec<JSValue> = registry
        .ids()
        .map(|cid| {
            let cp_volume: u64 = estimates
                .iter()
                .filter(|e| e.checkpoint == cid)
                .map(|e| e.total())
                .sum();
            let gap = report.checkpoint_gaps.iter().find(|g| g.checkpoint == cid);
            json!({
                "name": registry.name(cid),
                "direction": registry.get(cid).map(|c| c.direction.to_string()),
                "volume": cp_volume.to_string(),
                "missing": gap.map(|g| g.missing).unwrap_or(0).to_string(),
                "severity": gap.map(|g| g.severity.to_string()),
            })
        })
        .collect();

    let mut per_direction: BTreeMap<String, u64> = BTreeMap::new();
    for t in summary::direction_totals(estimates, registry) {
        *per_direction.entry(t.direction.to_string()).or_insert(0) += t.total;
    }
    let mut directions: JSMap<String, JSValue> = JSMap::new();
    for (direction, total) in per_direction {
        directions.insert(direction, json!(total.to_string()));
    }

    let diagnostics: Vec<String> = result.diagnostics.iter().map(|d| d.to_string()).collect();

    json!({
        "config": {
            "reportName": settings.report_name,
            "sampledWeeks": rules.estimator.sampled_weeks.to_string(),
            "aggregation": aggregation_name(rules.estimator.aggregation),
            "rounding": rounding_name(rules.rounding),
        },
        "results": {
            "proportions": result.proportions.len().to_string(),
            "estimates": estimates.len().to_string(),
            "volume": volume.to_string(),
            "joinMisses": result.disaggregation.join_misses.len().to_string(),
            "unknownExcluded": result.disaggregation.unknown_excluded.to_string(),
            "completeness": {
                "expected": report.expected.to_string(),
                "missing": report.missing.len().to_string(),
                "percent": format!("{:.2}", report.completeness),
                "level": report.level().to_string(),
            },
            "checkpoints": checkpoints,
            "directions": directions,
            "diagnostics": diagnostics,
        }
    })
}

fn check_reference(pretty_js: &str, reference: &JSValue) -> SplitResult<()> {
    let pretty_ref = serde_json::to_string_pretty(reference).context(ParsingJsonSnafu {})?;
    if pretty_ref != pretty_js {
        warn!("Found differences with the reference summary");
        print_diff(pretty_ref.as_str(), pretty_js, "\n");
        whatever!("Difference detected between computed summary and reference summary")
    }
    Ok(())
}

fn weekly_sources(
    args: &Args,
    config: &SplitConfig,
    root: &Path,
) -> SplitResult<Vec<(String, PathBuf)>> {
    if args.weekly.is_empty() {
        return Ok(config
            .weekly_sources
            .iter()
            .map(|s| (s.date.clone(), resolve_path(root, &s.file_path)))
            .collect());
    }
    let mut res: Vec<(String, PathBuf)> = Vec::new();
    for value in args.weekly.iter() {
        match split_weekly_flag(value) {
            Some((date, path)) => res.push((date, PathBuf::from(path))),
            None => whatever!("cannot read --weekly {:?}, expected DATE=PATH", value),
        }
    }
    Ok(res)
}

fn monthly_source(args: &Args, config: &SplitConfig, root: &Path) -> SplitResult<(PathBuf, i32, u32)> {
    let source = config.monthly_source.as_ref();
    let path = match (&args.monthly, source) {
        (Some(p), _) => PathBuf::from(p),
        (None, Some(s)) => resolve_path(root, &s.file_path),
        (None, None) => whatever!("no monthly source given (--monthly or monthlySource)"),
    };
    let year = args.year.or_else(|| source.map(|s| s.year));
    let month = args.month.or_else(|| source.map(|s| s.month));
    match (year, month) {
        (Some(y), Some(m)) if (1..=12).contains(&m) => Ok((path, y, m)),
        (Some(_), Some(m)) => whatever!("month {} is not between 1 and 12", m),
        _ => whatever!("the year and the month of the monthly workbook are required"),
    }
}

// Flags win over the rules of the configuration file.
fn merge_rule_flags(settings: &RuleSettings, args: &Args) -> RuleSettings {
    let mut res = settings.clone();
    if let Some(n) = args.sampled_weeks {
        res.sampled_weeks = Some(n);
    }
    res
}

pub fn run_split(args: &Args) -> SplitResult<()> {
    let (config, root) = match &args.config {
        Some(p) => {
            let config = read_config(p)?;
            let root = Path::new(p)
                .parent()
                .context(MissingParentDirSnafu { path: p.clone() })?
                .to_path_buf();
            (config, root)
        }
        None => (SplitConfig::default(), PathBuf::from(".")),
    };
    info!("config: {:?}", config);

    let rules = validate_rules(&merge_rule_flags(&config.rules, args))?;
    let registry = build_registry(&config.checkpoints)?;
    let weekly_map = build_class_mapping(&config.weekly_class_map, &DEFAULT_WEEKLY_CLASSES)?;
    let monthly_map = build_class_mapping(&config.monthly_class_map, &DEFAULT_MONTHLY_CLASSES)?;

    let sources = weekly_sources(args, &config, &root)?;
    if sources.is_empty() {
        whatever!("no weekly source given (--weekly or weeklySources)");
    }
    let (monthly_path, year, month) = monthly_source(args, &config, &root)?;

    let units: Vec<WeeklyUnit> = sources
        .iter()
        .map(|(date, path)| {
            info!("Attempting to read weekly file {:?}", path);
            WeeklyUnit {
                label: simplify_file_name(path),
                date: date.clone(),
                workbook: read_workbook(path).map_err(|e| e.to_string()),
            }
        })
        .collect();
    let weekly = stage_weekly(&units, &registry, &weekly_map, &rules.checkpoint_layout)?;

    info!("Attempting to read monthly file {:?}", monthly_path);
    let monthly_wb = read_workbook(&monthly_path)?;
    let bulk = stage_monthly(&monthly_wb, year, month, &monthly_map, &rules.bulk_layout)?;

    let result = run_estimation(&weekly, &bulk, &rules);

    let summary_js = build_summary_js(&config.output_settings, &rules, &registry, &result);
    let pretty_js = serde_json::to_string_pretty(&summary_js).context(ParsingJsonSnafu {})?;

    let out_dir: Option<PathBuf> = match &args.out {
        Some(d) => Some(PathBuf::from(d)),
        None => config
            .output_settings
            .output_directory
            .as_ref()
            .map(|d| resolve_path(&root, d)),
    };
    match out_dir {
        Some(dir) => {
            io_csv::write_all(&dir, &registry, &result)?;
            let p = dir.join("summary.json");
            fs::write(&p, &pretty_js).context(WritingFileSnafu {
                path: p.display().to_string(),
            })?;
            info!("Summary written to {:?}", p);
        }
        None => println!("{}", pretty_js),
    }

    // The reference summary, if provided for comparison
    if let Some(reference_p) = &args.reference {
        let summary_ref = read_summary(reference_p)?;
        check_reference(&pretty_js, &summary_ref)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(x: &str) -> Cell {
        Cell::String(x.to_string())
    }

    fn camera_sheet(rows: &[(&str, f64)]) -> Grid {
        let mut header = vec![Cell::Empty, Cell::Empty];
        header.extend((0..24).map(|h| Cell::DateTime(h as f64 / 24.0)));
        let mut grid = vec![vec![s("Report")], vec![], vec![], header];
        for (idx, (label, v)) in rows.iter().enumerate() {
            let mut row = vec![Cell::Int(idx as i64 + 1), s(label)];
            row.extend((0..24).map(|h| Cell::Float(if h == 8 { *v } else { 0.0 })));
            grid.push(row);
        }
        grid
    }

    fn day_sheet(rows: &[(&str, f64)]) -> Grid {
        let mut header = vec![s("Jenis Kendaraan")];
        header.extend((0..24).map(|h| s(&format!("{:02}:00", h))));
        let mut grid = vec![vec![s("Rekap")], header];
        for (label, v) in rows.iter() {
            let mut row = vec![s(label)];
            row.extend((0..24).map(|h| Cell::Float(if h == 8 { *v } else { 0.0 })));
            grid.push(row);
        }
        grid
    }

    fn registry() -> CheckpointRegistry {
        build_registry(&Some(vec![
            CheckpointEntry {
                name: "diponegoro".to_string(),
                direction: Direction::Outbound,
            },
            CheckpointEntry {
                name: "brantas".to_string(),
                direction: Direction::Inbound,
            },
        ]))
        .unwrap()
    }

    fn staged() -> (WeeklySamples, BulkSamples) {
        let weekly_map = build_class_mapping(&None, &DEFAULT_WEEKLY_CLASSES).unwrap();
        let monthly_map = build_class_mapping(&None, &DEFAULT_MONTHLY_CLASSES).unwrap();
        let rules = SplitRules::default();
        let units = vec![
            WeeklyUnit {
                label: "1 juli.xlsx".to_string(),
                date: "01-07-2024".to_string(),
                workbook: Ok(vec![
                    ("1. 1 Juli".to_string(), Ok(camera_sheet(&[("Sedan", 30.0)]))),
                    ("2. 1 Juli".to_string(), Ok(camera_sheet(&[("Minivan", 70.0)]))),
                ]),
            },
            WeeklyUnit {
                label: "2 juli.xlsx".to_string(),
                date: "2 juli".to_string(),
                workbook: Ok(vec![]),
            },
            WeeklyUnit {
                label: "3 juli.xlsx".to_string(),
                date: "03-07-2024".to_string(),
                workbook: Err("Zip error".to_string()),
            },
        ];
        let weekly = stage_weekly(&units, &registry(), &weekly_map, &rules.checkpoint_layout).unwrap();
        let monthly: Workbook = vec![
            ("8".to_string(), Ok(day_sheet(&[("Sedan", 60.0), ("SUV/MPV", 40.0), ("Unknown", 7.0)]))),
            ("9".to_string(), Err("broken sheet".to_string())),
        ];
        let bulk = stage_monthly(&monthly, 2024, 7, &monthly_map, &rules.bulk_layout).unwrap();
        (weekly, bulk)
    }

    #[test]
    fn staging_isolates_faulty_units() {
        let (weekly, bulk) = staged();
        assert_eq!(weekly.records.len(), 2);
        let skipped: Vec<&str> = weekly
            .diagnostics
            .iter()
            .filter(|d| d.is_skip())
            .map(|d| d.unit.as_str())
            .collect();
        assert_eq!(skipped, vec!["2 juli.xlsx", "3 juli.xlsx"]);
        assert_eq!(bulk.records.len(), 2);
        assert_eq!(bulk.records[0].hourly_counts[8], 100.0);
        assert!(bulk.diagnostics.iter().any(|d| d.unit == "9"
            && matches!(&d.warning, Warning::Skipped(SheetError::Unreadable { .. }))));
    }

    #[test]
    fn summary_of_a_run() {
        let (weekly, bulk) = staged();
        let rules = SplitRules::default();
        let result = run_estimation(&weekly, &bulk, &rules);
        let settings = OutputSettings {
            report_name: "July".to_string(),
            output_directory: None,
        };
        let js = build_summary_js(&settings, &rules, &registry(), &result);
        assert_eq!(js["config"]["rounding"], "halfUp");
        assert_eq!(js["results"]["volume"], "100");
        assert_eq!(js["results"]["unknownExcluded"], "1");
        assert_eq!(js["results"]["completeness"]["level"], "complete");
        assert_eq!(js["results"]["checkpoints"][0]["volume"], "30");
        assert_eq!(js["results"]["checkpoints"][1]["volume"], "70");
        assert_eq!(js["results"]["directions"]["inbound"], "70");
        assert!(js["results"]["checkpoints"][0]["severity"].is_null());

        let pretty = serde_json::to_string_pretty(&js).unwrap();
        assert!(check_reference(&pretty, &js).is_ok());
        let mut other = js.clone();
        other["results"]["volume"] = json!("101");
        assert!(check_reference(&pretty, &other).is_err());
    }

    fn no_flags() -> Args {
        Args {
            config: None,
            weekly: vec![],
            monthly: None,
            year: None,
            month: None,
            sampled_weeks: None,
            out: None,
            reference: None,
            verbose: false,
        }
    }

    #[test]
    fn sampled_weeks_flag_keeps_the_configured_aggregation() {
        let args = Args {
            sampled_weeks: Some(2),
            ..no_flags()
        };
        let configured = RuleSettings {
            sampled_weeks: Some(1),
            aggregation: Some("sum".to_string()),
            ..RuleSettings::default()
        };
        let rules = validate_rules(&merge_rule_flags(&configured, &args)).unwrap();
        assert_eq!(rules.estimator.sampled_weeks, 2);
        assert_eq!(rules.estimator.aggregation, AggregationStrategy::Sum);

        let rules = validate_rules(&merge_rule_flags(&RuleSettings::default(), &args)).unwrap();
        assert_eq!(rules.estimator.aggregation, AggregationStrategy::Mean);

        let zero = Args {
            sampled_weeks: Some(0),
            ..no_flags()
        };
        assert!(validate_rules(&merge_rule_flags(&configured, &zero)).is_err());
    }

    #[test]
    fn missing_sources_are_reported() {
        let args = no_flags();
        let res = run_split(&args);
        assert!(matches!(res, Err(SplitError::Whatever { .. })));

        let args = Args {
            weekly: vec!["01-07-2024=w.xlsx".to_string()],
            monthly: Some("m.xlsx".to_string()),
            year: Some(2024),
            month: Some(13),
            ..args
        };
        let err = run_split(&args).unwrap_err();
        assert_eq!(err.to_string(), "month 13 is not between 1 and 12");
    }
}
