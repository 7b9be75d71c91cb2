// Writing the result tables as CSV files.

use csv::WriterBuilder;
use volume_split::audit::{CheckpointGap, DateGap};
use volume_split::summary::{ClassShare, DailyTotal, DirectionTotal};

use crate::split::io_common::{format_date, hour_headers};
use crate::split::*;

fn write_table<I>(path: &Path, header: Vec<String>, rows: I) -> SplitResult<()>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let p = path.display().to_string();
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .context(WritingCsvSnafu { path: p.clone() })?;
    writer
        .write_record(&header)
        .context(WritingCsvSnafu { path: p.clone() })?;
    let mut count = 0;
    for row in rows {
        writer
            .write_record(&row)
            .context(WritingCsvSnafu { path: p.clone() })?;
        count += 1;
    }
    writer.flush().context(WritingFileSnafu { path: p.clone() })?;
    debug!("write_table: {:?}: {} rows", p, count);
    Ok(())
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn checkpoint_columns(registry: &CheckpointRegistry, cid: CheckpointId) -> [String; 2] {
    let direction = registry
        .get(cid)
        .map(|c| c.direction.to_string())
        .unwrap_or_default();
    [registry.name(cid), direction]
}

pub fn write_proportions(
    path: &Path,
    table: &ProportionTable,
    registry: &CheckpointRegistry,
) -> SplitResult<()> {
    let rows = table.entries().iter().map(|e| {
        vec![
            day_name(e.day_of_week).to_string(),
            registry.name(e.checkpoint),
            e.vehicle_class.to_string(),
            e.total.to_string(),
            e.class_total.to_string(),
            e.share.to_string(),
        ]
    });
    write_table(
        path,
        headers(&[
            "day_of_week",
            "checkpoint",
            "vehicle_class",
            "total",
            "class_total",
            "share",
        ]),
        rows,
    )
}

pub fn write_estimates(
    path: &Path,
    estimates: &[EstimatedRecord],
    registry: &CheckpointRegistry,
) -> SplitResult<()> {
    let mut header = headers(&["date", "checkpoint", "direction", "vehicle_class"]);
    header.extend(hour_headers());
    header.push("total".to_string());
    let rows = estimates.iter().map(|e| {
        let mut row = vec![format_date(&e.date)];
        row.extend(checkpoint_columns(registry, e.checkpoint));
        row.push(e.vehicle_class.to_string());
        row.extend(e.hourly_counts.iter().map(|v| v.to_string()));
        row.push(e.total().to_string());
        row
    });
    write_table(path, header, rows)
}

pub fn write_missing(
    path: &Path,
    missing: &[MissingCombination],
    registry: &CheckpointRegistry,
) -> SplitResult<()> {
    let rows = missing.iter().map(|m| {
        vec![
            format_date(&m.date),
            registry.name(m.checkpoint),
            m.vehicle_class.to_string(),
        ]
    });
    write_table(path, headers(&["date", "checkpoint", "vehicle_class"]), rows)
}

pub fn write_checkpoint_gaps(
    path: &Path,
    gaps: &[CheckpointGap],
    registry: &CheckpointRegistry,
) -> SplitResult<()> {
    let rows = gaps.iter().map(|g| {
        vec![
            registry.name(g.checkpoint),
            g.missing.to_string(),
            g.dates_affected.to_string(),
            g.classes_affected.to_string(),
            g.severity.to_string(),
        ]
    });
    write_table(
        path,
        headers(&[
            "checkpoint",
            "missing",
            "dates_affected",
            "classes_affected",
            "severity",
        ]),
        rows,
    )
}

pub fn write_date_gaps(
    path: &Path,
    gaps: &[DateGap],
    registry: &CheckpointRegistry,
) -> SplitResult<()> {
    let rows = gaps.iter().map(|g| {
        let classes: Vec<&str> = g.missing_classes.iter().map(|vc| vc.name()).collect();
        vec![
            registry.name(g.checkpoint),
            format_date(&g.date),
            classes.join("; "),
        ]
    });
    write_table(
        path,
        headers(&["checkpoint", "date", "missing_classes"]),
        rows,
    )
}

pub fn write_direction_totals(path: &Path, totals: &[DirectionTotal]) -> SplitResult<()> {
    let rows = totals.iter().map(|t| {
        vec![
            format_date(&t.date),
            t.direction.to_string(),
            t.total.to_string(),
        ]
    });
    write_table(path, headers(&["date", "direction", "total"]), rows)
}

pub fn write_daily_totals(
    path: &Path,
    totals: &[DailyTotal],
    registry: &CheckpointRegistry,
) -> SplitResult<()> {
    let rows = totals.iter().map(|t| {
        let mut row: Vec<String> = checkpoint_columns(registry, t.checkpoint).to_vec();
        row.push(format_date(&t.date));
        row.push(t.total.to_string());
        row
    });
    write_table(
        path,
        headers(&["checkpoint", "direction", "date", "total"]),
        rows,
    )
}

pub fn write_class_shares(
    path: &Path,
    shares: &[ClassShare],
    registry: &CheckpointRegistry,
) -> SplitResult<()> {
    let rows = shares.iter().map(|s| {
        vec![
            registry.name(s.checkpoint),
            s.vehicle_class.to_string(),
            s.total.to_string(),
            format!("{:.2}", s.percent),
        ]
    });
    write_table(
        path,
        headers(&["checkpoint", "vehicle_class", "total", "percent"]),
        rows,
    )
}

/// Writes all the tables of a run into `dir`. Returns the paths written.
pub fn write_all(
    dir: &Path,
    registry: &CheckpointRegistry,
    result: &EstimationResult,
) -> SplitResult<Vec<PathBuf>> {
    fs::create_dir_all(dir).context(WritingFileSnafu {
        path: dir.display().to_string(),
    })?;
    let estimates = &result.disaggregation.estimates;
    let report = &result.completeness;
    let p = |name: &str| dir.join(name);

    write_proportions(&p("proportions.csv"), &result.proportions, registry)?;
    write_estimates(&p("estimates.csv"), estimates, registry)?;
    write_missing(&p("missing.csv"), &report.missing, registry)?;
    write_checkpoint_gaps(&p("checkpoint_gaps.csv"), &report.checkpoint_gaps, registry)?;
    write_date_gaps(&p("date_gaps.csv"), &report.date_gaps, registry)?;
    write_direction_totals(
        &p("direction_totals.csv"),
        &summary::direction_totals(estimates, registry),
    )?;
    write_daily_totals(
        &p("daily_totals.csv"),
        &summary::daily_totals(estimates),
        registry,
    )?;
    write_class_shares(
        &p("class_shares.csv"),
        &summary::class_shares(estimates),
        registry,
    )?;

    let written: Vec<PathBuf> = [
        "proportions.csv",
        "estimates.csv",
        "missing.csv",
        "checkpoint_gaps.csv",
        "date_gaps.csv",
        "direction_totals.csv",
        "daily_totals.csv",
        "class_shares.csv",
    ]
    .iter()
    .map(|n| dir.join(n))
    .collect();
    info!("write_all: {} tables written to {:?}", written.len(), dir);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::env;

    fn temp_dir(name: &str) -> PathBuf {
        let d = env::temp_dir().join(format!("volsplit-{}-{}", name, std::process::id()));
        fs::create_dir_all(&d).unwrap();
        d
    }

    fn registry() -> CheckpointRegistry {
        CheckpointRegistry::new(vec![
            Checkpoint::new("diponegoro", Direction::Outbound),
            Checkpoint::new("brantas", Direction::Inbound),
        ])
        .unwrap()
    }

    fn estimate(cp: usize, per_hour: u64) -> EstimatedRecord {
        EstimatedRecord {
            date: NaiveDate::from_ymd_opt(2024, 7, 8).unwrap(),
            checkpoint: CheckpointId(cp),
            vehicle_class: VehicleClass::Motorcycle,
            hourly_counts: [per_hour; HOURS_PER_DAY],
        }
    }

    #[test]
    fn estimates_table_layout() {
        let dir = temp_dir("estimates");
        let path = dir.join("estimates.csv");
        write_estimates(&path, &[estimate(1, 2)], &registry()).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("date,checkpoint,direction,vehicle_class,00:00:00,01:00:00"));
        assert!(lines[0].ends_with("23:00:00,total"));
        assert!(lines[1].starts_with("08-07-2024,brantas,inbound,Sepeda motor,2,2"));
        assert!(lines[1].ends_with(",2,48"));
    }

    #[test]
    fn all_tables_are_written() {
        let dir = temp_dir("all");
        let proportions = ProportionTable::from_entries(vec![ProportionEntry {
            day_of_week: chrono::Weekday::Mon,
            checkpoint: CheckpointId(0),
            vehicle_class: VehicleClass::Motorcycle,
            total: 72.0,
            class_total: 96.0,
            share: 0.75,
        }]);
        let estimates = vec![estimate(0, 3)];
        let result = EstimationResult {
            completeness: audit_completeness(&estimates, &SeverityThresholds::default()),
            proportions,
            disaggregation: Disaggregation {
                estimates,
                join_misses: Vec::new(),
                unknown_excluded: 0,
            },
            diagnostics: Vec::new(),
        };
        let written = write_all(&dir, &registry(), &result).unwrap();
        assert_eq!(written.len(), 8);
        for p in written.iter() {
            assert!(p.exists(), "{:?}", p);
        }
        let proportions = fs::read_to_string(dir.join("proportions.csv")).unwrap();
        assert_eq!(
            proportions.lines().nth(1),
            Some("Monday,diponegoro,Sepeda motor,72,96,0.75")
        );
        let shares = fs::read_to_string(dir.join("class_shares.csv")).unwrap();
        assert_eq!(shares.lines().nth(1), Some("diponegoro,Sepeda motor,72,100.00"));
        let missing = fs::read_to_string(dir.join("missing.csv")).unwrap();
        assert_eq!(missing.lines().count(), 1);
    }
}
