use chrono::NaiveDate;
use std::path::{Path, PathBuf};

use volume_split::HOURS_PER_DAY;

/// The file name of a path, used to label the units in the diagnostics.
pub fn simplify_file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Resolves a path of the configuration file against its directory.
pub fn resolve_path(root: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

pub fn hour_headers() -> Vec<String> {
    (0..HOURS_PER_DAY).map(|h| format!("{:02}:00:00", h)).collect()
}

/// Splits a `DATE=PATH` command line value.
pub fn split_weekly_flag(value: &str) -> Option<(String, String)> {
    let (date, path) = value.split_once('=')?;
    if date.trim().is_empty() || path.trim().is_empty() {
        return None;
    }
    Some((date.trim().to_string(), path.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_and_labels() {
        let root = Path::new("/data/run");
        assert_eq!(
            resolve_path(root, "weekly/1 juli.xlsx"),
            PathBuf::from("/data/run/weekly/1 juli.xlsx")
        );
        assert_eq!(resolve_path(root, "/tmp/x.xlsx"), PathBuf::from("/tmp/x.xlsx"));
        assert_eq!(
            simplify_file_name(Path::new("/data/run/weekly/1 juli.xlsx")),
            "1 juli.xlsx"
        );
    }

    #[test]
    fn weekly_flags() {
        assert_eq!(
            split_weekly_flag("01-07-2024=weekly/1 juli.xlsx"),
            Some(("01-07-2024".to_string(), "weekly/1 juli.xlsx".to_string()))
        );
        assert_eq!(split_weekly_flag("weekly.xlsx"), None);
        assert_eq!(split_weekly_flag("=weekly.xlsx"), None);
    }

    #[test]
    fn output_labels() {
        let d = NaiveDate::from_ymd_opt(2024, 7, 8).unwrap();
        assert_eq!(format_date(&d), "08-07-2024");
        let h = hour_headers();
        assert_eq!(h.len(), 24);
        assert_eq!(h[23], "23:00:00");
    }
}
