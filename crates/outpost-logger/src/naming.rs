//! Timestamped log file names and discovery of existing log files

use crate::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Extension shared by every log file a session creates
pub const LOG_EXTENSION: &str = ".log";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H_%M_%S";

/// Build `<base>_[YYYY-MM-DD][HH_MM_SS.NNNNNNNNN].log`.
///
/// Nanoseconds are zero-padded so that names sort lexically in creation order.
pub fn log_file_name(base_name: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}{}", base_name, timestamp_suffix(at), LOG_EXTENSION)
}

/// Same as [`log_file_name`] but keeps any directory components of `base`
pub fn log_file_path(base: &Path, at: DateTime<Utc>) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push("_");
    name.push(timestamp_suffix(at));
    name.push(LOG_EXTENSION);
    PathBuf::from(name)
}

fn timestamp_suffix(at: DateTime<Utc>) -> String {
    format!(
        "[{}][{}.{:09}]",
        at.format(DATE_FORMAT),
        at.format(TIME_FORMAT),
        at.timestamp_subsec_nanos()
    )
}

/// Recover the creation timestamp embedded in a log file name
pub fn parse_timestamp(file_name: &str, base_name: &str) -> Option<DateTime<Utc>> {
    let stamp = file_name
        .strip_prefix(base_name)?
        .strip_prefix("_[")?
        .strip_suffix(LOG_EXTENSION)?
        .strip_suffix(']')?;
    let (date, time) = stamp.split_once("][")?;

    let naive = NaiveDateTime::parse_from_str(
        &format!("{} {}", date, time),
        &format!("{} {}%.f", DATE_FORMAT, TIME_FORMAT),
    )
    .ok()?;

    Some(naive.and_utc())
}

/// Information about a log file found on disk
#[derive(Debug, Clone)]
pub struct LogFileInfo {
    pub path: PathBuf,
    pub size: u64,
    pub timestamp: DateTime<Utc>,
}

/// All log files in `log_dir` created for `base_name`, oldest first.
///
/// Ordering uses the timestamp embedded in the name, never filesystem
/// metadata, so copies and restores do not reorder history.
pub fn find_log_files(log_dir: &Path, base_name: &str) -> Result<Vec<LogFileInfo>> {
    let mut log_files = Vec::new();

    if !log_dir.exists() {
        return Ok(log_files);
    }

    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();

        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if let Some(timestamp) = parse_timestamp(file_name, base_name) {
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }

            log_files.push(LogFileInfo {
                path,
                size: metadata.len(),
                timestamp,
            });
        }
    }

    log_files.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    Ok(log_files)
}

/// Total disk usage of the given log files
pub fn calculate_total_size(log_files: &[LogFileInfo]) -> u64 {
    log_files.iter().map(|f| f.size).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn at(nanos: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 5, 7, 8, 9).unwrap() + Duration::nanoseconds(nanos as i64)
    }

    #[test]
    fn test_file_name_format() {
        assert_eq!(
            log_file_name("rest_package", at(42)),
            "rest_package_[2024-01-05][07_08_09.000000042].log"
        );
    }

    #[test]
    fn test_file_path_keeps_directory() {
        let path = log_file_path(Path::new("/var/log/outpost/updater_package"), at(0));
        assert_eq!(
            path,
            PathBuf::from("/var/log/outpost/updater_package_[2024-01-05][07_08_09.000000000].log")
        );
    }

    #[test]
    fn test_parse_timestamp() {
        let name = log_file_name("updater", at(123_456_789));
        assert_eq!(parse_timestamp(&name, "updater"), Some(at(123_456_789)));

        assert_eq!(parse_timestamp(&name, "other"), None);
        assert_eq!(parse_timestamp("updater.log", "updater"), None);
        assert_eq!(parse_timestamp("updater_[garbage].log", "updater"), None);
    }

    #[test]
    fn test_base_name_prefix_is_not_ambiguous() {
        let name = log_file_name("rest_package", at(1));
        assert_eq!(parse_timestamp(&name, "rest"), None);
    }

    #[test]
    fn test_names_sort_chronologically() {
        let earlier = log_file_name("x", at(999));
        let later = log_file_name("x", at(1_000));
        assert!(earlier < later);
    }

    #[test]
    fn test_log_file_discovery() {
        let temp_dir = TempDir::new().unwrap();

        std::fs::write(temp_dir.path().join(log_file_name("test", at(3))), "newest").unwrap();
        std::fs::write(temp_dir.path().join(log_file_name("test", at(1))), "oldest").unwrap();
        std::fs::write(temp_dir.path().join(log_file_name("test", at(2))), "middle").unwrap();
        std::fs::write(temp_dir.path().join(log_file_name("other", at(0))), "other").unwrap();
        std::fs::write(temp_dir.path().join("test.log"), "unrelated").unwrap();

        let log_files = find_log_files(temp_dir.path(), "test").unwrap();

        assert_eq!(log_files.len(), 3);
        let stamps: Vec<_> = log_files.iter().map(|f| f.timestamp).collect();
        assert_eq!(stamps, vec![at(1), at(2), at(3)]);
        assert_eq!(calculate_total_size(&log_files), 18);
    }

    #[test]
    fn test_discovery_in_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        assert!(find_log_files(&missing, "test").unwrap().is_empty());
    }
}
