//! Day-granularity freshness checks for persisted outputs.
//!
//! The rebuild-or-reuse decision belongs to the caller; the core only
//! answers "does this output already reflect today?". Freshness compares
//! calendar dates, not timestamps: an output written at 00:01 is fresh for
//! the rest of that day.

use chrono::{Local, NaiveDate};
use std::fs;
use std::path::Path;

/// True when a persisted output at `path` was last modified today.
/// A missing or unreadable file is never fresh.
pub fn is_fresh(path: &Path) -> bool {
    modified_date(path)
        .map(|d| is_fresh_on(d, Local::now().date_naive()))
        .unwrap_or(false)
}

/// Date-level comparison behind [`is_fresh`], split out so tests can pin
/// "today".
pub fn is_fresh_on(modified: NaiveDate, today: NaiveDate) -> bool {
    modified == today
}

/// Local calendar date of a file's last modification.
pub fn modified_date(path: &Path) -> Option<NaiveDate> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let datetime: chrono::DateTime<Local> = modified.into();
    Some(datetime.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::env;

    #[test]
    fn same_day_is_fresh_previous_day_is_not() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        assert!(is_fresh_on(today, today));
        assert!(!is_fresh_on(today - Duration::days(1), today));
        assert!(!is_fresh_on(today + Duration::days(1), today));
    }

    #[test]
    fn freshly_written_file_is_fresh() {
        let path = env::temp_dir().join(format!("macrolab_fresh_{}", std::process::id()));
        fs::write(&path, b"x").unwrap();
        assert!(is_fresh(&path));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_never_fresh() {
        assert!(!is_fresh(Path::new("/nonexistent/macrolab/output.csv")));
    }
}
