//! Failure cooldown persisted to a single marker file.
//!
//! The marker holds one ISO-8601 timestamp, overwritten on every failed
//! cycle. There is exactly one writer, so last-write-wins is fine.
use chrono::{Duration as ChronoDuration, NaiveDateTime};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ErrorMarker {
    path: PathBuf,
    window: ChronoDuration,
}

impl ErrorMarker {
    pub fn new(path: impl Into<PathBuf>, window_hours: i64) -> Self {
        Self {
            path: path.into(),
            window: ChronoDuration::hours(window_hours),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a new cycle may start. A missing file, empty content, or an
    /// unparsable timestamp all count as "no recent error".
    pub fn should_retry(&self, now: NaiveDateTime) -> bool {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return true,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "could not read error marker; proceeding");
                return true;
            }
        };

        let content = content.trim();
        if content.is_empty() {
            debug!("error marker is empty; assuming no recent error");
            return true;
        }

        match content.parse::<NaiveDateTime>() {
            Ok(last_error) => now >= last_error + self.window,
            Err(_) => {
                warn!(content, "invalid timestamp in error marker; ignoring and proceeding");
                true
            }
        }
    }

    /// Overwrite the marker with `now` in a round-trippable ISO-8601 form.
    pub fn record(&self, now: NaiveDateTime) -> io::Result<()> {
        fs::write(&self.path, format!("{}", now.format("%Y-%m-%dT%H:%M:%S%.6f")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn marker(dir: &tempfile::TempDir) -> ErrorMarker {
        ErrorMarker::new(dir.path().join("error_time.txt"), 24)
    }

    #[test]
    fn missing_file_allows_retry() {
        let td = tempdir().unwrap();
        assert!(marker(&td).should_retry(now()));
    }

    #[test]
    fn empty_file_allows_retry() {
        let td = tempdir().unwrap();
        let m = marker(&td);
        fs::write(m.path(), "").unwrap();
        assert!(m.should_retry(now()));
    }

    #[test]
    fn garbage_content_allows_retry() {
        let td = tempdir().unwrap();
        let m = marker(&td);
        fs::write(m.path(), "not a timestamp").unwrap();
        assert!(m.should_retry(now()));
    }

    #[test]
    fn record_then_check_blocks_retry() {
        let td = tempdir().unwrap();
        let m = marker(&td);
        m.record(now()).unwrap();
        assert!(!m.should_retry(now()));
        assert!(!m.should_retry(now() + ChronoDuration::hours(23)));
    }

    #[test]
    fn expired_window_allows_retry() {
        let td = tempdir().unwrap();
        let m = marker(&td);
        m.record(now()).unwrap();
        assert!(m.should_retry(now() + ChronoDuration::hours(24)));
        assert!(m.should_retry(now() + ChronoDuration::hours(48)));
    }

    #[test]
    fn record_round_trips_subseconds() {
        let td = tempdir().unwrap();
        let m = marker(&td);
        let ts = now() + ChronoDuration::microseconds(123_456);
        m.record(ts).unwrap();
        let content = fs::read_to_string(m.path()).unwrap();
        assert_eq!(content.parse::<NaiveDateTime>().unwrap(), ts);
    }
}
