use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;

use crate::utils::error::{EngineError, EngineResult};

pub type LinePredicate = dyn Fn(&str) -> bool + Send + Sync;
/// Parses a line into an instant, disambiguated against `ref_date` for
/// sources that omit year/month (syslog-style timestamps).
pub type TimeParser = dyn Fn(NaiveDate, &str) -> Option<DateTime<Utc>> + Send + Sync;

/// Trims a line and collapses internal runs of whitespace into single
/// spaces, mirroring `RemoveExtraSpaces` in the source scanner.
pub fn normalize_line(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Time-bounded forward scan of a single log file.
///
/// Skips the file entirely (with no error) if its last-modification instant
/// precedes `start`. Lines are trimmed/collapsed, then time-parsed against
/// `ref_date`; lines before `start` are skipped silently, a line after `end`
/// terminates the scan, and lines in `[start, end]` matching `predicate` are
/// appended to the output in file order. A parse failure on one line is
/// logged once and the line is skipped; an I/O error aborts the scan and
/// discards any partial output.
pub fn scan_forward(
    path: &Path,
    ref_date: NaiveDate,
    predicate: &LinePredicate,
    time_parser: &TimeParser,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> EngineResult<Vec<String>> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(EngineError::Io(e)),
    };
    if let Ok(modified) = metadata.modified() {
        let modified: DateTime<Utc> = modified.into();
        if modified < start {
            return Ok(Vec::new());
        }
    }

    let file = std::fs::File::open(path).map_err(EngineError::Io)?;
    let reader = BufReader::new(file);
    let mut output = Vec::new();

    for line in reader.lines() {
        let line = line.map_err(EngineError::Io)?;
        let line = normalize_line(&line);
        if line.is_empty() {
            continue;
        }

        let instant = match time_parser(ref_date, &line) {
            Some(instant) => instant,
            None => {
                warn!(path = %path.display(), "log scanner: unparseable timestamp, skipping line");
                continue;
            }
        };

        if instant < start {
            continue;
        }
        if instant > end {
            break;
        }
        if predicate(&line) {
            output.push(line);
        }
    }

    Ok(output)
}

/// Reverse scan for sources without per-file date hints: reads from the end
/// toward the beginning, stopping as soon as a parsed instant drops below
/// `start`, then returns the accumulated lines in original file order.
pub fn scan_reverse(
    path: &Path,
    ref_date: NaiveDate,
    predicate: &LinePredicate,
    time_parser: &TimeParser,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> EngineResult<Vec<String>> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(EngineError::Io(e)),
    };

    let mut output = Vec::new();
    for line in text.lines().rev() {
        let line = normalize_line(line);
        if line.is_empty() {
            continue;
        }

        let instant = match time_parser(ref_date, &line) {
            Some(instant) => instant,
            None => {
                warn!(path = %path.display(), "log scanner: unparseable timestamp, skipping line");
                continue;
            }
        };

        if instant < start {
            break;
        }
        if instant > end {
            continue;
        }
        if predicate(&line) {
            output.push(line);
        }
    }

    output.reverse();
    Ok(output)
}

/// For rotated sources whose file names embed a date: scans each file in
/// name order, skipping any file whose last line's instant precedes
/// `start`, and concatenates matches across all files in file order.
pub fn scan_rotated(
    mut paths: Vec<std::path::PathBuf>,
    ref_date: NaiveDate,
    predicate: &LinePredicate,
    time_parser: &TimeParser,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> EngineResult<Vec<String>> {
    paths.sort();
    let mut output = Vec::new();

    for path in paths {
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(EngineError::Io(e)),
        };

        if let Some(last_line) = text.lines().rev().find(|l| !l.trim().is_empty()) {
            if let Some(last_instant) = time_parser(ref_date, &normalize_line(last_line)) {
                if last_instant < start {
                    continue;
                }
            }
        }

        let matches = scan_forward(&path, ref_date, predicate, time_parser, start, end)?;
        output.extend(matches);
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parser() -> Box<TimeParser> {
        Box::new(|_ref_date, line| {
            let ts: i64 = line.split_whitespace().next()?.parse().ok()?;
            Some(Utc.timestamp_opt(ts, 0).single()?)
        })
    }

    fn always() -> Box<LinePredicate> {
        Box::new(|_| true)
    }

    #[test]
    fn window_cut_keeps_only_lines_inside_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alert.log");
        let t = 1_000_000i64;
        std::fs::write(
            &path,
            format!(
                "{} before\n{} in1\n{} in2\n{} after\n",
                t - 3600,
                t + 60,
                t + 1800,
                t + 7200
            ),
        )
        .unwrap();

        let ref_date = Utc::now().date_naive();
        let start = Utc.timestamp_opt(t, 0).single().unwrap();
        let end = Utc.timestamp_opt(t + 3600, 0).single().unwrap();

        let lines = scan_forward(&path, ref_date, always().as_ref(), parser().as_ref(), start, end).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("in1"));
        assert!(lines[1].ends_with("in2"));
    }

    #[test]
    fn file_modified_before_start_is_skipped_entirely() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.log");
        std::fs::write(&path, "1000 stale\n").unwrap();

        let ref_date = Utc::now().date_naive();
        let far_future = Utc::now() + chrono::Duration::days(3650);
        let end = far_future + chrono::Duration::days(1);

        let lines =
            scan_forward(&path, ref_date, always().as_ref(), parser().as_ref(), far_future, end).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn missing_file_yields_empty_output_not_error() {
        let path = Path::new("/nonexistent/path/to/log.txt");
        let ref_date = Utc::now().date_naive();
        let lines =
            scan_forward(path, ref_date, always().as_ref(), parser().as_ref(), Utc::now(), Utc::now())
                .unwrap();
        assert!(lines.is_empty());
    }
}
