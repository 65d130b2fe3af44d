use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::Payload;
use crate::services::log_scanner::{scan_forward, scan_reverse, scan_rotated, LinePredicate, TimeParser};
use crate::utils::error::{EngineError, EngineResult};

/// How a log-tail metric's source files are organized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Single current file, scanned start-to-end.
    Forward,
    /// Single current file without reliable per-line dates, scanned
    /// end-to-start.
    Reverse,
    /// Multiple date-named files, newest content last.
    Rotated,
}

/// A metric's log-tail behavior: which lines to keep, how to parse a line's
/// timestamp, and which scan strategy its source file(s) need.
pub struct LogCollectorSpec {
    pub predicate: Arc<LinePredicate>,
    pub time_parser: Arc<TimeParser>,
    pub mode: ScanMode,
}

/// Scans `paths` per `spec.mode` and joins the matched lines into a text
/// payload (one line per match, in file order).
pub async fn collect(
    spec: &LogCollectorSpec,
    metric: &str,
    node_id: &str,
    paths: Vec<PathBuf>,
    ref_date: NaiveDate,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> EngineResult<Payload> {
    let lines = match spec.mode {
        ScanMode::Forward => {
            let path = paths
                .into_iter()
                .next()
                .ok_or_else(|| EngineError::metric_failed(metric, node_id, "no log path resolved"))?;
            scan_forward(&path, ref_date, spec.predicate.as_ref(), spec.time_parser.as_ref(), start, end)?
        }
        ScanMode::Reverse => {
            let path = paths
                .into_iter()
                .next()
                .ok_or_else(|| EngineError::metric_failed(metric, node_id, "no log path resolved"))?;
            scan_reverse(&path, ref_date, spec.predicate.as_ref(), spec.time_parser.as_ref(), start, end)?
        }
        ScanMode::Rotated => {
            scan_rotated(paths, ref_date, spec.predicate.as_ref(), spec.time_parser.as_ref(), start, end)?
        }
    };

    Ok(Payload::Text(lines.join("\n")))
}
