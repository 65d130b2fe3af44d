use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use sysinfo::{Disks, Networks, System};
use tracing::{debug, warn};

use crate::models::WorkloadSeries;
use crate::utils::error::EngineResult;

/// Supplies one day's worth of archived workload samples. The historical
/// sampler decomposes the requested window into day-bounded intervals and
/// consults one source call per day; the concrete file layout (`sar`
/// archive naming, rotation scheme) is the implementation's choice, not a
/// hardcoded assumption, per the design note to not hardcode day-boundary
/// exclusivity.
pub trait ArchiveSource: Send + Sync {
    fn read_day(&self, day: NaiveDate) -> EngineResult<WorkloadSeries>;
}

/// Reads one JSON-encoded `WorkloadSeries` file per day from a directory,
/// named `sa<DD>.json`, mirroring the `sar_dir` daily-archive convention.
pub struct SarDirArchiveSource {
    pub sar_dir: PathBuf,
}

impl ArchiveSource for SarDirArchiveSource {
    fn read_day(&self, day: NaiveDate) -> EngineResult<WorkloadSeries> {
        let path = self.sar_dir.join(format!("sa{:02}.json", day.day()));
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(serde_json::from_str(&text).unwrap_or_default()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no archive for day, treating as empty");
                Ok(WorkloadSeries::default())
            }
            Err(e) => Err(crate::utils::error::EngineError::Io(e)),
        }
    }
}

/// Decomposes `[start, end]` into day-bounded intervals, consults `source`
/// once per day, and merges the results keyed by unix-second timestamp.
/// `day_bounds`, when set, additionally restricts samples on the first and
/// last day to the given time-of-day window.
pub fn historical(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    source: &dyn ArchiveSource,
    day_bounds: Option<(NaiveTime, NaiveTime)>,
) -> EngineResult<WorkloadSeries> {
    let mut merged = WorkloadSeries::new();
    if start > end {
        return Ok(merged);
    }

    let first_day = start.date_naive();
    let last_day = end.date_naive();
    let mut day = first_day;

    loop {
        let day_series = source.read_day(day)?;
        for (ts, subjects) in day_series {
            let Some(instant) = DateTime::<Utc>::from_timestamp(ts, 0) else { continue };
            if instant < start || instant > end {
                continue;
            }
            if let Some((tod_start, tod_end)) = day_bounds {
                let time_of_day = instant.time();
                if day == first_day && time_of_day < tod_start {
                    continue;
                }
                if day == last_day && time_of_day > tod_end {
                    continue;
                }
            }
            merged.insert(ts, subjects);
        }

        if day >= last_day {
            break;
        }
        day = day.succ_opt().unwrap_or(last_day);
    }

    Ok(merged)
}

/// Current-mode sampling: prefers an external system-activity tool when
/// `sys_activity_cmd` is given and spawnable; otherwise falls back to
/// in-process two-point-delta sampling over `sysinfo` counters.
pub struct WorkloadSampler {
    pub scrape_interval: Duration,
    pub scrape_times: usize,
    pub network_discard: Vec<Regex>,
}

impl WorkloadSampler {
    pub async fn current(&self, sys_activity_cmd: Option<&str>) -> WorkloadSeries {
        if let Some(cmd) = sys_activity_cmd {
            match self.current_via_tool(cmd).await {
                Ok(series) if !series.is_empty() => return series,
                Ok(_) => warn!("system activity tool produced no samples, falling back"),
                Err(e) => warn!(error = %e, "system activity tool failed, falling back"),
            }
        }
        self.current_fallback().await
    }

    /// Spawns the configured system-activity command once, expecting a JSON
    /// array of `{timestamp, subjects}` samples on stdout — one element per
    /// requested sample.
    async fn current_via_tool(&self, cmd: &str) -> EngineResult<WorkloadSeries> {
        let output = tokio::process::Command::new(cmd)
            .arg(self.scrape_interval.as_secs().to_string())
            .arg(self.scrape_times.to_string())
            .output()
            .await
            .map_err(crate::utils::error::EngineError::Io)?;

        if !output.status.success() {
            return Err(crate::utils::error::EngineError::config_invalid(
                "system activity tool exited non-zero",
            ));
        }

        #[derive(serde::Deserialize)]
        struct Sample {
            timestamp: i64,
            subjects: BTreeMap<String, BTreeMap<String, f64>>,
        }
        let samples: Vec<Sample> = serde_json::from_slice(&output.stdout)
            .map_err(|e| crate::utils::error::EngineError::config_invalid(e.to_string()))?;

        Ok(samples.into_iter().map(|s| (s.timestamp, s.subjects)).collect())
    }

    async fn current_fallback(&self) -> WorkloadSeries {
        let mut series = WorkloadSeries::new();
        let mut sys = System::new_all();
        let mut prev_net: BTreeMap<String, (u64, u64)> = BTreeMap::new();

        for i in 0..self.scrape_times {
            sys.refresh_all();
            let networks = Networks::new_with_refreshed_list();
            let disks = Disks::new_with_refreshed_list();

            let ts = Utc::now().timestamp();
            let mut subjects: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();

            for (idx, cpu) in sys.cpus().iter().enumerate() {
                let mut measurements = BTreeMap::new();
                measurements.insert("usage_percent".to_string(), cpu.cpu_usage() as f64);
                subjects.insert(format!("cpu{idx}"), measurements);
            }

            let total_mem = sys.total_memory().max(1) as f64;
            let mut mem = BTreeMap::new();
            mem.insert("used_percent".to_string(), sys.used_memory() as f64 / total_mem * 100.0);
            subjects.insert("memory".to_string(), mem);

            for disk in disks.list() {
                let name = disk.name().to_string_lossy().to_string();
                let total = disk.total_space().max(1) as f64;
                let available = disk.available_space() as f64;
                let mut measurements = BTreeMap::new();
                measurements.insert("used_percent".to_string(), (1.0 - available / total) * 100.0);
                subjects.insert(format!("disk:{name}"), measurements);
            }

            for (name, data) in networks.iter() {
                if self.network_discard.iter().any(|re| re.is_match(name)) {
                    continue;
                }
                let rx = data.total_received();
                let tx = data.total_transmitted();
                if let Some((prev_rx, prev_tx)) = prev_net.get(name) {
                    let mut measurements = BTreeMap::new();
                    let secs = self.scrape_interval.as_secs_f64().max(f64::EPSILON);
                    measurements.insert(
                        "rx_bytes_per_sec".to_string(),
                        rx.saturating_sub(*prev_rx) as f64 / secs,
                    );
                    measurements.insert(
                        "tx_bytes_per_sec".to_string(),
                        tx.saturating_sub(*prev_tx) as f64 / secs,
                    );
                    subjects.insert(format!("net:{name}"), measurements);
                }
                prev_net.insert(name.clone(), (rx, tx));
            }

            series.insert(ts, subjects);

            if i + 1 < self.scrape_times {
                tokio::time::sleep(self.scrape_interval).await;
            }
        }

        series
    }
}

pub fn compile_discard_list(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(pattern = %p, error = %e, "invalid network_io_discard pattern, ignoring");
                None
            }
        })
        .collect()
}
