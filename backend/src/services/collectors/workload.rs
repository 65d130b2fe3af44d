use chrono::{DateTime, NaiveTime, Utc};

use crate::models::Payload;
use crate::services::workload_sampler::{historical, ArchiveSource, WorkloadSampler};
use crate::utils::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadMode {
    Current,
    Historical,
}

/// Dispatches to §4.7's current or historical sub-mode, wrapping either
/// result in a `Workload` payload.
pub async fn collect(
    mode: WorkloadMode,
    sampler: &WorkloadSampler,
    sys_activity_cmd: Option<&str>,
    archive_source: Option<&dyn ArchiveSource>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    day_bounds: Option<(NaiveTime, NaiveTime)>,
) -> EngineResult<Payload> {
    match mode {
        WorkloadMode::Current => Ok(Payload::Workload(sampler.current(sys_activity_cmd).await)),
        WorkloadMode::Historical => {
            let source = archive_source
                .ok_or_else(|| EngineError::config_invalid("historical workload requires an archive source"))?;
            let series = historical(start, end, source, day_bounds)?;
            Ok(Payload::Workload(series))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn current_mode_falls_back_without_a_configured_tool() {
        let sampler = WorkloadSampler {
            scrape_interval: Duration::from_millis(10),
            scrape_times: 1,
            network_discard: vec![],
        };
        let payload = collect(WorkloadMode::Current, &sampler, None, None, Utc::now(), Utc::now(), None)
            .await
            .unwrap();
        match payload {
            Payload::Workload(series) => assert_eq!(series.len(), 1),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn historical_mode_without_archive_source_is_an_error() {
        let sampler = WorkloadSampler { scrape_interval: Duration::from_secs(1), scrape_times: 1, network_discard: vec![] };
        let result =
            collect(WorkloadMode::Historical, &sampler, None, None, Utc::now(), Utc::now(), None).await;
        assert!(result.is_err());
    }
}
