use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{NodeDescriptor, Payload};
use crate::services::collectors::CompositeCollector;
use crate::services::sql_adapter::SqlAdapter;
use crate::utils::error::{EngineError, EngineResult};

const METRIC_NAME: &str = "yasdb_wait_event";

/// Top foreground wait events over the run window: a three-query composite
/// (snapshot range lookup, then the event rows bounded by that range),
/// mirroring the original's snapshot-bracketing approach.
pub struct WaitEventCollector;

#[async_trait]
impl CompositeCollector for WaitEventCollector {
    async fn collect(
        &self,
        adapter: &SqlAdapter,
        node: &NodeDescriptor,
        timeout: Duration,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> EngineResult<Payload> {
        let snapshot_sql = format!(
            "select snap_id from sys.wrm$_snapshot where begin_interval_time between '{}' and '{}'",
            window_start.format("%Y-%m-%d %H:%M:%S"),
            window_end.format("%Y-%m-%d %H:%M:%S"),
        );
        let snapshots = adapter
            .query(node, &snapshot_sql, timeout)
            .await
            .map_err(|e| EngineError::metric_failed(METRIC_NAME, &node.node_id, e.to_string()))?;

        let snap_ids: Vec<i64> = snapshots
            .iter()
            .filter_map(|row| row.get("snap_id"))
            .filter_map(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .collect();

        let (start_id, end_id) = match (snap_ids.iter().min(), snap_ids.iter().max()) {
            (Some(min), Some(max)) => (*min, *max),
            _ => return Err(EngineError::metric_failed(METRIC_NAME, &node.node_id, "no snapshots in window")),
        };

        let events_sql = format!(
            "select event, total_wait_time, avg_wait_ms, pct_db_time, wait_class, waits \
             from sys.wrh$_system_event where snap_id between {start_id} and {end_id}"
        );
        let rows = adapter
            .query(node, &events_sql, timeout)
            .await
            .map_err(|e| EngineError::metric_failed(METRIC_NAME, &node.node_id, e.to_string()))?;

        Ok(Payload::Rows(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_snapshots_in_window_is_a_metric_failure() {
        let adapter = SqlAdapter::new("/bin/echo");
        let node = NodeDescriptor {
            node_id: "n0".into(),
            listen_addr: "127.0.0.1:1688".into(),
            role: crate::models::NodeRole::Primary,
            user: Some("SYS".into()),
            password: Some("pwd".into()),
            connected: true,
            opted_in: true,
            system_auth: false,
            data_dir: None,
        };
        let result = WaitEventCollector
            .collect(&adapter, &node, Duration::from_secs(1), Utc::now(), Utc::now())
            .await;
        assert!(result.is_err());
    }
}
