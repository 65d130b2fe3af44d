pub mod composite;
pub mod log;
pub mod shell;
pub mod sql;
pub mod workload;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{NodeDescriptor, Payload};
use crate::services::sql_adapter::SqlAdapter;
use crate::utils::error::EngineResult;

/// A handful of metrics assemble their payload from several SQL calls as a
/// single opaque unit (§4.4's "Composite" collector kind): each
/// implementation either returns a full payload or a single error.
#[async_trait]
pub trait CompositeCollector: Send + Sync {
    async fn collect(
        &self,
        adapter: &SqlAdapter,
        node: &NodeDescriptor,
        timeout: Duration,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> EngineResult<Payload>;
}
