use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::models::{MetricDefinition, MetricType, NodeDescriptor, Payload, ResultItem};
use crate::services::collectors::composite::WaitEventCollector;
use crate::services::collectors::log::{LogCollectorSpec, ScanMode};
use crate::services::collectors::workload::WorkloadMode;
use crate::services::collectors::{log as log_collector, shell as shell_collector, sql as sql_collector, workload as workload_collector, CompositeCollector};
use crate::services::log_scanner::{LinePredicate, TimeParser};
use crate::services::node_selector::{NodeSelector, SelectionMode};
use crate::services::preflight::{LogPathResolver, PreflightContext, PreflightDecision, PreflightPolicy};
use crate::services::result_store::ResultStore;
use crate::services::sql_adapter::SqlAdapter;
use crate::services::workload_sampler::{ArchiveSource, WorkloadSampler};
use crate::utils::error::{EngineError, EngineResult};

/// The typed collector kinds a metric is routed to, per §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorKind {
    SqlSingleRow,
    SqlMultiRow,
    Shell,
    LogTail,
    Workload,
    Composite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressState {
    Running,
    Done,
    Failed,
}

/// One `(module, metric, state)` event for a progress bar. A side channel:
/// a full or closed receiver never blocks collection.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub module: String,
    pub metric: String,
    pub node_id: Option<String>,
    pub state: ProgressState,
}

/// Per-metric wiring the dispatcher cannot infer from `MetricDefinition`
/// alone: which typed collector applies, its node-selection mode, and (for
/// the kinds that need it) log-scan or workload sub-mode detail. Adding a
/// metric that fits a default shape needs no registration at all.
#[derive(Default)]
pub struct DispatcherRegistry {
    kinds: HashMap<String, CollectorKind>,
    selection_modes: HashMap<String, SelectionMode>,
    log_specs: HashMap<String, Arc<LogCollectorSpec>>,
    workload_modes: HashMap<String, WorkloadMode>,
    composite: HashMap<String, Arc<dyn CompositeCollector>>,
}

impl DispatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_kind(&mut self, metric: impl Into<String>, kind: CollectorKind) -> &mut Self {
        self.kinds.insert(metric.into(), kind);
        self
    }

    pub fn register_selection(&mut self, metric: impl Into<String>, mode: SelectionMode) -> &mut Self {
        self.selection_modes.insert(metric.into(), mode);
        self
    }

    pub fn register_log_spec(&mut self, metric: impl Into<String>, spec: LogCollectorSpec) -> &mut Self {
        self.log_specs.insert(metric.into(), Arc::new(spec));
        self
    }

    pub fn register_workload_mode(&mut self, metric: impl Into<String>, mode: WorkloadMode) -> &mut Self {
        self.workload_modes.insert(metric.into(), mode);
        self
    }

    pub fn register_composite(&mut self, metric: impl Into<String>, collector: Arc<dyn CompositeCollector>) -> &mut Self {
        self.composite.insert(metric.into(), collector);
        self
    }

    fn kind_for(&self, metric: &MetricDefinition) -> CollectorKind {
        self.kinds.get(&metric.name).copied().unwrap_or(match metric.metric_type {
            MetricType::Sql => CollectorKind::SqlSingleRow,
            MetricType::Shell => CollectorKind::Shell,
            MetricType::Builtin => CollectorKind::Composite,
        })
    }

    fn selection_for(&self, metric: &str) -> SelectionMode {
        self.selection_modes.get(metric).copied().unwrap_or(SelectionMode::AllConnectedOptedIn)
    }
}

/// Registers the collector kind, node-selection mode, and (for the kinds
/// that need it) log/workload sub-mode for every metric that doesn't fit the
/// `MetricType`-driven default, mirroring the original's per-metric
/// dispatch table. Callers append registrations for user-defined metrics.
pub fn default_dispatcher_registry() -> DispatcherRegistry {
    let mut registry = DispatcherRegistry::new();

    registry
        .register_kind("yasdb_run_log", CollectorKind::LogTail)
        .register_selection("yasdb_run_log", SelectionMode::CurrentNodeOnly)
        .register_log_spec(
            "yasdb_run_log",
            LogCollectorSpec { predicate: run_log_predicate(), time_parser: yasdb_log_time_parser(), mode: ScanMode::Forward },
        )
        .register_kind("yasdb_alert_log", CollectorKind::LogTail)
        .register_selection("yasdb_alert_log", SelectionMode::CurrentNodeOnly)
        .register_log_spec(
            "yasdb_alert_log",
            LogCollectorSpec { predicate: alert_log_predicate(), time_parser: yasdb_log_time_parser(), mode: ScanMode::Forward },
        )
        .register_kind("host_workload_current", CollectorKind::Workload)
        .register_selection("host_workload_current", SelectionMode::CurrentNodeOnly)
        .register_workload_mode("host_workload_current", WorkloadMode::Current)
        .register_kind("host_workload_historical", CollectorKind::Workload)
        .register_selection("host_workload_historical", SelectionMode::CurrentNodeOnly)
        .register_workload_mode("host_workload_historical", WorkloadMode::Historical)
        .register_kind("yasdb_wait_event", CollectorKind::Composite)
        .register_composite("yasdb_wait_event", Arc::new(WaitEventCollector) as Arc<dyn CompositeCollector>)
        .register_selection("yasdb_wait_event", SelectionMode::PrimaryOnly)
        .register_selection("yasdb_deployment_architecture", SelectionMode::PrimaryOnly)
        .register_selection("yasdb_workload_repository", SelectionMode::PrimaryOnly);

    registry
}

/// Run-log lines worth keeping: those carrying an error number, per the
/// original's `errno`-substring filter.
fn run_log_predicate() -> Arc<LinePredicate> {
    Arc::new(|line: &str| line.contains("errno"))
}

/// Alert-log lines worth keeping: pipe-delimited rows whose action field
/// (5th column) is `0`, the original's "rising" action marker.
fn alert_log_predicate() -> Arc<LinePredicate> {
    Arc::new(|line: &str| line.split('|').nth(4).map(|f| f.trim() == "0").unwrap_or(false))
}

/// Parses the leading `YYYY-MM-DD HH:MM:SS[.ffffff]` timestamp yasdb's
/// run/alert log lines carry.
fn yasdb_log_time_parser() -> Arc<TimeParser> {
    let pattern = Regex::new(r"^(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}(?:\.\d+)?)").expect("static regex is valid");
    Arc::new(move |_ref_date: NaiveDate, line: &str| {
        let captured = pattern.captures(line)?;
        let stamp = captured.get(1)?.as_str();
        let naive = chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S%.f")
            .or_else(|_| chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S"))
            .ok()?;
        Some(Utc.from_utc_datetime(&naive))
    })
}

/// Shared, immutable state every in-flight collector reads; built once per
/// run and handed to the dispatcher behind an `Arc`.
pub struct Dispatcher {
    pub sql_adapter: SqlAdapter,
    pub preflight: PreflightPolicy,
    pub registry: DispatcherRegistry,
    pub sql_timeout: Duration,
    pub max_concurrency: usize,
    pub effective_uid: u32,
    pub platform_id: String,
    pub log_path_resolver: Arc<LogPathResolver>,
    pub sys_activity_cmd: Option<String>,
    pub archive_source: Option<Arc<dyn ArchiveSource>>,
    pub workload_sampler: WorkloadSampler,
}

impl Dispatcher {
    /// Schedules one collector task per `(metric, target-node)` pair across
    /// a bounded pool, reporting progress on `progress_tx` and writing every
    /// outcome (success or failure) into `store`. Returns `Err(Cancelled)`
    /// only if the run was cancelled before every task finished; individual
    /// metric failures never abort the run.
    pub async fn run(
        self: Arc<Self>,
        metrics: Vec<MetricDefinition>,
        nodes: Vec<NodeDescriptor>,
        current_node_id: String,
        module_of: Arc<HashMap<String, String>>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        ref_date: NaiveDate,
        cancel: CancellationToken,
        progress_tx: mpsc::UnboundedSender<ProgressEvent>,
        store: Arc<ResultStore>,
    ) -> EngineResult<()> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency.max(1)));
        let nodes = Arc::new(nodes);
        let mut join_set = JoinSet::new();

        for metric in metrics {
            if cancel.is_cancelled() {
                break;
            }

            let metric = Arc::new(metric);
            let selection = self.registry.selection_for(&metric.name);
            let targets: Vec<NodeDescriptor> = {
                let selector = NodeSelector::new(&nodes, &current_node_id);
                selector.select(selection).into_iter().cloned().collect()
            };

            for node in targets {
                let this = Arc::clone(&self);
                let metric = Arc::clone(&metric);
                let node = Arc::new(node);
                let module = module_of.get(&metric.name).cloned().unwrap_or_else(|| metric.module_name.clone());
                let semaphore = Arc::clone(&semaphore);
                let cancel = cancel.clone();
                let progress_tx = progress_tx.clone();
                let store = Arc::clone(&store);

                join_set.spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return,
                    };
                    if cancel.is_cancelled() {
                        return;
                    }

                    let _ = progress_tx.send(ProgressEvent {
                        module: module.clone(),
                        metric: metric.name.clone(),
                        node_id: Some(node.node_id.clone()),
                        state: ProgressState::Running,
                    });

                    let item = tokio::select! {
                        _ = cancel.cancelled() => {
                            ResultItem::failure(metric.name.clone(), Some(node.node_id.clone()), "run cancelled")
                        }
                        result = this.collect_one(&metric, &node, window_start, window_end, ref_date) => {
                            match result {
                                Ok(payload) => ResultItem::success(metric.name.clone(), Some(node.node_id.clone()), payload),
                                Err(e) => ResultItem::failure(metric.name.clone(), Some(node.node_id.clone()), e.to_string()),
                            }
                        }
                    };

                    let state = if item.is_success() { ProgressState::Done } else { ProgressState::Failed };
                    let _ = progress_tx.send(ProgressEvent {
                        module,
                        metric: metric.name.clone(),
                        node_id: Some(node.node_id.clone()),
                        state,
                    });

                    if let Err(e) = store.insert(item).await {
                        warn!(metric = %metric.name, node = %node.node_id, error = %e, "dropping duplicate result write");
                    }
                });
            }
        }

        while join_set.join_next().await.is_some() {}

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    async fn collect_one(
        &self,
        metric: &MetricDefinition,
        node: &NodeDescriptor,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        ref_date: NaiveDate,
    ) -> EngineResult<Payload> {
        if !node.is_reachable() {
            return Err(EngineError::node_unreachable(&node.node_id, "no credentials or system auth configured"));
        }

        let ctx = PreflightContext {
            sql_adapter: &self.sql_adapter,
            probe_node: node,
            sql_timeout: self.sql_timeout,
            effective_uid: self.effective_uid,
            platform_id: self.platform_id.clone(),
            log_path_resolver: self.log_path_resolver.as_ref(),
        };
        if let PreflightDecision::Skip { reason, cause } = self.preflight.evaluate(&metric.name, &ctx).await {
            return Err(EngineError::metric_skipped(&metric.name, format!("{reason}: {cause}")));
        }

        match self.registry.kind_for(metric) {
            CollectorKind::SqlSingleRow => {
                sql_collector::collect_single_row(&self.sql_adapter, metric, node, self.sql_timeout).await
            }
            CollectorKind::SqlMultiRow => {
                sql_collector::collect_multi_row(&self.sql_adapter, metric, node, self.sql_timeout).await
            }
            CollectorKind::Shell => shell_collector::collect(metric, &node.node_id, self.sql_timeout).await,
            CollectorKind::LogTail => {
                let spec = self
                    .registry
                    .log_specs
                    .get(&metric.name)
                    .ok_or_else(|| EngineError::metric_failed(&metric.name, &node.node_id, "no log collector spec registered"))?;
                let paths: Vec<PathBuf> = (self.log_path_resolver.as_ref())(&metric.name).into_iter().collect();
                log_collector::collect(spec, &metric.name, &node.node_id, paths, ref_date, window_start, window_end).await
            }
            CollectorKind::Workload => {
                let mode = self.registry.workload_modes.get(&metric.name).copied().unwrap_or(WorkloadMode::Current);
                workload_collector::collect(
                    mode,
                    &self.workload_sampler,
                    self.sys_activity_cmd.as_deref(),
                    self.archive_source.as_deref(),
                    window_start,
                    window_end,
                    None,
                )
                .await
            }
            CollectorKind::Composite => {
                let collector = self
                    .registry
                    .composite
                    .get(&metric.name)
                    .ok_or_else(|| EngineError::metric_failed(&metric.name, &node.node_id, "no composite collector registered"))?;
                collector.collect(&self.sql_adapter, node, self.sql_timeout, window_start, window_end).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeRole;
    use std::collections::HashMap as StdHashMap;

    fn shell_metric(name: &str, command: &str) -> MetricDefinition {
        MetricDefinition {
            name: name.into(),
            name_alias: String::new(),
            name_alias_en: String::new(),
            module_name: "host".into(),
            metric_type: MetricType::Shell,
            hidden: false,
            default: true,
            enabled: true,
            column_order: vec![],
            hidden_columns: vec![],
            byte_columns: vec![],
            percent_columns: vec![],
            number_columns: vec![],
            labels: vec![],
            alert_rules: StdHashMap::new(),
            sql: None,
            command: Some(command.to_string()),
        }
    }

    fn node(id: &str) -> NodeDescriptor {
        NodeDescriptor {
            node_id: id.into(),
            listen_addr: "127.0.0.1:1688".into(),
            role: NodeRole::Primary,
            user: Some("SYS".into()),
            password: Some("pwd".into()),
            connected: true,
            opted_in: true,
            system_auth: false,
            data_dir: None,
        }
    }

    fn dispatcher() -> Arc<Dispatcher> {
        Arc::new(Dispatcher {
            sql_adapter: SqlAdapter::new("/bin/true"),
            preflight: PreflightPolicy::new(),
            registry: DispatcherRegistry::new(),
            sql_timeout: Duration::from_secs(5),
            max_concurrency: 4,
            effective_uid: 1000,
            platform_id: "ubuntu".into(),
            log_path_resolver: Arc::new(|_: &str| None),
            sys_activity_cmd: None,
            archive_source: None,
            workload_sampler: WorkloadSampler {
                scrape_interval: Duration::from_millis(10),
                scrape_times: 1,
                network_discard: vec![],
            },
        })
    }

    #[tokio::test]
    async fn shell_metric_runs_and_is_stored() {
        let dispatcher = dispatcher();
        let metrics = vec![shell_metric("host_uptime", "echo up")];
        let nodes = vec![node("n0")];
        let store = Arc::new(ResultStore::new());
        let (tx, mut rx) = mpsc::unbounded_channel();

        dispatcher
            .run(
                metrics,
                nodes,
                "n0".into(),
                Arc::new(StdHashMap::new()),
                Utc::now(),
                Utc::now(),
                Utc::now().date_naive(),
                CancellationToken::new(),
                tx,
                Arc::clone(&store),
            )
            .await
            .unwrap();

        assert_eq!(store.len().await, 1);
        let snapshot = store.snapshot().await;
        assert!(snapshot[0].is_success());

        let mut saw_running = false;
        let mut saw_done = false;
        while let Ok(event) = rx.try_recv() {
            match event.state {
                ProgressState::Running => saw_running = true,
                ProgressState::Done => saw_done = true,
                ProgressState::Failed => panic!("unexpected failure event"),
            }
        }
        assert!(saw_running && saw_done);
    }

    #[tokio::test]
    async fn unreachable_node_produces_a_failed_result_not_a_panic() {
        let dispatcher = dispatcher();
        let mut unreachable = node("n0");
        unreachable.user = None;
        unreachable.password = None;
        let metrics = vec![shell_metric("host_uptime", "echo up")];
        let store = Arc::new(ResultStore::new());
        let (tx, _rx) = mpsc::unbounded_channel();

        dispatcher
            .run(
                metrics,
                vec![unreachable],
                "n0".into(),
                Arc::new(StdHashMap::new()),
                Utc::now(),
                Utc::now(),
                Utc::now().date_naive(),
                CancellationToken::new(),
                tx,
                Arc::clone(&store),
            )
            .await
            .unwrap();

        let snapshot = store.snapshot().await;
        assert!(!snapshot[0].is_success());
    }

    #[tokio::test]
    async fn pre_cancelled_run_returns_cancelled_error() {
        let dispatcher = dispatcher();
        let metrics = vec![shell_metric("host_uptime", "sleep 5")];
        let store = Arc::new(ResultStore::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = dispatcher
            .run(
                metrics,
                vec![node("n0")],
                "n0".into(),
                Arc::new(StdHashMap::new()),
                Utc::now(),
                Utc::now(),
                Utc::now().date_naive(),
                cancel,
                tx,
                store,
            )
            .await;

        assert!(matches!(result, Err(EngineError::Cancelled)));
    }
}
