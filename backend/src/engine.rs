use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::models::{EvaluationModel, NodeDescriptor};
use crate::registry::{load_evaluation_model, MetricRegistry, ModuleRegistry};
use crate::services::connectivity;
use crate::services::dispatcher::{default_dispatcher_registry, Dispatcher, ProgressEvent};
use crate::services::preflight::{default_policy, LogPathResolver};
use crate::services::report_builder::{self, BuildContext, MergeRule, ReportDocument};
use crate::services::result_store::ResultStore;
use crate::services::sql_adapter::SqlAdapter;
use crate::services::workload_sampler::{compile_discard_list, WorkloadSampler};
use crate::services::{alert, health_scorer};
use crate::utils::error::EngineResult;

/// Everything loaded once at startup and shared read-only for the lifetime
/// of the process (§4.0's "Global state → explicit context" redesign).
pub struct EngineContext {
    pub config: Config,
    pub metrics: MetricRegistry,
    pub modules: ModuleRegistry,
    pub model: EvaluationModel,
}

impl EngineContext {
    pub fn bootstrap(config: Config) -> EngineResult<Self> {
        let metrics = MetricRegistry::load(&config.metric_paths)?;
        let modules = ModuleRegistry::load(&config.default_module_path)?;
        let model = load_evaluation_model(&config.evaluate_model_path)?;
        Ok(Self { config, metrics, modules, model })
    }
}

/// The one-shot inputs a `check` invocation supplies on top of the static
/// `EngineContext`: the run's target nodes, time window, and environment.
pub struct RunRequest {
    pub nodes: Vec<NodeDescriptor>,
    pub current_node_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub ref_date: NaiveDate,
    pub sql_helper_path: String,
    pub effective_uid: u32,
    pub platform_id: String,
    pub sys_activity_cmd: Option<String>,
    pub merge_rules: Vec<MergeRule>,
}

/// Runs the full pipeline — registry is already resolved in `ctx` —
/// preflight → dispatcher → evaluator → scorer → report builder, and
/// returns the assembled document ready to be written to `ctx.config.output`.
pub async fn run(
    ctx: Arc<EngineContext>,
    request: RunRequest,
    cancel: CancellationToken,
    progress_tx: mpsc::UnboundedSender<ProgressEvent>,
) -> EngineResult<ReportDocument> {
    let started = Instant::now();
    let lang = ctx.config.language.clone();
    let sql_timeout = Duration::from_secs(ctx.config.sql_timeout);

    let sql_adapter = Arc::new(SqlAdapter::new(request.sql_helper_path.clone()));
    let nodes = connectivity::probe_nodes(Arc::clone(&sql_adapter), request.nodes.clone(), sql_timeout).await;

    let current_data_dir =
        nodes.iter().find(|n| n.node_id == request.current_node_id).and_then(|n| n.data_dir.clone());
    let log_path_resolver: Arc<LogPathResolver> = Arc::new(move |metric: &str| -> Option<PathBuf> {
        let data_dir = current_data_dir.as_ref()?;
        match metric {
            "yasdb_alert_log" => Some(PathBuf::from(data_dir).join("log").join("alert").join("alert.log")),
            "yasdb_run_log" => Some(PathBuf::from(data_dir).join("log").join("run").join("run.log")),
            _ => None,
        }
    });
    let workload_sampler = WorkloadSampler {
        scrape_interval: Duration::from_secs(ctx.config.scrape_interval),
        scrape_times: ctx.config.scrape_times,
        network_discard: compile_discard_list(&ctx.config.network_io_discard),
    };
    let archive_source = ctx.config.sar_dir.as_ref().map(|dir| {
        Arc::new(crate::services::workload_sampler::SarDirArchiveSource { sar_dir: PathBuf::from(dir) })
            as Arc<dyn crate::services::workload_sampler::ArchiveSource>
    });

    let dispatcher = Arc::new(Dispatcher {
        sql_adapter: (*sql_adapter).clone(),
        preflight: default_policy(),
        registry: default_dispatcher_registry(),
        sql_timeout,
        max_concurrency: ctx.config.max_concurrency,
        effective_uid: request.effective_uid,
        platform_id: request.platform_id.clone(),
        log_path_resolver,
        sys_activity_cmd: request.sys_activity_cmd.clone(),
        archive_source,
        workload_sampler,
    });

    let metrics: Vec<_> = ctx.metrics.iter_enabled().cloned().collect();
    let module_of: std::collections::HashMap<String, String> = metrics
        .iter()
        .map(|m| {
            let chain = ctx.modules.module_chain(&m.name, &m.module_name);
            (m.name.clone(), chain.first().cloned().unwrap_or_else(|| m.module_name.clone()))
        })
        .collect();

    let store = Arc::new(ResultStore::new());
    dispatcher
        .run(
            metrics,
            nodes.clone(),
            request.current_node_id.clone(),
            Arc::new(module_of),
            request.window_start,
            request.window_end,
            request.ref_date,
            cancel,
            progress_tx,
            Arc::clone(&store),
        )
        .await?;

    let mut items = store.snapshot().await;
    for item in &mut items {
        if let Ok(metric) = ctx.metrics.get(&item.metric) {
            alert::evaluate_result_item(metric, item, &lang);
        }
    }

    let health = health_scorer::score(&ctx.model, &ctx.modules, &items);

    let build_ctx = BuildContext {
        report_title: "database health check".to_string(),
        report_subtitle: String::new(),
        window_start: request.window_start,
        window_end: request.window_end,
        cost_seconds: started.elapsed().as_secs_f64(),
        language: lang,
        version: env!("CARGO_PKG_VERSION").to_string(),
        nodes: &nodes,
        metrics: &ctx.metrics,
        modules: &ctx.modules,
        model: &ctx.model,
        merge_rules: &request.merge_rules,
    };
    let report = report_builder::build(&build_ctx, &items, &health);

    Ok(report_builder::to_document(report, items))
}
