use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use dbhc::cli::{resolve_window, Cli, Command};
use dbhc::config::{resolve_yasdb_dirs, Config};
use dbhc::engine::{self, EngineContext, RunRequest};
use dbhc::registry::node_registry::DefaultCredentials;
use dbhc::registry::{load_nodes, single_node};
use dbhc::services::dispatcher::ProgressState;
use dbhc::utils::i18n::set_locale;

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    std::process::exit(exit_code);
}

async fn run() -> i32 {
    let cli = Cli::parse();
    let Command::Check(args) = &cli.command;

    let config = match Config::load_from(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return 1;
        }
    };

    let _log_guard = init_tracing(&config.log_level, &config.output);
    set_locale(args.language.as_deref().unwrap_or(&config.language));

    let ctx = match EngineContext::bootstrap(config) {
        Ok(ctx) => Arc::new(ctx),
        Err(e) => {
            tracing::error!(error = %e, "failed to bootstrap engine context");
            return 1;
        }
    };

    let (home, data) = resolve_yasdb_dirs(args.home.clone(), args.data.clone());
    let defaults = DefaultCredentials {
        user: args.user.clone(),
        password: args.password.clone(),
        system_auth: args.system_auth,
        data_dir: data.or(home),
    };

    let nodes = match &args.nodes {
        Some(path) => match load_nodes(Path::new(path), &defaults) {
            Ok(nodes) => nodes,
            Err(e) => {
                tracing::error!(error = %e, "failed to load nodes file");
                return 1;
            }
        },
        None => vec![single_node(args.listen_addr.clone(), &defaults)],
    };
    let current_node_id = nodes.first().map(|n| n.node_id.clone()).unwrap_or_else(|| "n0".to_string());

    let (window_start, window_end) = match resolve_window(args, &ctx.config) {
        Ok(window) => window,
        Err(e) => {
            tracing::error!(error = %e, "invalid time window");
            return 1;
        }
    };

    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("received interrupt, cancelling run");
            cancel_for_signal.cancel();
        }
    });

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(event) = progress_rx.recv().await {
            match event.state {
                ProgressState::Running => tracing::debug!(module = %event.module, metric = %event.metric, node = ?event.node_id, "collecting"),
                ProgressState::Done => tracing::info!(module = %event.module, metric = %event.metric, node = ?event.node_id, "collected"),
                ProgressState::Failed => tracing::warn!(module = %event.module, metric = %event.metric, node = ?event.node_id, "collection failed"),
            }
        }
    });

    let request = RunRequest {
        nodes,
        current_node_id,
        window_start,
        window_end,
        ref_date: window_end.date_naive(),
        sql_helper_path: "yasql".to_string(),
        effective_uid: effective_uid(),
        platform_id: platform_id(),
        sys_activity_cmd: Some("sar".to_string()),
        merge_rules: vec![],
    };

    let document = match engine::run(Arc::clone(&ctx), request, cancel, progress_tx).await {
        Ok(document) => document,
        Err(dbhc::utils::error::EngineError::Cancelled) => {
            tracing::warn!("run cancelled");
            return 130;
        }
        Err(e) => {
            tracing::error!(error = %e, "run failed");
            return 1;
        }
    };

    if let Err(e) = write_report(&ctx.config.output, &document) {
        tracing::error!(error = %e, "failed to write report document");
        eprintln!("{e}");
        return 1;
    }

    0
}

fn write_report(output_dir: &str, document: &dbhc::services::report_builder::ReportDocument) -> dbhc::utils::error::EngineResult<()> {
    std::fs::create_dir_all(output_dir)?;
    let path = Path::new(output_dir).join("report.json");
    let text = serde_json::to_string_pretty(document).unwrap_or_else(|_| "{}".to_string());
    std::fs::write(&path, text)
        .map_err(|e| dbhc::utils::error::EngineError::report_render_failed(format!("cannot write {}: {e}", path.display())))
}

/// Logs to stdout and, best-effort, to a daily-rotated file under the
/// report output directory. Returns the appender guard; dropping it flushes
/// the background writer, so the caller must hold it for the run's lifetime.
fn init_tracing(log_level: &str, output_dir: &str) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = tracing_subscriber::fmt::layer();

    let (file_layer, guard) = match std::fs::create_dir_all(output_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(output_dir, "dbhc.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (Some(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)), Some(guard))
        }
        Err(e) => {
            eprintln!("cannot create output dir {output_dir} for file logging: {e}");
            (None, None)
        }
    };

    tracing_subscriber::registry().with(filter).with(stdout_layer).with(file_layer).init();
    guard
}

#[cfg(unix)]
extern "C" {
    fn geteuid() -> u32;
}

#[cfg(unix)]
fn effective_uid() -> u32 {
    // SAFETY: geteuid takes no arguments, reads no memory, and cannot fail.
    unsafe { geteuid() }
}

#[cfg(not(unix))]
fn effective_uid() -> u32 {
    1000
}

fn platform_id() -> String {
    std::fs::read_to_string("/etc/os-release")
        .ok()
        .and_then(|text| {
            text.lines().find_map(|line| {
                line.strip_prefix("ID=").map(|v| v.trim_matches('"').to_lowercase())
            })
        })
        .unwrap_or_else(|| std::env::consts::OS.to_string())
}
