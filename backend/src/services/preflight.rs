use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::NodeDescriptor;
use crate::services::sql_adapter::{SqlAdapter, SqlErrorKind};

/// One named preflight predicate. Each variant corresponds to one row of
/// the preflight predicate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predicate {
    RequiresDba,
    RequiresAuditEnabled,
    RequiresWrmAndWrh,
    RequiresSlowLogTable,
    RequiresParameterView,
    RequiresLogReadable,
    RequiresRoot,
    RequiresRootOnKylin,
    RequiresRootOnUbuntu,
}

impl Predicate {
    pub fn name(&self) -> &'static str {
        match self {
            Predicate::RequiresDba => "requires-dba",
            Predicate::RequiresAuditEnabled => "requires-audit-enabled",
            Predicate::RequiresWrmAndWrh => "requires-wrm-and-wrh",
            Predicate::RequiresSlowLogTable => "requires-slow-log-table",
            Predicate::RequiresParameterView => "requires-parameter-view",
            Predicate::RequiresLogReadable => "requires-log-readable",
            Predicate::RequiresRoot => "requires-root",
            Predicate::RequiresRootOnKylin => "requires-root-on-kylin",
            Predicate::RequiresRootOnUbuntu => "requires-root-on-ubuntu",
        }
    }
}

#[derive(Debug, Clone)]
pub enum PreflightDecision {
    Runnable,
    Skip { reason: String, cause: String },
}

impl PreflightDecision {
    pub fn is_runnable(&self) -> bool {
        matches!(self, PreflightDecision::Runnable)
    }

    fn skip(predicate: Predicate, cause: impl Into<String>) -> Self {
        PreflightDecision::Skip { reason: predicate.name().to_string(), cause: cause.into() }
    }
}

/// Resolves the filesystem path a `requires-log-readable` check must probe
/// for a given metric name, e.g. run-log / alert-log / system-log / slow-log
/// path resolvers in the original.
pub type LogPathResolver = dyn Fn(&str) -> Option<PathBuf> + Send + Sync;

/// Environment the preflight predicates evaluate against: the current
/// process's effective privileges, the platform identifier, and a probe SQL
/// adapter bound to a representative node.
pub struct PreflightContext<'a> {
    pub sql_adapter: &'a SqlAdapter,
    pub probe_node: &'a NodeDescriptor,
    pub sql_timeout: Duration,
    pub effective_uid: u32,
    pub platform_id: String,
    pub log_path_resolver: &'a LogPathResolver,
}

/// Mapping `metric name -> predicates`, composing the named predicates from
/// the table. Construction is data: registering metrics here never requires
/// new predicate code for the common shapes.
#[derive(Debug, Default)]
pub struct PreflightPolicy {
    table: HashMap<String, Vec<Predicate>>,
}

impl PreflightPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, metric: impl Into<String>, predicates: impl Into<Vec<Predicate>>) -> &mut Self {
        self.table.insert(metric.into(), predicates.into());
        self
    }

    pub fn predicates_for(&self, metric: &str) -> &[Predicate] {
        self.table.get(metric).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Evaluates every predicate registered for `metric`. The first failing
    /// predicate determines the skip reason; an unregistered metric is
    /// always runnable.
    pub async fn evaluate(&self, metric: &str, ctx: &PreflightContext<'_>) -> PreflightDecision {
        for predicate in self.predicates_for(metric) {
            if let Some(decision) = evaluate_predicate(*predicate, metric, ctx).await {
                return decision;
            }
        }
        PreflightDecision::Runnable
    }
}

async fn evaluate_predicate(
    predicate: Predicate,
    metric: &str,
    ctx: &PreflightContext<'_>,
) -> Option<PreflightDecision> {
    match predicate {
        Predicate::RequiresDba => {
            let probe = "select 1 from sys.dba_objects where rownum <= 1";
            match ctx.sql_adapter.query(ctx.probe_node, probe, ctx.sql_timeout).await {
                Ok(_) => None,
                Err(e)
                    if matches!(e.kind, SqlErrorKind::InsufficientPrivilege | SqlErrorKind::RelationNotFound) =>
                {
                    Some(PreflightDecision::skip(predicate, "DBA privilege required"))
                }
                Err(_) => None,
            }
        }
        Predicate::RequiresAuditEnabled => {
            let probe = "select value from v$parameter where name = 'UNIFIED_AUDITING'";
            match ctx.sql_adapter.query(ctx.probe_node, probe, ctx.sql_timeout).await {
                Ok(rows) => {
                    let enabled = rows
                        .first()
                        .and_then(|r| r.get("value"))
                        .and_then(|v| v.as_str())
                        .map(|v| v.eq_ignore_ascii_case("true"))
                        .unwrap_or(false);
                    if enabled {
                        None
                    } else {
                        Some(PreflightDecision::skip(predicate, "UNIFIED_AUDITING is not enabled"))
                    }
                }
                Err(_) => Some(PreflightDecision::skip(predicate, "cannot read UNIFIED_AUDITING parameter")),
            }
        }
        Predicate::RequiresWrmAndWrh => {
            const RELATIONS: [&str; 3] =
                ["sys.wrm$_database_instance", "sys.wrh$_sysstat", "sys.wrm$_snapshot"];
            for relation in RELATIONS {
                let probe = format!("select 1 from {relation} where rownum <= 1");
                if ctx.sql_adapter.query(ctx.probe_node, &probe, ctx.sql_timeout).await.is_err() {
                    return Some(PreflightDecision::skip(predicate, format!("{relation} is unreadable")));
                }
            }
            None
        }
        Predicate::RequiresSlowLogTable => {
            let probe = "select 1 from sys.slow_log where rownum <= 1";
            match ctx.sql_adapter.query(ctx.probe_node, probe, ctx.sql_timeout).await {
                Ok(_) => None,
                Err(_) => Some(PreflightDecision::skip(predicate, "slow log table is unreadable")),
            }
        }
        Predicate::RequiresParameterView => {
            let probe = "select 1 from v$parameter where rownum <= 1";
            match ctx.sql_adapter.query(ctx.probe_node, probe, ctx.sql_timeout).await {
                Ok(_) => None,
                Err(_) => Some(PreflightDecision::skip(predicate, "parameter view is unreadable")),
            }
        }
        Predicate::RequiresLogReadable => match (ctx.log_path_resolver)(metric) {
            None => Some(PreflightDecision::skip(predicate, "no log path resolved for metric")),
            Some(path) => match std::fs::metadata(&path) {
                Ok(_) => None,
                Err(e) => Some(PreflightDecision::skip(predicate, format!("{} unreadable: {e}", path.display()))),
            },
        },
        Predicate::RequiresRoot => {
            if ctx.effective_uid == 0 {
                None
            } else {
                Some(PreflightDecision::skip(predicate, "root privileges required"))
            }
        }
        Predicate::RequiresRootOnKylin => {
            if ctx.effective_uid == 0 || ctx.platform_id != "kylin" {
                None
            } else {
                Some(PreflightDecision::skip(predicate, "root privileges required on Kylin"))
            }
        }
        Predicate::RequiresRootOnUbuntu => {
            if ctx.effective_uid == 0 || ctx.platform_id != "ubuntu" {
                None
            } else {
                Some(PreflightDecision::skip(predicate, "root privileges required on Ubuntu"))
            }
        }
    }
}

/// Registers the predicates known to apply to the built-in metric catalog,
/// mirroring the original's `NeedCheckMetricFuncMap` table. Callers append
/// additional registrations for user-defined metrics as needed.
pub fn default_policy() -> PreflightPolicy {
    let mut policy = PreflightPolicy::new();
    policy
        .register("yasdb_object_count", [Predicate::RequiresDba])
        .register("yasdb_audit_config", [Predicate::RequiresAuditEnabled])
        .register("yasdb_workload_repository", [Predicate::RequiresWrmAndWrh])
        .register("yasdb_slow_sql", [Predicate::RequiresSlowLogTable])
        .register("yasdb_parameter", [Predicate::RequiresParameterView])
        .register("yasdb_run_log", [Predicate::RequiresLogReadable])
        .register("yasdb_alert_log", [Predicate::RequiresLogReadable])
        .register("host_dmesg", [Predicate::RequiresRoot, Predicate::RequiresRootOnKylin])
        .register("host_firewalld", [Predicate::RequiresRoot, Predicate::RequiresRootOnUbuntu]);
    policy
}
