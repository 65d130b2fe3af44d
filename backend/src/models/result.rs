use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Alert severity. Ordered so that `Critical > Warning > Info > Invalid`
/// matches the display precedence mandated for report rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Invalid,
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Invalid => "invalid",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single row of collected data: ordered column name → scalar value,
/// preserving declaration/collection order for table rendering.
pub type Row = IndexMap<String, Value>;

/// Timestamp (unix seconds) → subject (core id / disk name / interface name)
/// → named numeric measurement.
pub type WorkloadSeries = BTreeMap<i64, BTreeMap<String, BTreeMap<String, f64>>>;

/// The normalized payload of a successful collector call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    Row(Row),
    Rows(Vec<Row>),
    Text(String),
    Workload(WorkloadSeries),
}

impl Payload {
    /// Rows to evaluate alert rules over: scalar/map payloads evaluate once
    /// over the flattened map, sequence payloads evaluate once per row.
    pub fn rows_for_evaluation(&self) -> Vec<&Row> {
        match self {
            Payload::Row(row) => vec![row],
            Payload::Rows(rows) => rows.iter().collect(),
            Payload::Text(_) | Payload::Workload(_) => Vec::new(),
        }
    }
}

/// A rule firing on a result item: severity, expression, observed value,
/// labels, and localized human text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertInstance {
    pub severity: Severity,
    pub expression: String,
    pub value: Value,
    #[serde(default)]
    pub labels: IndexMap<String, Value>,
    pub description: String,
    pub suggestion: String,
}

/// The atomic output of one collector call, keyed by `(metric, node)`.
///
/// Invariant: either `error` is `Some` and `payload` is `None`, or `error`
/// is `None` and `payload` is `Some` — never both, never neither.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultItem {
    pub metric: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub alerts: BTreeMap<Severity, Vec<AlertInstance>>,
}

impl ResultItem {
    pub fn success(metric: impl Into<String>, node_id: Option<String>, payload: Payload) -> Self {
        Self {
            metric: metric.into(),
            node_id,
            payload: Some(payload),
            error: None,
            alerts: BTreeMap::new(),
        }
    }

    pub fn failure(metric: impl Into<String>, node_id: Option<String>, error: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            node_id,
            payload: None,
            error: Some(error.into()),
            alerts: BTreeMap::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn push_alert(&mut self, alert: AlertInstance) {
        self.alerts.entry(alert.severity).or_default().push(alert);
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.values().map(|v| v.len()).sum()
    }
}
