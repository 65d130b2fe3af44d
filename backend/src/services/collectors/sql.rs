use std::time::Duration;

use serde_json::Value;

use crate::models::{MetricDefinition, NodeDescriptor, Payload, Row};
use crate::services::sql_adapter::SqlAdapter;
use crate::utils::error::{EngineError, EngineResult};
use crate::utils::size::{format_bytes, format_percent};

/// Converts raw SQL column values per the metric's declared column hints:
/// bytes become a human-readable size, percents a two-decimal percentage
/// string, and declared number columns are coerced from string to float.
fn apply_column_hints(metric: &MetricDefinition, mut row: Row) -> Row {
    for col in &metric.byte_columns {
        if let Some(v) = row.get(col).and_then(value_as_f64) {
            row.insert(col.clone(), Value::String(format_bytes(v)));
        }
    }
    for col in &metric.percent_columns {
        if let Some(v) = row.get(col).and_then(value_as_f64) {
            row.insert(col.clone(), Value::String(format_percent(v)));
        }
    }
    for col in &metric.number_columns {
        if let Some(v) = row.get(col).and_then(value_as_f64) {
            row.insert(col.clone(), serde_json::json!(v));
        }
    }
    row
}

fn value_as_f64(value: &Value) -> Option<f64> {
    value.as_f64().or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Runs the metric's SQL and takes the first row, converting it to a
/// key->value map via the declared column hints. Missing rows produce an
/// empty map rather than an error.
pub async fn collect_single_row(
    adapter: &SqlAdapter,
    metric: &MetricDefinition,
    node: &NodeDescriptor,
    timeout: Duration,
) -> EngineResult<Payload> {
    let sql = metric
        .sql
        .as_deref()
        .ok_or_else(|| EngineError::metric_failed(&metric.name, &node.node_id, "metric declares no sql"))?;

    let rows = adapter
        .query(node, sql, timeout)
        .await
        .map_err(|e| EngineError::metric_failed(&metric.name, &node.node_id, e.to_string()))?;

    let row = rows.into_iter().next().unwrap_or_default();
    Ok(Payload::Row(apply_column_hints(metric, row)))
}

/// Runs the metric's SQL and converts every row via the declared column
/// hints, producing an ordered sequence payload.
pub async fn collect_multi_row(
    adapter: &SqlAdapter,
    metric: &MetricDefinition,
    node: &NodeDescriptor,
    timeout: Duration,
) -> EngineResult<Payload> {
    let sql = metric
        .sql
        .as_deref()
        .ok_or_else(|| EngineError::metric_failed(&metric.name, &node.node_id, "metric declares no sql"))?;

    let rows = adapter
        .query(node, sql, timeout)
        .await
        .map_err(|e| EngineError::metric_failed(&metric.name, &node.node_id, e.to_string()))?;

    let rows = rows.into_iter().map(|row| apply_column_hints(metric, row)).collect();
    Ok(Payload::Rows(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_byte_and_percent_hints() {
        let metric = MetricDefinition {
            name: "m".into(),
            name_alias: String::new(),
            name_alias_en: String::new(),
            module_name: "custom".into(),
            metric_type: crate::models::MetricType::Sql,
            hidden: false,
            default: true,
            enabled: true,
            column_order: vec![],
            hidden_columns: vec![],
            byte_columns: vec!["used_bytes".into()],
            percent_columns: vec!["used_rate".into()],
            number_columns: vec![],
            labels: vec![],
            alert_rules: Default::default(),
            sql: Some("select 1".into()),
            command: None,
        };
        let mut row = Row::new();
        row.insert("used_bytes".into(), serde_json::json!(2048.0));
        row.insert("used_rate".into(), serde_json::json!(0.5));

        let converted = apply_column_hints(&metric, row);
        assert_eq!(converted.get("used_bytes").unwrap(), "2.00 KB");
        assert_eq!(converted.get("used_rate").unwrap(), "50.00%");
    }
}
