pub mod ast;
pub mod evaluator;
pub mod lexer;
pub mod parser;

use indexmap::IndexMap;
use tracing::warn;

use crate::models::{AlertInstance, MetricDefinition, Row};
use ast::Expr;
use evaluator::eval;

/// The first column identifier referenced by the expression, read
/// left-to-right; used to report the "observed value" an alert fired on.
fn primary_identifier(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Ident(name) => Some(name),
        Expr::Unary(_, inner) => primary_identifier(inner),
        Expr::Binary(_, lhs, rhs) => primary_identifier(lhs).or_else(|| primary_identifier(rhs)),
        Expr::Call(_, args) => args.iter().find_map(primary_identifier),
        Expr::Number(_) | Expr::Str(_) => None,
    }
}

/// Applies every alert rule attached to `metric` against `row`, returning
/// the alert instances that fired. A rule whose expression fails to parse
/// or evaluate is logged once and contributes no alert; it never fails the
/// run (§7's `Alert-expression-error`).
pub fn evaluate_row(metric: &MetricDefinition, row: &Row, lang: &str) -> Vec<AlertInstance> {
    let mut alerts = Vec::new();

    for (severity, rules) in &metric.alert_rules {
        for rule in rules {
            let ast = match parser::parse(&rule.expression) {
                Ok(ast) => ast,
                Err(e) => {
                    warn!(metric = %metric.name, expression = %rule.expression, error = %e, "alert expression parse failed");
                    continue;
                }
            };

            let value = match eval(&ast, row) {
                Ok(value) => value,
                Err(e) => {
                    warn!(metric = %metric.name, expression = %rule.expression, error = %e, "alert expression evaluation failed");
                    continue;
                }
            };

            if !value.truthy() {
                continue;
            }

            let observed = primary_identifier(&ast)
                .and_then(|name| row.get(name))
                .cloned()
                .unwrap_or_else(|| value.to_json());

            let labels: IndexMap<String, serde_json::Value> = metric
                .labels
                .iter()
                .filter_map(|label| row.get(label).map(|v| (label.clone(), v.clone())))
                .collect();

            alerts.push(AlertInstance {
                severity: *severity,
                expression: rule.expression.clone(),
                value: observed,
                labels,
                description: rule.description_for(lang).to_string(),
                suggestion: rule.suggestion_for(lang).to_string(),
            });
        }
    }

    alerts
}

/// Evaluates every row of a result item's payload (one pass for scalar/map
/// payloads, one pass per row for sequence payloads) and attaches the
/// resulting alerts.
pub fn evaluate_result_item(metric: &MetricDefinition, item: &mut crate::models::ResultItem, lang: &str) {
    if !item.is_success() || !metric.has_alert_rules() {
        return;
    }

    let rows: Vec<Row> = item.payload.as_ref().map(|p| p.rows_for_evaluation().into_iter().cloned().collect()).unwrap_or_default();

    for row in &rows {
        for alert in evaluate_row(metric, row, lang) {
            item.push_alert(alert);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertRuleDef, MetricType, Payload, ResultItem, Severity};
    use std::collections::HashMap;

    fn tablespace_metric() -> MetricDefinition {
        let mut alert_rules = HashMap::new();
        alert_rules.insert(
            Severity::Warning,
            vec![AlertRuleDef {
                expression: "used_rate >= 90".into(),
                description: "tablespace nearly full".into(),
                description_en: String::new(),
                suggestion: "extend the tablespace".into(),
                suggestion_en: String::new(),
            }],
        );
        MetricDefinition {
            name: "yasdb_tablespace".into(),
            name_alias: String::new(),
            name_alias_en: String::new(),
            module_name: "database".into(),
            metric_type: MetricType::Sql,
            hidden: false,
            default: true,
            enabled: true,
            column_order: vec![],
            hidden_columns: vec![],
            byte_columns: vec![],
            percent_columns: vec![],
            number_columns: vec!["used_rate".into()],
            labels: vec!["name".into()],
            alert_rules,
            sql: Some("select name, used_rate from tablespaces".into()),
            command: None,
        }
    }

    #[test]
    fn tablespace_scenario_produces_one_warning_alert_with_labels() {
        let metric = tablespace_metric();
        let mut row = Row::new();
        row.insert("name".into(), serde_json::json!("USERS"));
        row.insert("used_rate".into(), serde_json::json!(92.0));

        let mut item = ResultItem::success("yasdb_tablespace", None, Payload::Row(row));
        evaluate_result_item(&metric, &mut item, "zh-CN");

        assert_eq!(item.alert_count(), 1);
        let alert = &item.alerts[&Severity::Warning][0];
        assert_eq!(alert.value, serde_json::json!(92.0));
        assert_eq!(alert.labels.get("name"), Some(&serde_json::json!("USERS")));
    }

    #[test]
    fn metric_with_no_alert_rules_never_produces_alerts() {
        let mut metric = tablespace_metric();
        metric.alert_rules.clear();
        let mut row = Row::new();
        row.insert("used_rate".into(), serde_json::json!(99.0));
        let mut item = ResultItem::success("yasdb_tablespace", None, Payload::Row(row));
        evaluate_result_item(&metric, &mut item, "zh-CN");
        assert_eq!(item.alert_count(), 0);
    }

    #[test]
    fn failed_result_item_is_never_evaluated() {
        let metric = tablespace_metric();
        let mut item = ResultItem::failure("yasdb_tablespace", None, "timeout");
        evaluate_result_item(&metric, &mut item, "zh-CN");
        assert_eq!(item.alert_count(), 0);
    }
}
