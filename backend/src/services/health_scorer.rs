use std::collections::{HashMap, HashSet};

use crate::models::{EvaluationModel, HealthBand, ResultItem, Severity};
use crate::registry::ModuleRegistry;

#[derive(Debug, Clone)]
pub struct HealthScoreResult {
    pub overall_score: f64,
    pub health_band: HealthBand,
    /// Per-metric final contribution, for the report builder's scoring
    /// summary table.
    pub per_metric_contribution: HashMap<String, f64>,
}

/// Computes the overall health score and band from the evaluation model and
/// every result item produced by this run, following §4.9's algorithm
/// exactly: weight resolution (explicit metric > module > default), capped
/// alert-weight aggregation per metric, `S_metric * (1 - A_metric/A_max)`
/// summed across contributing metrics.
pub fn score(
    model: &EvaluationModel,
    modules: &ModuleRegistry,
    items: &[ResultItem],
) -> HealthScoreResult {
    let mut by_metric: HashMap<&str, Vec<&ResultItem>> = HashMap::new();
    for item in items {
        by_metric.entry(item.metric.as_str()).or_default().push(item);
    }

    let contributing = contributing_metrics(model, &by_metric);

    if contributing.is_empty() {
        return HealthScoreResult {
            overall_score: model.total_score,
            health_band: model.health_band_for(model.total_score),
            per_metric_contribution: HashMap::new(),
        };
    }

    let weights = resolve_weights(model, modules, &contributing);
    let total_weight: f64 = weights.values().sum();

    let mut overall_score = 0.0;
    let mut per_metric_contribution = HashMap::new();

    for metric in &contributing {
        let metric_items = by_metric.get(metric.as_str()).cloned().unwrap_or_default();
        let weight = weights.get(metric).copied().unwrap_or(0.0);
        let nominal_score = if total_weight > 0.0 { model.total_score * weight / total_weight } else { 0.0 };

        let alert_weight = metric_alert_weight(model, &metric_items);
        let capped = alert_weight.min(model.max_alert_total_weight);
        let ratio = if model.max_alert_total_weight > 0.0 { capped / model.max_alert_total_weight } else { 0.0 };

        let contribution = nominal_score * (1.0 - ratio);
        overall_score += contribution;
        per_metric_contribution.insert(metric.clone(), contribution);
    }

    HealthScoreResult {
        overall_score,
        health_band: model.health_band_for(overall_score),
        per_metric_contribution,
    }
}

fn contributing_metrics(
    model: &EvaluationModel,
    by_metric: &HashMap<&str, Vec<&ResultItem>>,
) -> Vec<String> {
    let mut contributing = HashSet::new();
    for (metric, items) in by_metric {
        let has_success = items.iter().any(|i| i.is_success());
        if has_success {
            contributing.insert(metric.to_string());
        } else if !model.ignore_failed_metric {
            contributing.insert(metric.to_string());
        }
    }
    let mut out: Vec<String> = contributing.into_iter().collect();
    out.sort();
    out
}

/// Three-tier weight resolution: explicit per-metric weight first, then the
/// weight of the metric's owning module, then the configured default.
fn resolve_weights(
    model: &EvaluationModel,
    modules: &ModuleRegistry,
    contributing: &[String],
) -> HashMap<String, f64> {
    let mut remaining: HashSet<String> = contributing.iter().cloned().collect();
    let mut weights = HashMap::new();

    for (metric, weight) in &model.metrics_weight {
        if remaining.remove(metric) {
            weights.insert(metric.clone(), *weight);
        }
    }

    for (module, weight) in &model.module_weight {
        for metric in modules.metrics_for_module(module) {
            if remaining.remove(metric) {
                weights.insert(metric.clone(), *weight);
            }
        }
    }

    for metric in remaining {
        weights.insert(metric, model.default_metric_weight);
    }

    weights
}

/// Sums `alert_weight(severity)` across a metric's alerts; when
/// `ignore_same_alert` is set, each severity counts at most once no matter
/// how many alerts or nodes produced it.
fn metric_alert_weight(model: &EvaluationModel, items: &[&ResultItem]) -> f64 {
    let mut counts: HashMap<Severity, usize> = HashMap::new();
    for item in items {
        for (severity, alerts) in &item.alerts {
            *counts.entry(*severity).or_insert(0) += alerts.len();
        }
    }

    counts
        .into_iter()
        .map(|(severity, count)| {
            let effective_count = if model.ignore_same_alert { 1 } else { count };
            model.alert_weight(severity) * effective_count as f64
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertInstance, Payload, ScoreInterval};

    fn model() -> EvaluationModel {
        let mut health_model = HashMap::new();
        health_model.insert(HealthBand::Excellent, ScoreInterval { min: 90.0, max: 100.0 });
        health_model.insert(HealthBand::Good, ScoreInterval { min: 80.0, max: 89.99 });
        health_model.insert(HealthBand::Fair, ScoreInterval { min: 60.0, max: 79.99 });
        health_model.insert(HealthBand::Poor, ScoreInterval { min: 40.0, max: 59.99 });
        health_model.insert(HealthBand::Critical, ScoreInterval { min: 0.0, max: 39.99 });

        let mut alerts_weight = HashMap::new();
        alerts_weight.insert(Severity::Warning, 5.0);
        alerts_weight.insert(Severity::Critical, 10.0);

        EvaluationModel {
            total_score: 100.0,
            metrics_weight: HashMap::new(),
            module_weight: HashMap::new(),
            default_metric_weight: 1.0,
            alerts_weight,
            max_alert_total_weight: 10.0,
            ignore_same_alert: true,
            ignore_failed_metric: false,
            health_model,
            health_status_alias: HashMap::new(),
        }
    }

    #[test]
    fn empty_result_set_scores_total_score_and_excellent_band() {
        let result = score(&model(), &ModuleRegistry::from_roots(vec![]), &[]);
        assert_eq!(result.overall_score, 100.0);
        assert_eq!(result.health_band, HealthBand::Excellent);
    }

    #[test]
    fn tablespace_alert_reduces_score_by_weighted_ratio() {
        let mut item = ResultItem::success("yasdb_tablespace", Some("n0".into()), Payload::Text("x".into()));
        item.push_alert(AlertInstance {
            severity: Severity::Warning,
            expression: "used_rate >= 90".into(),
            value: serde_json::json!(92.0),
            labels: Default::default(),
            description: String::new(),
            suggestion: String::new(),
        });
        let items = vec![item];
        let modules = ModuleRegistry::from_roots(vec![]);
        let result = score(&model(), &modules, &items);

        // single contributing metric: W_metric/W_total = 1, S_metric = 100.
        // A_metric = 5 (one warning, ignore_same_alert), ratio = 0.5 -> contribution = 50.
        assert!((result.overall_score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn ignore_same_alert_counts_duplicate_severity_once() {
        let mut item = ResultItem::success("m", Some("n0".into()), Payload::Text("x".into()));
        for _ in 0..3 {
            item.push_alert(AlertInstance {
                severity: Severity::Warning,
                expression: "x".into(),
                value: serde_json::json!(1),
                labels: Default::default(),
                description: String::new(),
                suggestion: String::new(),
            });
        }
        let weight = metric_alert_weight(&model(), &[&item]);
        assert_eq!(weight, 5.0);
    }

    #[test]
    fn overall_score_stays_within_total_score_bounds() {
        let mut item = ResultItem::success("m", Some("n0".into()), Payload::Text("x".into()));
        for _ in 0..5 {
            item.push_alert(AlertInstance {
                severity: Severity::Critical,
                expression: "x".into(),
                value: serde_json::json!(1),
                labels: Default::default(),
                description: String::new(),
                suggestion: String::new(),
            });
        }
        let mut model = model();
        model.ignore_same_alert = false;
        let modules = ModuleRegistry::from_roots(vec![]);
        let result = score(&model, &modules, &[item]);
        assert!(result.overall_score >= 0.0 && result.overall_score <= model.total_score);
    }

    #[test]
    fn failed_metric_excluded_when_ignore_failed_metric_set() {
        let mut model = model();
        model.ignore_failed_metric = true;
        let failed = ResultItem::failure("yasdb_object_count", None, "InsufficientPrivilege");
        let result = score(&model, &ModuleRegistry::from_roots(vec![]), &[failed]);
        assert_eq!(result.overall_score, 100.0);
    }
}
