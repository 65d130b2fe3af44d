use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{
    AlertAttributes, ChartAttributes, ChartSeries, ChartType, CodeAttributes, DescriptionAttributes,
    DescriptionEntry, Element, EvaluationModel, MetricDefinition, MetricType, ModuleNode, NodeDescriptor,
    Payload, Report, ResultItem, Row, TableAttributes, TableColumn,
};
use crate::registry::{MetricRegistry, ModuleRegistry};
use crate::services::health_scorer::HealthScoreResult;

/// One configured grouping of logically-related metrics that should render
/// as a single sibling menu instead of scattered across their declared
/// modules (§4.10's "merge list").
#[derive(Debug, Clone)]
pub struct MergeRule {
    pub into: String,
    pub members: Vec<String>,
}

/// Everything the builder needs that is not itself a result item: the
/// run's static configuration and its read-only registries.
pub struct BuildContext<'a> {
    pub report_title: String,
    pub report_subtitle: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub cost_seconds: f64,
    pub language: String,
    pub version: String,
    pub nodes: &'a [NodeDescriptor],
    pub metrics: &'a MetricRegistry,
    pub modules: &'a ModuleRegistry,
    pub model: &'a EvaluationModel,
    pub merge_rules: &'a [MergeRule],
}

/// The on-disk document (§6): the report tree's own fields flattened
/// alongside the raw collected items and the subset that failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDocument {
    #[serde(flatten)]
    pub report: Report,
    pub items: Vec<ResultItem>,
    pub failed: Vec<ResultItem>,
}

pub fn to_document(report: Report, items: Vec<ResultItem>) -> ReportDocument {
    let failed = items.iter().filter(|i| !i.is_success()).cloned().collect();
    ReportDocument { report, items, failed }
}

struct MergeBucket {
    elements: Vec<Element>,
    min_index: usize,
}

/// Builds the full report tree: a synthetic overview menu followed by one
/// menu per top-level module (nested per submodule, one element per metric
/// result), with configured merge groups pulled out into their own sibling
/// menus and alert counts propagated through the whole tree.
pub fn build(ctx: &BuildContext, items: &[ResultItem], health: &HealthScoreResult) -> Report {
    let items_by_metric = group_by_metric(items);

    let mut merge_buckets: HashMap<String, MergeBucket> = HashMap::new();
    let mut index = 1usize;
    let mut module_menus = Vec::new();
    for root in ctx.modules.roots() {
        module_menus.push(build_module_menu(
            root,
            ctx.metrics,
            &items_by_metric,
            &ctx.language,
            ctx.merge_rules,
            &mut merge_buckets,
            &mut index,
        ));
    }

    let mut top_level = module_menus;
    for (name, bucket) in merge_buckets {
        let mut menu = crate::models::Menu::new(name, bucket.min_index);
        menu.elements = bucket.elements;
        top_level.push(menu);
    }
    top_level.sort_by_key(|m| m.menu_index);

    let mut overview = build_overview_menu(ctx, items, &items_by_metric, health);
    for menu in &mut top_level {
        menu.propagate_alert_counts();
    }
    overview.propagate_alert_counts();

    let mut report_data = vec![overview];
    report_data.extend(top_level);

    Report {
        report_title: ctx.report_title.clone(),
        report_subtitle: ctx.report_subtitle.clone(),
        window_start: ctx.window_start,
        window_end: ctx.window_end,
        cost_seconds: ctx.cost_seconds,
        language: ctx.language.clone(),
        version: ctx.version.clone(),
        labels: BTreeMap::new(),
        change_log: None,
        report_data,
    }
}

fn group_by_metric(items: &[ResultItem]) -> HashMap<String, Vec<&ResultItem>> {
    let mut map: HashMap<String, Vec<&ResultItem>> = HashMap::new();
    for item in items {
        map.entry(item.metric.clone()).or_default().push(item);
    }
    map
}

fn merge_target_for<'a>(rules: &'a [MergeRule], metric: &str) -> Option<&'a str> {
    rules.iter().find(|r| r.members.iter().any(|m| m == metric)).map(|r| r.into.as_str())
}

#[allow(clippy::too_many_arguments)]
fn build_module_menu(
    node: &ModuleNode,
    metrics: &MetricRegistry,
    items_by_metric: &HashMap<String, Vec<&ResultItem>>,
    lang: &str,
    merge_rules: &[MergeRule],
    merge_buckets: &mut HashMap<String, MergeBucket>,
    index: &mut usize,
) -> crate::models::Menu {
    let mut menu = crate::models::Menu::new(node.alias_for(lang), *index);
    *index += 1;

    for child in &node.children {
        menu.children.push(build_module_menu(
            child,
            metrics,
            items_by_metric,
            lang,
            merge_rules,
            merge_buckets,
            index,
        ));
    }

    for metric_name in &node.metric_names {
        let Ok(metric) = metrics.get(metric_name) else { continue };
        let Some(item_list) = items_by_metric.get(metric_name) else { continue };

        for item in item_list {
            let mut elements = vec![element_for_item(metric, item, lang)];
            elements.extend(alert_elements_for_item(item));

            if let Some(target) = merge_target_for(merge_rules, metric_name) {
                let bucket = merge_buckets
                    .entry(target.to_string())
                    .or_insert_with(|| MergeBucket { elements: Vec::new(), min_index: menu.menu_index });
                bucket.min_index = bucket.min_index.min(menu.menu_index);
                bucket.elements.extend(elements);
            } else {
                menu.elements.extend(elements);
            }
        }
    }

    menu
}

fn element_for_item(metric: &MetricDefinition, item: &ResultItem, lang: &str) -> Element {
    if let Some(error) = &item.error {
        return Element::Text(format!("{}: {error}", metric.alias_for(lang)));
    }

    match item.payload.as_ref() {
        Some(Payload::Row(row)) => Element::Description(DescriptionAttributes {
            title: metric.alias_for(lang).to_string(),
            data: ordered_columns(metric, row.keys().cloned())
                .into_iter()
                .filter_map(|col| row.get(&col).map(|v| DescriptionEntry { label: col, value: value_to_display(v) }))
                .collect(),
        }),
        Some(Payload::Rows(rows)) => Element::Table(TableAttributes {
            title: metric.alias_for(lang).to_string(),
            columns: table_columns(metric, rows),
            data_source: rows.clone(),
        }),
        Some(Payload::Text(text)) => match metric.metric_type {
            MetricType::Shell => Element::Code(CodeAttributes {
                title: metric.alias_for(lang).to_string(),
                language: "text".to_string(),
                code: text.clone(),
            }),
            _ => Element::Text(text.clone()),
        },
        Some(Payload::Workload(series)) => workload_charts(metric, lang, series)
            .into_iter()
            .next()
            .map(Element::Chart)
            .unwrap_or(Element::Empty),
        None => Element::Empty,
    }
}

/// The metric's declared column order first, then any remaining columns
/// sorted by name, with hidden columns dropped.
fn ordered_columns(metric: &MetricDefinition, keys: impl Iterator<Item = String>) -> Vec<String> {
    let mut remaining: BTreeSet<String> = keys.collect();
    let mut ordered = Vec::new();

    for col in &metric.column_order {
        if remaining.remove(col) {
            ordered.push(col.clone());
        }
    }
    let mut rest: Vec<String> = remaining.into_iter().collect();
    rest.sort();
    ordered.extend(rest);

    ordered.retain(|c| !metric.hidden_columns.contains(c));
    ordered
}

fn table_columns(metric: &MetricDefinition, rows: &[Row]) -> Vec<TableColumn> {
    let keys = rows.first().map(|r| r.keys().cloned().collect::<Vec<_>>()).unwrap_or_default();
    ordered_columns(metric, keys.into_iter())
        .into_iter()
        .map(|name| TableColumn { title: name.clone(), data_index: name })
        .collect()
}

/// One `Alert` element per fired rule on this item, so that
/// `Menu::propagate_alert_counts` has something to count at the level the
/// alert actually occurred.
fn alert_elements_for_item(item: &ResultItem) -> Vec<Element> {
    item.alerts
        .values()
        .flatten()
        .map(|alert| {
            Element::Alert(AlertAttributes {
                severity: alert.severity,
                message: alert.expression.clone(),
                description: alert.description.clone(),
            })
        })
        .collect()
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One chart per named measurement (e.g. `usage_percent`, `rx_bytes_per_sec`),
/// with one line series per subject that reports it.
fn workload_charts(metric: &MetricDefinition, lang: &str, series: &crate::models::WorkloadSeries) -> Vec<ChartAttributes> {
    let mut by_measurement: BTreeMap<String, BTreeMap<String, Vec<(f64, f64)>>> = BTreeMap::new();

    for (ts, subjects) in series {
        for (subject, measurements) in subjects {
            for (measurement, value) in measurements {
                by_measurement
                    .entry(measurement.clone())
                    .or_default()
                    .entry(subject.clone())
                    .or_default()
                    .push((*ts as f64, *value));
            }
        }
    }

    by_measurement
        .into_iter()
        .map(|(measurement, by_subject)| ChartAttributes {
            title: format!("{} / {measurement}", metric.alias_for(lang)),
            chart_type: ChartType::Line,
            series: by_subject
                .into_iter()
                .map(|(subject, mut points)| {
                    points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
                    ChartSeries { name: subject, points }
                })
                .collect(),
        })
        .collect()
}

fn build_overview_menu(
    ctx: &BuildContext,
    items: &[ResultItem],
    items_by_metric: &HashMap<String, Vec<&ResultItem>>,
    health: &HealthScoreResult,
) -> crate::models::Menu {
    let mut menu = crate::models::Menu::new("overview", 0);

    let success_count = items.iter().filter(|i| i.is_success()).count();
    let failed_count = items.len() - success_count;
    let connected = ctx.nodes.iter().filter(|n| n.connected).count();

    menu.elements.push(Element::Description(DescriptionAttributes {
        title: "overview".to_string(),
        data: vec![
            DescriptionEntry { label: "window_start".into(), value: ctx.window_start.to_rfc3339() },
            DescriptionEntry { label: "window_end".into(), value: ctx.window_end.to_rfc3339() },
            DescriptionEntry { label: "metrics_collected".into(), value: success_count.to_string() },
            DescriptionEntry { label: "metrics_failed".into(), value: failed_count.to_string() },
            DescriptionEntry { label: "nodes_total".into(), value: ctx.nodes.len().to_string() },
            DescriptionEntry { label: "nodes_connected".into(), value: connected.to_string() },
        ],
    }));

    if ctx.nodes.len() > 1 {
        let columns = vec![
            TableColumn { title: "node_id".into(), data_index: "node_id".into() },
            TableColumn { title: "listen_addr".into(), data_index: "listen_addr".into() },
            TableColumn { title: "role".into(), data_index: "role".into() },
            TableColumn { title: "connected".into(), data_index: "connected".into() },
        ];
        let data_source = ctx
            .nodes
            .iter()
            .map(|n| {
                let mut row: Row = IndexMap::new();
                row.insert("node_id".into(), Value::String(n.node_id.clone()));
                row.insert("listen_addr".into(), Value::String(n.listen_addr.clone()));
                row.insert("role".into(), Value::String(format!("{:?}", n.role)));
                row.insert("connected".into(), Value::Bool(n.connected));
                row
            })
            .collect();
        menu.elements.push(Element::Table(TableAttributes { title: "nodes".to_string(), columns, data_source }));
    }

    let band = health.health_band;
    menu.elements.push(Element::Description(DescriptionAttributes {
        title: "scoring_summary".to_string(),
        data: vec![
            DescriptionEntry { label: "total_score".into(), value: format!("{:.2}", ctx.model.total_score) },
            DescriptionEntry { label: "current_score".into(), value: format!("{:.2}", health.overall_score) },
            DescriptionEntry {
                label: "health_status".into(),
                value: ctx.model.health_status_alias_for(band, &ctx.language),
            },
        ],
    }));

    menu.elements.push(Element::Table(alert_detail_table(ctx, items)));

    for root in ctx.modules.roots() {
        menu.elements.push(Element::Table(module_summary_table(root, items_by_metric)));
    }

    menu
}

fn alert_detail_table(ctx: &BuildContext, items: &[ResultItem]) -> TableAttributes {
    let columns = ["module", "metric", "severity", "expression", "value", "suggestion", "labels"]
        .into_iter()
        .map(|c| TableColumn { title: c.to_string(), data_index: c.to_string() })
        .collect();

    let mut data_source = Vec::new();
    for item in items {
        let declared_module = ctx.metrics.get(&item.metric).map(|m| m.module_name.as_str()).unwrap_or("custom");
        let module_chain = ctx.modules.module_chain(&item.metric, declared_module);
        let module = module_chain.first().cloned().unwrap_or_else(|| declared_module.to_string());

        for alerts in item.alerts.values() {
            for alert in alerts {
                let labels = alert
                    .labels
                    .iter()
                    .map(|(k, v)| format!("{k}={}", value_to_display(v)))
                    .collect::<Vec<_>>()
                    .join(", ");

                let mut row: Row = IndexMap::new();
                row.insert("module".into(), Value::String(module.clone()));
                row.insert("metric".into(), Value::String(item.metric.clone()));
                row.insert("severity".into(), Value::String(alert.severity.as_str().to_string()));
                row.insert("expression".into(), Value::String(alert.expression.clone()));
                row.insert("value".into(), alert.value.clone());
                row.insert("suggestion".into(), Value::String(alert.suggestion.clone()));
                row.insert("labels".into(), Value::String(labels));
                data_source.push(row);
            }
        }
    }

    TableAttributes { title: "alert_detail".to_string(), columns, data_source }
}

fn module_summary_table(root: &ModuleNode, items_by_metric: &HashMap<String, Vec<&ResultItem>>) -> TableAttributes {
    let columns = vec![
        TableColumn { title: "metric".into(), data_index: "metric".into() },
        TableColumn { title: "alert_count".into(), data_index: "alert_count".into() },
    ];

    let data_source = root
        .all_metric_names()
        .into_iter()
        .filter_map(|name| {
            let items = items_by_metric.get(&name)?;
            let count: usize = items.iter().map(|i| i.alert_count()).sum();
            let mut row: Row = IndexMap::new();
            row.insert("metric".into(), Value::String(name));
            row.insert("alert_count".into(), serde_json::json!(count));
            Some(row)
        })
        .collect();

    TableAttributes { title: format!("{}_summary", root.name), columns, data_source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertInstance, HealthBand, NodeRole, Severity};
    use crate::services::health_scorer::HealthScoreResult;
    use std::collections::HashMap as StdHashMap;

    fn metric(name: &str, module: &str, metric_type: MetricType) -> MetricDefinition {
        MetricDefinition {
            name: name.into(),
            name_alias: String::new(),
            name_alias_en: String::new(),
            module_name: module.into(),
            metric_type,
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
            command: None,
        }
    }

    fn model() -> EvaluationModel {
        EvaluationModel {
            total_score: 100.0,
            metrics_weight: StdHashMap::new(),
            module_weight: StdHashMap::new(),
            default_metric_weight: 1.0,
            alerts_weight: StdHashMap::new(),
            max_alert_total_weight: 10.0,
            ignore_same_alert: true,
            ignore_failed_metric: false,
            health_model: StdHashMap::new(),
            health_status_alias: StdHashMap::new(),
        }
    }

    #[test]
    fn module_menu_gets_one_element_per_metric_result() {
        let metrics = MetricRegistry::from_definitions(vec![metric("m1", "database", MetricType::Sql)]).unwrap();
        let modules = ModuleRegistry::from_roots(vec![ModuleNode {
            name: "database".into(),
            name_alias: String::new(),
            name_alias_en: String::new(),
            children: vec![],
            metric_names: vec!["m1".into()],
        }]);
        let eval_model = model();
        let nodes = vec![NodeDescriptor {
            node_id: "n0".into(),
            listen_addr: "127.0.0.1:1688".into(),
            role: NodeRole::Primary,
            user: Some("SYS".into()),
            password: Some("pwd".into()),
            connected: true,
            opted_in: true,
            system_auth: false,
            data_dir: None,
        }];
        let merge_rules = [];
        let ctx = BuildContext {
            report_title: "check".into(),
            report_subtitle: String::new(),
            window_start: Utc::now(),
            window_end: Utc::now(),
            cost_seconds: 1.0,
            language: "zh-CN".into(),
            version: "1.0.0".into(),
            nodes: &nodes,
            metrics: &metrics,
            modules: &modules,
            model: &eval_model,
            merge_rules: &merge_rules,
        };

        let mut row: Row = IndexMap::new();
        row.insert("used_rate".into(), serde_json::json!(50.0));
        let items = vec![ResultItem::success("m1", Some("n0".into()), Payload::Row(row))];
        let health = HealthScoreResult {
            overall_score: 100.0,
            health_band: HealthBand::Excellent,
            per_metric_contribution: StdHashMap::new(),
        };

        let report = build(&ctx, &items, &health);
        assert_eq!(report.report_data[0].title, "overview");
        let database_menu = &report.report_data[1];
        assert_eq!(database_menu.title, "database");
        assert_eq!(database_menu.elements.len(), 1);
        assert!(matches!(database_menu.elements[0], Element::Description(_)));
    }

    #[test]
    fn merge_rule_collects_members_into_one_sibling_menu() {
        let metrics = MetricRegistry::from_definitions(vec![
            metric("cpu", "host", MetricType::Shell),
            metric("mem", "database", MetricType::Shell),
        ])
        .unwrap();
        let modules = ModuleRegistry::from_roots(vec![
            ModuleNode {
                name: "host".into(),
                name_alias: String::new(),
                name_alias_en: String::new(),
                children: vec![],
                metric_names: vec!["cpu".into()],
            },
            ModuleNode {
                name: "database".into(),
                name_alias: String::new(),
                name_alias_en: String::new(),
                children: vec![],
                metric_names: vec!["mem".into()],
            },
        ]);
        let eval_model = model();
        let nodes: Vec<NodeDescriptor> = vec![];
        let merge_rules = [MergeRule { into: "resource_usage".into(), members: vec!["cpu".into(), "mem".into()] }];
        let ctx = BuildContext {
            report_title: "check".into(),
            report_subtitle: String::new(),
            window_start: Utc::now(),
            window_end: Utc::now(),
            cost_seconds: 1.0,
            language: "zh-CN".into(),
            version: "1.0.0".into(),
            nodes: &nodes,
            metrics: &metrics,
            modules: &modules,
            model: &eval_model,
            merge_rules: &merge_rules,
        };

        let items = vec![
            ResultItem::success("cpu", None, Payload::Text("cpu text".into())),
            ResultItem::success("mem", None, Payload::Text("mem text".into())),
        ];
        let health = HealthScoreResult {
            overall_score: 100.0,
            health_band: HealthBand::Excellent,
            per_metric_contribution: StdHashMap::new(),
        };

        let report = build(&ctx, &items, &health);
        let merged = report.report_data.iter().find(|m| m.title == "resource_usage").unwrap();
        assert_eq!(merged.elements.len(), 2);

        let host_menu = report.report_data.iter().find(|m| m.title == "host").unwrap();
        assert!(host_menu.elements.is_empty());
    }

    #[test]
    fn alert_detail_table_lists_every_fired_alert() {
        let metrics = MetricRegistry::from_definitions(vec![metric("m1", "database", MetricType::Sql)]).unwrap();
        let modules = ModuleRegistry::from_roots(vec![]);
        let eval_model = model();
        let nodes: Vec<NodeDescriptor> = vec![];
        let merge_rules = [];
        let ctx = BuildContext {
            report_title: "check".into(),
            report_subtitle: String::new(),
            window_start: Utc::now(),
            window_end: Utc::now(),
            cost_seconds: 1.0,
            language: "zh-CN".into(),
            version: "1.0.0".into(),
            nodes: &nodes,
            metrics: &metrics,
            modules: &modules,
            model: &eval_model,
            merge_rules: &merge_rules,
        };

        let mut item = ResultItem::success("m1", None, Payload::Row(IndexMap::new()));
        item.push_alert(AlertInstance {
            severity: Severity::Warning,
            expression: "used_rate >= 90".into(),
            value: serde_json::json!(92.0),
            labels: IndexMap::new(),
            description: "nearly full".into(),
            suggestion: "extend".into(),
        });
        let items = vec![item];
        let health = HealthScoreResult {
            overall_score: 100.0,
            health_band: HealthBand::Excellent,
            per_metric_contribution: StdHashMap::new(),
        };

        let report = build(&ctx, &items, &health);
        let overview = &report.report_data[0];
        let alert_table = overview
            .elements
            .iter()
            .find_map(|e| match e {
                Element::Table(t) if t.title == "alert_detail" => Some(t),
                _ => None,
            })
            .unwrap();
        assert_eq!(alert_table.data_source.len(), 1);
    }
}
