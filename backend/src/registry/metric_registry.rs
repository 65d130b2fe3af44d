use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::models::MetricDefinition;
use crate::utils::error::{EngineError, EngineResult};

#[derive(Debug, Deserialize)]
struct MetricFile {
    #[serde(default)]
    metrics: Vec<MetricDefinition>,
}

/// Declarative table of metric definitions, loaded once from one or more
/// TOML files and read-only thereafter.
///
/// Failure is atomic: a missing file, a parse error, or a duplicate metric
/// name anywhere across the inputs means no registry is published at all.
#[derive(Debug)]
pub struct MetricRegistry {
    metrics: HashMap<String, MetricDefinition>,
    /// Declaration order across all loaded files, for stable iteration.
    order: Vec<String>,
}

impl MetricRegistry {
    /// Loads and merges every metric file in `paths`, in order. Metric names
    /// duplicated within or across files fail the whole load.
    pub fn load(paths: &[impl AsRef<Path>]) -> EngineResult<Self> {
        let mut metrics = HashMap::new();
        let mut order = Vec::new();

        for path in paths {
            let path = path.as_ref();
            let text = std::fs::read_to_string(path).map_err(|e| {
                EngineError::config_invalid(format!("cannot read metric file {}: {e}", path.display()))
            })?;
            let file: MetricFile = toml::from_str(&text).map_err(|e| {
                EngineError::config_invalid(format!("cannot parse metric file {}: {e}", path.display()))
            })?;

            for metric in file.metrics {
                if metrics.contains_key(&metric.name) {
                    return Err(EngineError::config_invalid(format!(
                        "duplicate metric name: {}",
                        metric.name
                    )));
                }
                order.push(metric.name.clone());
                metrics.insert(metric.name.clone(), metric);
            }
        }

        Ok(Self { metrics, order })
    }

    /// Builds a registry directly from already-parsed definitions; used by
    /// tests and by callers that assemble metrics programmatically.
    pub fn from_definitions(definitions: Vec<MetricDefinition>) -> EngineResult<Self> {
        let mut metrics = HashMap::new();
        let mut order = Vec::new();
        for metric in definitions {
            if metrics.contains_key(&metric.name) {
                return Err(EngineError::config_invalid(format!(
                    "duplicate metric name: {}",
                    metric.name
                )));
            }
            order.push(metric.name.clone());
            metrics.insert(metric.name.clone(), metric);
        }
        Ok(Self { metrics, order })
    }

    pub fn get(&self, name: &str) -> EngineResult<&MetricDefinition> {
        self.metrics
            .get(name)
            .ok_or_else(|| EngineError::config_invalid(format!("metric not found: {name}")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    /// All enabled metrics, in declaration order.
    pub fn iter_enabled(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.metrics.get(name))
            .filter(|m| m.enabled)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetricType;
    use std::collections::HashMap as Map;

    fn metric(name: &str) -> MetricDefinition {
        MetricDefinition {
            name: name.to_string(),
            name_alias: String::new(),
            name_alias_en: String::new(),
            module_name: "custom".to_string(),
            metric_type: MetricType::Sql,
            hidden: false,
            default: true,
            enabled: true,
            column_order: vec![],
            hidden_columns: vec![],
            byte_columns: vec![],
            percent_columns: vec![],
            number_columns: vec![],
            labels: vec![],
            alert_rules: Map::new(),
            sql: Some("select 1".into()),
            command: None,
        }
    }

    #[test]
    fn duplicate_metric_name_fails_load_atomically() {
        let err = MetricRegistry::from_definitions(vec![metric("a"), metric("a")]);
        assert!(err.is_err());
    }

    #[test]
    fn get_returns_metric_not_found_for_missing_name() {
        let registry = MetricRegistry::from_definitions(vec![metric("a")]).unwrap();
        assert!(registry.get("missing").is_err());
        assert!(registry.get("a").is_ok());
    }

    #[test]
    fn iter_enabled_skips_disabled_metrics() {
        let mut disabled = metric("b");
        disabled.enabled = false;
        let registry = MetricRegistry::from_definitions(vec![metric("a"), disabled]).unwrap();
        let names: Vec<_> = registry.iter_enabled().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["a"]);
    }
}
