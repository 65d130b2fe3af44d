use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::models::ModuleNode;
use crate::utils::error::{EngineError, EngineResult};

#[derive(Debug, Deserialize)]
struct ModuleFile {
    #[serde(default)]
    modules: Vec<ModuleNode>,
}

/// The module tree loaded from the module configuration file, plus the
/// derived indices callers need: a metric's full module-chain path, and a
/// module's full (recursive) metric list.
#[derive(Debug)]
pub struct ModuleRegistry {
    roots: Vec<ModuleNode>,
    /// metric name -> ordered module-name path from a top-level module down
    /// to the module that directly owns it.
    metric_chains: HashMap<String, Vec<String>>,
    /// module name -> every metric owned by it or any descendant, in
    /// declared order.
    module_metrics: HashMap<String, Vec<String>>,
}

impl ModuleRegistry {
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            EngineError::config_invalid(format!("cannot read module file {}: {e}", path.display()))
        })?;
        let file: ModuleFile = toml::from_str(&text).map_err(|e| {
            EngineError::config_invalid(format!("cannot parse module file {}: {e}", path.display()))
        })?;
        Ok(Self::from_roots(file.modules))
    }

    pub fn from_roots(roots: Vec<ModuleNode>) -> Self {
        let mut metric_chains = HashMap::new();
        let mut module_metrics = HashMap::new();

        for root in &roots {
            index_node(root, &mut Vec::new(), &mut metric_chains, &mut module_metrics);
        }

        Self { roots, metric_chains, module_metrics }
    }

    /// Module names the metric is nested under, root-to-leaf. If the tree
    /// does not mention the metric at all, falls back to a single-element
    /// chain built from the metric's own declared (or default `custom`)
    /// module name.
    pub fn module_chain(&self, metric_name: &str, declared_module: &str) -> Vec<String> {
        self.metric_chains
            .get(metric_name)
            .cloned()
            .unwrap_or_else(|| vec![declared_module.to_string()])
    }

    /// All metrics owned by `module` or any of its descendants, in declared
    /// order. Empty if the module name is unknown to the tree.
    pub fn metrics_for_module(&self, module: &str) -> &[String] {
        self.module_metrics.get(module).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn roots(&self) -> &[ModuleNode] {
        &self.roots
    }
}

fn index_node(
    node: &ModuleNode,
    path: &mut Vec<String>,
    metric_chains: &mut HashMap<String, Vec<String>>,
    module_metrics: &mut HashMap<String, Vec<String>>,
) {
    path.push(node.name.clone());

    for metric in &node.metric_names {
        metric_chains.insert(metric.clone(), path.clone());
    }

    module_metrics.insert(node.name.clone(), node.all_metric_names());

    for child in &node.children {
        index_node(child, path, metric_chains, module_metrics);
    }

    path.pop();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Vec<ModuleNode> {
        vec![ModuleNode {
            name: "database".into(),
            name_alias: String::new(),
            name_alias_en: String::new(),
            metric_names: vec!["yasdb_version".into()],
            children: vec![ModuleNode {
                name: "tablespace".into(),
                name_alias: String::new(),
                name_alias_en: String::new(),
                metric_names: vec!["yasdb_tablespace".into()],
                children: vec![],
            }],
        }]
    }

    #[test]
    fn module_chain_reflects_nesting() {
        let registry = ModuleRegistry::from_roots(tree());
        assert_eq!(
            registry.module_chain("yasdb_tablespace", "custom"),
            vec!["database".to_string(), "tablespace".to_string()]
        );
    }

    #[test]
    fn unknown_metric_falls_back_to_declared_module() {
        let registry = ModuleRegistry::from_roots(tree());
        assert_eq!(registry.module_chain("unknown_metric", "custom"), vec!["custom".to_string()]);
    }

    #[test]
    fn metrics_for_module_includes_descendants() {
        let registry = ModuleRegistry::from_roots(tree());
        assert_eq!(
            registry.metrics_for_module("database"),
            &["yasdb_version".to_string(), "yasdb_tablespace".to_string()]
        );
    }
}
