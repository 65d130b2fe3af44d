use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::result::Severity;

/// Module bucket used when a metric declares no `module_name`.
pub const MODULE_CUSTOM: &str = "custom";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Sql,
    Shell,
    Builtin,
}

/// A single declarative alert rule attached to a metric at a given severity.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertRuleDef {
    pub expression: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "description_en")]
    pub description_en: String,
    #[serde(default)]
    pub suggestion: String,
    #[serde(default, rename = "suggestion_en")]
    pub suggestion_en: String,
}

impl AlertRuleDef {
    pub fn description_for(&self, lang: &str) -> &str {
        if lang == "en-US" && !self.description_en.is_empty() {
            &self.description_en
        } else {
            &self.description
        }
    }

    pub fn suggestion_for(&self, lang: &str) -> &str {
        if lang == "en-US" && !self.suggestion_en.is_empty() {
            &self.suggestion_en
        } else {
            &self.suggestion
        }
    }
}

/// Immutable declarative definition of a single diagnostic metric, loaded
/// once from the metric configuration files at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricDefinition {
    pub name: String,
    #[serde(default)]
    pub name_alias: String,
    #[serde(default, rename = "name_alias_en")]
    pub name_alias_en: String,
    #[serde(default = "default_module_name")]
    pub module_name: String,
    pub metric_type: MetricType,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub default: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub column_order: Vec<String>,
    #[serde(default)]
    pub hidden_columns: Vec<String>,
    #[serde(default)]
    pub byte_columns: Vec<String>,
    #[serde(default)]
    pub percent_columns: Vec<String>,
    #[serde(default)]
    pub number_columns: Vec<String>,
    /// Columns promoted into alert instance labels.
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub alert_rules: HashMap<Severity, Vec<AlertRuleDef>>,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
}

fn default_module_name() -> String {
    MODULE_CUSTOM.to_string()
}

fn default_true() -> bool {
    true
}

impl MetricDefinition {
    pub fn alias_for(&self, lang: &str) -> &str {
        if lang == "en-US" && !self.name_alias_en.is_empty() {
            &self.name_alias_en
        } else if !self.name_alias.is_empty() {
            &self.name_alias
        } else {
            &self.name
        }
    }

    pub fn has_alert_rules(&self) -> bool {
        !self.alert_rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_defaults_to_custom_bucket() {
        assert_eq!(default_module_name(), MODULE_CUSTOM);
    }

    #[test]
    fn alias_falls_back_to_name() {
        let metric = MetricDefinition {
            name: "yasdb_tablespace".into(),
            name_alias: String::new(),
            name_alias_en: String::new(),
            module_name: MODULE_CUSTOM.into(),
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
            alert_rules: HashMap::new(),
            sql: None,
            command: None,
        };
        assert_eq!(metric.alias_for("en-US"), "yasdb_tablespace");
    }
}
