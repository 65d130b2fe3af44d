use serde::{Deserialize, Serialize};

/// One node of the module tree loaded from the module configuration file.
/// Recursive: a module may nest submodules, and metrics attach to whichever
/// level of the tree actually owns them.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModuleNode {
    pub name: String,
    #[serde(default)]
    pub name_alias: String,
    #[serde(default, rename = "name_alias_en")]
    pub name_alias_en: String,
    #[serde(default)]
    pub children: Vec<ModuleNode>,
    #[serde(default)]
    pub metric_names: Vec<String>,
}

impl ModuleNode {
    pub fn alias_for(&self, lang: &str) -> &str {
        if lang == "en-US" && !self.name_alias_en.is_empty() {
            &self.name_alias_en
        } else if !self.name_alias.is_empty() {
            &self.name_alias
        } else {
            &self.name
        }
    }

    /// All metric names owned by this module and every descendant, in
    /// declared order.
    pub fn all_metric_names(&self) -> Vec<String> {
        let mut out = self.metric_names.clone();
        for child in &self.children {
            out.extend(child.all_metric_names());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_metric_names_recurses_through_children() {
        let tree = ModuleNode {
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
        };
        assert_eq!(
            tree.all_metric_names(),
            vec!["yasdb_version".to_string(), "yasdb_tablespace".to_string()]
        );
    }

    #[test]
    fn alias_falls_back_to_bare_name() {
        let node = ModuleNode {
            name: "host".into(),
            name_alias: String::new(),
            name_alias_en: String::new(),
            metric_names: vec![],
            children: vec![],
        };
        assert_eq!(node.alias_for("zh-CN"), "host");
    }
}
