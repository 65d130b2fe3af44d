use std::path::Path;

use serde::Deserialize;

use crate::models::{NodeDescriptor, NodeRole};
use crate::utils::error::{EngineError, EngineResult};

#[derive(Debug, Deserialize)]
struct NodesFile {
    #[serde(default)]
    nodes: Vec<NodeEntry>,
}

#[derive(Debug, Deserialize)]
struct NodeEntry {
    listen_addr: String,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// Credentials supplied by the caller (CLI flags / env), used to fill in
/// any node entry that declares no explicit `user`/`password`.
#[derive(Debug, Clone, Default)]
pub struct DefaultCredentials {
    pub user: Option<String>,
    pub password: Option<String>,
    pub system_auth: bool,
    pub data_dir: Option<String>,
}

/// Loads the ordered nodes file and materializes node descriptors,
/// substituting the caller's default credentials wherever a node entry
/// omits its own.
pub fn load_nodes(
    path: impl AsRef<Path>,
    defaults: &DefaultCredentials,
) -> EngineResult<Vec<NodeDescriptor>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        EngineError::config_invalid(format!("cannot read nodes file {}: {e}", path.display()))
    })?;
    let file: NodesFile = toml::from_str(&text).map_err(|e| {
        EngineError::config_invalid(format!("cannot parse nodes file {}: {e}", path.display()))
    })?;

    Ok(file
        .nodes
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| {
            let user = entry.user.or_else(|| defaults.user.clone());
            let password = entry.password.or_else(|| defaults.password.clone());
            NodeDescriptor {
                node_id: format!("n{idx}"),
                listen_addr: entry.listen_addr,
                role: NodeRole::Unknown,
                user,
                password,
                connected: false,
                opted_in: true,
                system_auth: defaults.system_auth,
                data_dir: defaults.data_dir.clone(),
            }
        })
        .collect())
}

/// A single-node run with no nodes file: one descriptor built entirely from
/// the caller's default credentials.
pub fn single_node(listen_addr: impl Into<String>, defaults: &DefaultCredentials) -> NodeDescriptor {
    NodeDescriptor {
        node_id: "n0".to_string(),
        listen_addr: listen_addr.into(),
        role: NodeRole::Primary,
        user: defaults.user.clone(),
        password: defaults.password.clone(),
        connected: false,
        opted_in: true,
        system_auth: defaults.system_auth,
        data_dir: defaults.data_dir.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn node_without_explicit_credentials_inherits_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"[[nodes]]
listen_addr = "127.0.0.1:1688"
"#)
        .unwrap();

        let defaults = DefaultCredentials {
            user: Some("SYS".into()),
            password: Some("secret".into()),
            system_auth: false,
            data_dir: None,
        };
        let nodes = load_nodes(file.path(), &defaults).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].user.as_deref(), Some("SYS"));
        assert!(nodes[0].is_reachable());
    }
}
