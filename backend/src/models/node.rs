use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Primary,
    Standby,
    Unknown,
}

impl Default for NodeRole {
    fn default() -> Self {
        NodeRole::Unknown
    }
}

/// One database node/host targetable by the dispatcher.
///
/// Invariant: a node with neither explicit credentials nor system
/// authentication is unreachable and must be marked so rather than attempted
/// (see `Self::is_reachable`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub node_id: String,
    pub listen_addr: String,
    #[serde(default)]
    pub role: NodeRole,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Reachability, as determined by a connectivity probe prior to dispatch.
    #[serde(default)]
    pub connected: bool,
    /// Whether this node was selected by the caller for this run.
    #[serde(default = "default_true")]
    pub opted_in: bool,
    /// Connect without explicit user/password, via OS group membership,
    /// using `data_dir` instead.
    #[serde(default)]
    pub system_auth: bool,
    #[serde(default)]
    pub data_dir: Option<String>,
}

fn default_true() -> bool {
    true
}

impl NodeDescriptor {
    pub fn has_credentials(&self) -> bool {
        self.user.is_some() && self.password.is_some()
    }

    /// A node is reachable only if it carries explicit credentials or is
    /// configured for system authentication; otherwise it must never be
    /// attempted by the dispatcher.
    pub fn is_reachable(&self) -> bool {
        self.has_credentials() || self.system_auth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(user: Option<&str>, password: Option<&str>, system_auth: bool) -> NodeDescriptor {
        NodeDescriptor {
            node_id: "n0".into(),
            listen_addr: "127.0.0.1:1688".into(),
            role: NodeRole::Primary,
            user: user.map(str::to_string),
            password: password.map(str::to_string),
            connected: false,
            opted_in: true,
            system_auth,
            data_dir: None,
        }
    }

    #[test]
    fn node_with_no_credentials_and_no_system_auth_is_unreachable() {
        assert!(!node(None, None, false).is_reachable());
    }

    #[test]
    fn node_with_system_auth_is_reachable_without_credentials() {
        assert!(node(None, None, true).is_reachable());
    }

    #[test]
    fn node_with_explicit_credentials_is_reachable() {
        assert!(node(Some("u"), Some("p"), false).is_reachable());
    }
}
