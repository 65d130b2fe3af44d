use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::models::{NodeDescriptor, NodeRole};
use crate::services::sql_adapter::SqlAdapter;

/// Probe SQL mirroring the original's node-connectivity check: any node that
/// answers it is reachable, and its role is read straight off the row.
const PROBE_SQL: &str = "select database_name, database_role from v$database";

/// Fans out one connectivity probe per node (§5's "runs as a separate
/// fan-out task" before dispatch) and returns the same nodes with
/// `connected` and `role` refreshed from the probe outcome. A node that
/// carries neither credentials nor system authentication is never attempted
/// and is simply marked disconnected, per the node descriptor invariant.
pub async fn probe_nodes(adapter: Arc<SqlAdapter>, nodes: Vec<NodeDescriptor>, timeout: Duration) -> Vec<NodeDescriptor> {
    let mut join_set = JoinSet::new();
    let count = nodes.len();

    for (index, node) in nodes.into_iter().enumerate() {
        let adapter = Arc::clone(&adapter);
        join_set.spawn(async move {
            let node = probe_one(&adapter, node, timeout).await;
            (index, node)
        });
    }

    let mut probed: Vec<Option<NodeDescriptor>> = (0..count).map(|_| None).collect();
    while let Some(result) = join_set.join_next().await {
        if let Ok((index, node)) = result {
            probed[index] = Some(node);
        }
    }

    probed.into_iter().flatten().collect()
}

async fn probe_one(adapter: &SqlAdapter, mut node: NodeDescriptor, timeout: Duration) -> NodeDescriptor {
    if !node.is_reachable() {
        node.connected = false;
        return node;
    }

    match adapter.query(&node, PROBE_SQL, timeout).await {
        Ok(rows) => {
            node.connected = !rows.is_empty();
            if let Some(role) = rows.first().and_then(|r| r.get("database_role")).and_then(|v| v.as_str()) {
                node.role = match role.to_ascii_uppercase().as_str() {
                    "PRIMARY" => NodeRole::Primary,
                    "STANDBY" => NodeRole::Standby,
                    _ => node.role,
                };
            }
        }
        Err(e) => {
            tracing::debug!(node = %node.node_id, error = %e, "connectivity probe failed");
            node.connected = false;
        }
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, user: Option<&str>) -> NodeDescriptor {
        NodeDescriptor {
            node_id: id.into(),
            listen_addr: "127.0.0.1:1688".into(),
            role: NodeRole::Unknown,
            user: user.map(str::to_string),
            password: user.map(|_| "pwd".to_string()),
            connected: false,
            opted_in: true,
            system_auth: false,
            data_dir: None,
        }
    }

    #[tokio::test]
    async fn node_without_credentials_is_marked_disconnected_without_probing() {
        let adapter = Arc::new(SqlAdapter::new("/bin/true"));
        let nodes = vec![node("n0", None)];
        let probed = probe_nodes(adapter, nodes, Duration::from_secs(1)).await;
        assert_eq!(probed.len(), 1);
        assert!(!probed[0].connected);
    }

    #[tokio::test]
    async fn unreachable_helper_marks_node_disconnected() {
        let adapter = Arc::new(SqlAdapter::new("/bin/false"));
        let nodes = vec![node("n0", Some("SYS"))];
        let probed = probe_nodes(adapter, nodes, Duration::from_secs(1)).await;
        assert_eq!(probed.len(), 1);
        assert!(!probed[0].connected);
    }
}
