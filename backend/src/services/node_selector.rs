use crate::models::{NodeDescriptor, NodeRole};

/// The three target-set shapes a metric can declare, per the node selector
/// contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    CurrentNodeOnly,
    PrimaryOnly,
    AllConnectedOptedIn,
}

/// Resolves the set of nodes a metric targets for this run.
pub struct NodeSelector<'a> {
    nodes: &'a [NodeDescriptor],
    current_node_id: &'a str,
}

impl<'a> NodeSelector<'a> {
    pub fn new(nodes: &'a [NodeDescriptor], current_node_id: &'a str) -> Self {
        Self { nodes, current_node_id }
    }

    pub fn select(&self, mode: SelectionMode) -> Vec<&'a NodeDescriptor> {
        match mode {
            SelectionMode::CurrentNodeOnly => self
                .nodes
                .iter()
                .find(|n| n.node_id == self.current_node_id)
                .into_iter()
                .collect(),
            SelectionMode::PrimaryOnly => vec![self.primary()],
            SelectionMode::AllConnectedOptedIn => self
                .nodes
                .iter()
                .filter(|n| n.connected && n.opted_in)
                .collect(),
        }
    }

    /// The declared primary if one exists and is connected; otherwise the
    /// first node by sorted node id substitutes, per §4.3.
    fn primary(&self) -> &'a NodeDescriptor {
        if let Some(primary) = self
            .nodes
            .iter()
            .find(|n| n.role == NodeRole::Primary && n.connected && n.opted_in)
        {
            return primary;
        }

        self.nodes
            .iter()
            .filter(|n| n.connected && n.opted_in)
            .min_by(|a, b| a.node_id.cmp(&b.node_id))
            .or_else(|| self.nodes.first())
            .expect("node list must not be empty")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, role: NodeRole, connected: bool) -> NodeDescriptor {
        NodeDescriptor {
            node_id: id.into(),
            listen_addr: format!("127.0.0.1:{}", 1688),
            role,
            user: Some("SYS".into()),
            password: Some("pwd".into()),
            connected,
            opted_in: true,
            system_auth: false,
            data_dir: None,
        }
    }

    #[test]
    fn primary_only_substitutes_first_sorted_node_when_primary_unknown() {
        let nodes = vec![
            node("n2", NodeRole::Unknown, true),
            node("n1", NodeRole::Unknown, true),
        ];
        let selector = NodeSelector::new(&nodes, "n1");
        let selected = selector.select(SelectionMode::PrimaryOnly);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].node_id, "n1");
    }

    #[test]
    fn primary_only_prefers_declared_primary() {
        let nodes = vec![node("n1", NodeRole::Standby, true), node("n2", NodeRole::Primary, true)];
        let selector = NodeSelector::new(&nodes, "n1");
        let selected = selector.select(SelectionMode::PrimaryOnly);
        assert_eq!(selected[0].node_id, "n2");
    }

    #[test]
    fn all_connected_opted_in_excludes_disconnected_nodes() {
        let nodes = vec![node("n1", NodeRole::Primary, true), node("n2", NodeRole::Standby, false)];
        let selector = NodeSelector::new(&nodes, "n1");
        let selected = selector.select(SelectionMode::AllConnectedOptedIn);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].node_id, "n1");
    }
}
