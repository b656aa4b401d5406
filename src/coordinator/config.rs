//! Coordinator configuration.
//!
//! Configured externally at startup and immutable afterwards. Node
//! identity is never inferred from cluster state.

use crate::cluster::NodeId;

/// Device lifecycle coordinator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Identity of the local node.
    pub node: NodeId,

    /// Re-probe a known-but-offline device when this node acquires its
    /// mastership, to recover updates missed across the handoff.
    pub reprobe_on_handoff: bool,
}

impl CoordinatorConfig {
    /// Create a configuration for the given node identity.
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            reprobe_on_handoff: true,
        }
    }

    /// Standalone single-node configuration with a fresh identity.
    pub fn standalone() -> Self {
        Self::new(NodeId::random())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reprobe_defaults_on() {
        let config = CoordinatorConfig::standalone();
        assert!(config.reprobe_on_handoff);
    }

    #[test]
    fn test_node_identity_preserved() {
        let node = NodeId::random();
        assert_eq!(CoordinatorConfig::new(node).node, node);
    }
}
