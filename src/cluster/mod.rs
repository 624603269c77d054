//! Cluster topology and per-node transports
//!
//! A [`ClusterTopology`] is the ordered node list of a run: index 0 is the
//! master, everything after it is a worker. Each [`Node`] owns the transport
//! used to reach it; transports are never shared between nodes.

pub mod ssh;
pub mod transport;

pub use ssh::SshTransport;
pub use transport::{CommandOutput, NodeTransport, TransportError};

use crate::config::Inventory;
use crate::error::{Result, SetupError};
use crate::subprocess::ProcessRunner;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A cluster member reachable through its own transport
pub struct Node {
    alias: String,
    dns_name: String,
    transport: Arc<dyn NodeTransport>,
}

impl Node {
    pub fn new(
        alias: impl Into<String>,
        dns_name: impl Into<String>,
        transport: Arc<dyn NodeTransport>,
    ) -> Self {
        Self {
            alias: alias.into(),
            dns_name: dns_name.into(),
            transport,
        }
    }

    /// Cluster-internal name, used in membership files and as job id
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Externally resolvable name, used for the status URLs
    pub fn dns_name(&self) -> &str {
        &self.dns_name
    }

    pub fn transport(&self) -> &dyn NodeTransport {
        self.transport.as_ref()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("alias", &self.alias)
            .field("dns_name", &self.dns_name)
            .finish_non_exhaustive()
    }
}

/// Ordered cluster membership; the first node is always the master
#[derive(Debug, Clone)]
pub struct ClusterTopology {
    nodes: Vec<Arc<Node>>,
}

impl ClusterTopology {
    /// Build a topology, rejecting an empty node list or duplicate aliases
    pub fn new(nodes: Vec<Node>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(SetupError::Topology(
                "a cluster needs at least a master node".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for node in &nodes {
            if !seen.insert(node.alias()) {
                return Err(SetupError::Topology(format!(
                    "duplicate node alias '{}'",
                    node.alias()
                )));
            }
        }

        Ok(Self {
            nodes: nodes.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn master(&self) -> &Arc<Node> {
        &self.nodes[0]
    }

    pub fn workers(&self) -> &[Arc<Node>] {
        &self.nodes[1..]
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false; kept for parity with `len`
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn worker_count(&self) -> usize {
        self.nodes.len() - 1
    }

    /// One [`SshTransport`] per inventory entry, all sharing `runner`
    pub fn from_inventory(inventory: &Inventory, runner: Arc<dyn ProcessRunner>) -> Result<Self> {
        let nodes = inventory
            .nodes
            .iter()
            .map(|entry| {
                let transport =
                    SshTransport::new(&entry.host, inventory.ssh.clone(), Arc::clone(&runner));
                Node::new(&entry.alias, &entry.host, Arc::new(transport))
            })
            .collect();
        Self::new(nodes)
    }

    /// Aliases of every node in topology order, master first
    pub fn aliases(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.alias.clone()).collect()
    }

    /// Aliases of every node except the master, in topology order
    pub fn worker_aliases(&self) -> Vec<String> {
        self.workers().iter().map(|n| n.alias.clone()).collect()
    }
}
