//! Testing utilities
//!
//! In-memory stand-ins for the remote collaborators, plus a builder for
//! whole mock clusters whose transports share one operation clock so tests
//! can assert ordering across nodes.

pub mod mocks;

use crate::cluster::{ClusterTopology, Node, NodeTransport};
use crate::error::Result;
use mocks::MockTransport;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

/// A topology of [`MockTransport`] nodes and direct handles to each mock
pub struct MockCluster {
    pub topology: ClusterTopology,
    pub transports: Vec<Arc<MockTransport>>,
}

impl MockCluster {
    /// Master `master` followed by `node001`..`nodeNNN`
    pub fn with_workers(worker_count: usize) -> Result<Self> {
        let mut aliases = vec!["master".to_string()];
        aliases.extend((1..=worker_count).map(|i| format!("node{i:03}")));
        Self::from_transports(aliases.iter().map(|a| MockTransport::new(a)).collect())
    }

    /// Wrap pre-configured transports; they are re-clocked onto a shared counter
    pub fn from_transports(transports: Vec<MockTransport>) -> Result<Self> {
        let clock = Arc::new(AtomicU64::new(0));
        let transports: Vec<Arc<MockTransport>> = transports
            .into_iter()
            .map(|t| Arc::new(t.with_clock(Arc::clone(&clock))))
            .collect();

        let nodes = transports
            .iter()
            .map(|t| {
                Node::new(
                    t.alias(),
                    format!("{}.compute.example.com", t.alias()),
                    Arc::clone(t) as Arc<dyn NodeTransport>,
                )
            })
            .collect();

        Ok(Self {
            topology: ClusterTopology::new(nodes)?,
            transports,
        })
    }

    pub fn master(&self) -> &MockTransport {
        &self.transports[0]
    }

    pub fn node(&self, alias: &str) -> Option<&MockTransport> {
        self.transports
            .iter()
            .find(|t| t.alias() == alias)
            .map(AsRef::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_cluster_layout() {
        let cluster = MockCluster::with_workers(3).unwrap();
        assert_eq!(
            cluster.topology.aliases(),
            vec!["master", "node001", "node002", "node003"]
        );
        assert_eq!(
            cluster.topology.master().dns_name(),
            "master.compute.example.com"
        );
        assert!(cluster.node("node002").is_some());
        assert!(cluster.node("node004").is_none());
    }

    #[tokio::test]
    async fn test_transports_share_a_clock() {
        let cluster = MockCluster::with_workers(1).unwrap();
        let master = cluster.topology.master().transport();
        let worker = cluster.topology.workers()[0].transport();

        worker.execute("first").await.unwrap();
        master.execute("second").await.unwrap();

        let w = cluster.node("node001").unwrap().calls();
        let m = cluster.master().calls();
        assert!(w[0].seq < m[0].seq);
    }
}
