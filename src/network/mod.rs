//! Cloud network policy: opening the Hadoop status UIs to the world
//!
//! [`FirewallOpener`] only asks for ingress that is not already granted, so
//! repeated runs against the same cluster authorize nothing new.

pub mod aws;

pub use aws::AwsCliNetworkPolicy;

use crate::subprocess::ProcessError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Source range meaning "anywhere"
pub const WORLD_CIDR: &str = "0.0.0.0/0";

#[derive(Debug, thiserror::Error)]
pub enum NetworkPolicyError {
    #[error("Failed to query security group {group}: {reason}")]
    Query { group: String, reason: String },

    #[error("Failed to authorize {rule} on security group {group}: {reason}")]
    Authorize {
        group: String,
        rule: IngressRule,
        reason: String,
    },

    #[error("Cloud CLI error: {0}")]
    Process(#[from] ProcessError),

    #[error("Unexpected cloud API response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A single inbound permission
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IngressRule {
    pub protocol: String,
    pub from_port: u16,
    pub to_port: u16,
    pub cidr: String,
}

impl IngressRule {
    /// TCP access to a single port from any address
    pub fn tcp_from_anywhere(port: u16) -> Self {
        Self {
            protocol: "tcp".to_string(),
            from_port: port,
            to_port: port,
            cidr: WORLD_CIDR.to_string(),
        }
    }
}

impl fmt::Display for IngressRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from_port == self.to_port {
            write!(f, "{}/{} from {}", self.protocol, self.from_port, self.cidr)
        } else {
            write!(
                f,
                "{}/{}-{} from {}",
                self.protocol, self.from_port, self.to_port, self.cidr
            )
        }
    }
}

/// A security group attached to the cluster and its current ingress rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    pub permissions: Vec<IngressRule>,
}

impl SecurityGroup {
    pub fn allows(&self, rule: &IngressRule) -> bool {
        self.permissions.iter().any(|p| p == rule)
    }
}

/// Capability to inspect and extend the cluster's ingress rules
#[async_trait]
pub trait NetworkPolicy: Send + Sync {
    /// Security groups attached to the cluster
    async fn cluster_groups(&self) -> Result<Vec<SecurityGroup>, NetworkPolicyError>;

    fn has_permission(&self, group: &SecurityGroup, rule: &IngressRule) -> bool {
        group.allows(rule)
    }

    async fn authorize(
        &self,
        group: &SecurityGroup,
        rule: &IngressRule,
    ) -> Result<(), NetworkPolicyError>;
}

/// Grant world access to a fixed port set, skipping rules already present
pub struct FirewallOpener<'a> {
    policy: &'a dyn NetworkPolicy,
}

impl<'a> FirewallOpener<'a> {
    pub fn new(policy: &'a dyn NetworkPolicy) -> Self {
        Self { policy }
    }

    /// Returns the rules that were newly authorized
    pub async fn ensure_open(&self, ports: &[u16]) -> Result<Vec<IngressRule>, NetworkPolicyError> {
        let mut authorized = Vec::new();

        for group in self.policy.cluster_groups().await? {
            for &port in ports {
                let rule = IngressRule::tcp_from_anywhere(port);
                if self.policy.has_permission(&group, &rule) {
                    debug!("{} already allows {}", group.name, rule);
                    continue;
                }

                info!("Opening {} on security group {}", rule, group.name);
                self.policy.authorize(&group, &rule).await?;
                authorized.push(rule);
            }
        }

        Ok(authorized)
    }
}
