//! In-memory [`NetworkPolicy`]

use crate::network::{IngressRule, NetworkPolicy, NetworkPolicyError, SecurityGroup};
use async_trait::async_trait;
use std::sync::Mutex;

/// Holds security groups in memory; authorizations are applied to them so
/// a second query sees the new rules
pub struct MockNetworkPolicy {
    groups: Mutex<Vec<SecurityGroup>>,
    authorizations: Mutex<Vec<(String, IngressRule)>>,
    fail_query: bool,
    fail_authorize: bool,
}

impl MockNetworkPolicy {
    pub fn new(groups: Vec<SecurityGroup>) -> Self {
        Self {
            groups: Mutex::new(groups),
            authorizations: Mutex::new(Vec::new()),
            fail_query: false,
            fail_authorize: false,
        }
    }

    pub fn failing_query(mut self) -> Self {
        self.fail_query = true;
        self
    }

    pub fn failing_authorize(mut self) -> Self {
        self.fail_authorize = true;
        self
    }

    /// `(group id, rule)` pairs in the order they were authorized
    pub fn authorizations(&self) -> Vec<(String, IngressRule)> {
        self.authorizations.lock().unwrap().clone()
    }
}

#[async_trait]
impl NetworkPolicy for MockNetworkPolicy {
    async fn cluster_groups(&self) -> Result<Vec<SecurityGroup>, NetworkPolicyError> {
        if self.fail_query {
            return Err(NetworkPolicyError::Query {
                group: "mock".to_string(),
                reason: "RequestLimitExceeded".to_string(),
            });
        }
        Ok(self.groups.lock().unwrap().clone())
    }

    async fn authorize(
        &self,
        group: &SecurityGroup,
        rule: &IngressRule,
    ) -> Result<(), NetworkPolicyError> {
        if self.fail_authorize {
            return Err(NetworkPolicyError::Authorize {
                group: group.name.clone(),
                rule: rule.clone(),
                reason: "UnauthorizedOperation".to_string(),
            });
        }

        let mut groups = self.groups.lock().unwrap();
        if let Some(stored) = groups.iter_mut().find(|g| g.id == group.id) {
            stored.permissions.push(rule.clone());
        }
        self.authorizations
            .lock()
            .unwrap()
            .push((group.id.clone(), rule.clone()));
        Ok(())
    }
}
