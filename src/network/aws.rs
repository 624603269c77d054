//! [`NetworkPolicy`] backed by the `aws ec2` command line client

use super::{IngressRule, NetworkPolicy, NetworkPolicyError, SecurityGroup};
use crate::subprocess::{ProcessCommandBuilder, ProcessOutput, ProcessRunner};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

pub struct AwsCliNetworkPolicy {
    group_name: String,
    region: Option<String>,
    runner: Arc<dyn ProcessRunner>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeSecurityGroups {
    #[serde(default)]
    security_groups: Vec<AwsSecurityGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwsSecurityGroup {
    group_id: String,
    group_name: String,
    #[serde(default)]
    ip_permissions: Vec<AwsIpPermission>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwsIpPermission {
    ip_protocol: String,
    from_port: Option<i32>,
    to_port: Option<i32>,
    #[serde(default)]
    ip_ranges: Vec<AwsIpRange>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwsIpRange {
    cidr_ip: String,
}

impl AwsSecurityGroup {
    /// Flatten to one rule per CIDR; all-protocol and ICMP entries carry no
    /// usable port range and are dropped
    fn into_security_group(self) -> SecurityGroup {
        let permissions = self
            .ip_permissions
            .iter()
            .filter_map(|perm| {
                let from = u16::try_from(perm.from_port?).ok()?;
                let to = u16::try_from(perm.to_port?).ok()?;
                Some(perm.ip_ranges.iter().map(move |range| IngressRule {
                    protocol: perm.ip_protocol.clone(),
                    from_port: from,
                    to_port: to,
                    cidr: range.cidr_ip.clone(),
                }))
            })
            .flatten()
            .collect();

        SecurityGroup {
            id: self.group_id,
            name: self.group_name,
            permissions,
        }
    }
}

impl AwsCliNetworkPolicy {
    pub fn new(
        group_name: impl Into<String>,
        region: Option<String>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            group_name: group_name.into(),
            region,
            runner,
        }
    }

    fn ec2(&self, subcommand: &str) -> ProcessCommandBuilder {
        let mut builder = ProcessCommandBuilder::new("aws").arg("ec2").arg(subcommand);
        if let Some(region) = &self.region {
            builder = builder.arg("--region").arg(region);
        }
        builder
    }
}

fn failure_reason(output: &ProcessOutput) -> String {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        match output.status.code() {
            Some(code) => format!("aws exited with status {code}"),
            None => "aws was terminated by a signal".to_string(),
        }
    } else {
        stderr.to_string()
    }
}

#[async_trait]
impl NetworkPolicy for AwsCliNetworkPolicy {
    async fn cluster_groups(&self) -> Result<Vec<SecurityGroup>, NetworkPolicyError> {
        let command = self
            .ec2("describe-security-groups")
            .arg("--filters")
            .arg(&format!("Name=group-name,Values={}", self.group_name))
            .args(["--output", "json"])
            .build();
        debug!("Querying security group {}", self.group_name);

        let output = self.runner.run(command).await?;
        if !output.status.success() {
            return Err(NetworkPolicyError::Query {
                group: self.group_name.clone(),
                reason: failure_reason(&output),
            });
        }

        let response: DescribeSecurityGroups = serde_json::from_str(&output.stdout)?;
        if response.security_groups.is_empty() {
            return Err(NetworkPolicyError::Query {
                group: self.group_name.clone(),
                reason: "no security group with this name".to_string(),
            });
        }

        Ok(response
            .security_groups
            .into_iter()
            .map(AwsSecurityGroup::into_security_group)
            .collect())
    }

    async fn authorize(
        &self,
        group: &SecurityGroup,
        rule: &IngressRule,
    ) -> Result<(), NetworkPolicyError> {
        let port = if rule.from_port == rule.to_port {
            rule.from_port.to_string()
        } else {
            format!("{}-{}", rule.from_port, rule.to_port)
        };
        let command = self
            .ec2("authorize-security-group-ingress")
            .arg("--group-id")
            .arg(&group.id)
            .arg("--protocol")
            .arg(&rule.protocol)
            .arg("--port")
            .arg(&port)
            .arg("--cidr")
            .arg(&rule.cidr)
            .build();

        let output = self.runner.run(command).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(NetworkPolicyError::Authorize {
                group: group.name.clone(),
                rule: rule.clone(),
                reason: failure_reason(&output),
            })
        }
    }
}
