//! Run-level error taxonomy
//!
//! Every failure that can abort a cluster setup run is a [`SetupError`].
//! Per-node job errors are collected at the phase barrier and surfaced as a
//! single [`SetupError::JobFailure`] listing each failing node.

use crate::cluster::TransportError;
use crate::network::NetworkPolicyError;
use crate::orchestrator::StartupStep;
use crate::pool::PoolError;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SetupError>;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Failed to write {path} on {node}")]
    ConfigWrite {
        node: String,
        path: String,
        #[source]
        source: TransportError,
    },

    #[error("Command `{command}` failed on {node}")]
    RemoteCommand {
        node: String,
        command: String,
        #[source]
        source: TransportError,
    },

    #[error("{phase} failed on {} of {total} node(s): {}", .failures.len(), summarize(.failures))]
    JobFailure {
        phase: String,
        total: usize,
        failures: Vec<NodeFailure>,
    },

    #[error("Startup step '{step}' failed on {node}")]
    StartupStep {
        step: StartupStep,
        node: String,
        #[source]
        source: TransportError,
    },

    #[error("Network policy update failed: {0}")]
    NetworkPolicy(#[from] NetworkPolicyError),

    #[error("Failed to render {template}")]
    Render {
        template: String,
        #[source]
        source: tera::Error,
    },

    #[error("Invalid cluster topology: {0}")]
    Topology(String),

    #[error("Job {job_id} panicked: {message}")]
    JobPanicked { job_id: String, message: String },

    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl SetupError {
    /// Process exit code reported by the CLI for this class of failure
    pub fn exit_code(&self) -> i32 {
        match self {
            SetupError::Render { .. } | SetupError::Topology(_) => 2,
            SetupError::ConfigWrite { .. }
            | SetupError::RemoteCommand { .. }
            | SetupError::JobFailure { .. }
            | SetupError::JobPanicked { .. } => 3,
            SetupError::StartupStep { .. } => 4,
            SetupError::NetworkPolicy(_) => 5,
            SetupError::Pool(_) => 1,
        }
    }

    /// Nodes named by a phase failure, in the order they were reported
    pub fn failed_nodes(&self) -> Vec<&str> {
        match self {
            SetupError::JobFailure { failures, .. } => {
                failures.iter().map(|f| f.node.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// A single node's failure inside a phase
#[derive(Debug)]
pub struct NodeFailure {
    pub node: String,
    pub error: SetupError,
}

impl fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.node, error_chain(&self.error))
    }
}

/// Render an error and all of its sources on one line
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn summarize(failures: &[NodeFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
