//! Barrier-separated configuration phases
//!
//! Each phase submits one job per node to the [`WorkerPool`] and waits for all
//! of them before returning. A phase with any failed job fails as a whole,
//! after every sibling job has finished.

use crate::cluster::Node;
use crate::config::HadoopSettings;
use crate::error::{NodeFailure, Result, SetupError};
use crate::pool::WorkerPool;
use crate::templates::{Artifact, Artifacts};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Configuration phases in the order they must run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    MapredSite,
    CoreSite,
    HdfsSite,
    Masters,
    Slaves,
    HostsExclude,
    LocalDirectories,
    Dumbo,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::MapredSite,
        Phase::CoreSite,
        Phase::HdfsSite,
        Phase::Masters,
        Phase::Slaves,
        Phase::HostsExclude,
        Phase::LocalDirectories,
        Phase::Dumbo,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Phase::MapredSite => "Configuring MapReduce Site",
            Phase::CoreSite => "Configuring Core Site",
            Phase::HdfsSite => "Configuring HDFS Site",
            Phase::Masters => "Configuring masters file",
            Phase::Slaves => "Configuring slaves file",
            Phase::HostsExclude => "Configuring host excludes file",
            Phase::LocalDirectories => "Configuring local directories",
            Phase::Dumbo => "Configuring dumbo",
        }
    }

    /// The file this phase installs; `None` for the directory phase
    pub fn artifact<'a>(&self, artifacts: &'a Artifacts) -> Option<&'a Artifact> {
        match self {
            Phase::MapredSite => Some(&artifacts.mapred_site),
            Phase::CoreSite => Some(&artifacts.core_site),
            Phase::HdfsSite => Some(&artifacts.hdfs_site),
            Phase::Masters => Some(&artifacts.masters),
            Phase::Slaves => Some(&artifacts.slaves),
            Phase::HostsExclude => Some(&artifacts.hosts_exclude),
            Phase::LocalDirectories => None,
            Phase::Dumbo => Some(&artifacts.dumbo),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Read-only state shared by every job of a run
#[derive(Debug)]
pub struct PhaseContext {
    pub settings: HadoopSettings,
    pub artifacts: Artifacts,
}

impl PhaseContext {
    pub fn new(settings: HadoopSettings, artifacts: Artifacts) -> Self {
        Self {
            settings,
            artifacts,
        }
    }

    /// Perform `phase` on a single node
    pub async fn apply(&self, phase: Phase, node: &Node) -> Result<()> {
        match phase.artifact(&self.artifacts) {
            Some(artifact) => write_artifact(node, artifact).await,
            None => self.setup_local_directories(node).await,
        }
    }

    /// Create the data, pid and log directories and hand them to the
    /// service account
    async fn setup_local_directories(&self, node: &Node) -> Result<()> {
        let user = &self.settings.hadoop_user;
        for path in self.settings.local_directories() {
            let quoted = shell_words::quote(path);
            let remote_err = |command: String| {
                let node = node.alias().to_string();
                move |source| SetupError::RemoteCommand {
                    node,
                    command,
                    source,
                }
            };

            let exists = node
                .transport()
                .is_directory(path)
                .await
                .map_err(remote_err(format!("test -d {quoted}")))?;
            if !exists {
                debug!("{}: creating {}", node.alias(), path);
                node.transport()
                    .make_directory(path)
                    .await
                    .map_err(remote_err(format!("mkdir -p {quoted}")))?;
            }

            for command in [
                format!("chown -R {user}:{user} {quoted}"),
                format!(
                    "chmod -R {} {quoted}",
                    self.settings.directory_permission
                ),
            ] {
                node.transport()
                    .execute_checked(&command)
                    .await
                    .map_err(remote_err(command.clone()))?;
            }
        }
        Ok(())
    }
}

async fn write_artifact(node: &Node, artifact: &Artifact) -> Result<()> {
    debug!("{}: writing {}", node.alias(), artifact.path);
    node.transport()
        .write_remote_file(&artifact.path, &artifact.content)
        .await
        .map_err(|source| SetupError::ConfigWrite {
            node: node.alias().to_string(),
            path: artifact.path.clone(),
            source,
        })
}

/// Runs phases on a shared pool, one job per node, with a barrier after each
pub struct PhaseRunner<'a> {
    pool: &'a WorkerPool,
    show_progress: bool,
}

impl<'a> PhaseRunner<'a> {
    pub fn new(pool: &'a WorkerPool) -> Self {
        Self {
            pool,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Run one of the fixed configuration phases
    pub async fn run(&self, phase: Phase, nodes: &[Arc<Node>], context: &Arc<PhaseContext>) -> Result<()> {
        let context = Arc::clone(context);
        self.run_phase(phase.label(), nodes, move |node| {
            let context = Arc::clone(&context);
            async move { context.apply(phase, &node).await }
        })
        .await
    }

    /// Submit `operation` once per node (job id = node alias), then wait for
    /// all of them. Failures are reported in topology order.
    pub async fn run_phase<F, Fut>(&self, label: &str, nodes: &[Arc<Node>], operation: F) -> Result<()>
    where
        F: Fn(Arc<Node>) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        info!("{}...", label);
        for node in nodes {
            self.pool
                .submit(node.alias(), operation(Arc::clone(node)))?;
        }

        let progress = self.show_progress.then(|| progress_bar(label, nodes.len()));
        let outcomes = self
            .pool
            .wait_with(nodes.len(), |outcome| {
                debug!(
                    "{}: job {} {}",
                    label,
                    outcome.job_id,
                    if outcome.is_success() { "done" } else { "failed" }
                );
                if let Some(bar) = &progress {
                    bar.inc(1);
                }
            })
            .await?;
        if let Some(bar) = progress {
            bar.finish_and_clear();
        }

        let mut failures: Vec<NodeFailure> = outcomes
            .into_iter()
            .filter_map(|outcome| {
                outcome.result.err().map(|error| NodeFailure {
                    node: outcome.job_id,
                    error,
                })
            })
            .collect();
        if failures.is_empty() {
            return Ok(());
        }

        let position: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.alias(), i))
            .collect();
        failures.sort_by_key(|f| position.get(f.node.as_str()).copied().unwrap_or(usize::MAX));
        for failure in &failures {
            error!("{}: {}", label, failure);
        }

        Err(SetupError::JobFailure {
            phase: label.to_string(),
            total: nodes.len(),
            failures,
        })
    }
}

fn progress_bar(label: &str, total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len}")
    {
        bar.set_style(style.progress_chars("█▓▒░ "));
    }
    bar.set_message(label.to_string());
    bar
}
