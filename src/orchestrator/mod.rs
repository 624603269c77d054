//! Cluster setup orchestration
//!
//! [`HadoopSetup`] drives a whole run: derive the [`ConfigSet`], render the
//! artifacts, push them to every node phase by phase, start the services on
//! the master and finally open the status UI ports. The worker pool is shut
//! down on every exit path.

pub mod phases;
pub mod startup;


pub use phases::{Phase, PhaseContext, PhaseRunner};
pub use startup::{StartupSequencer, StartupStep};

use crate::cluster::ClusterTopology;
use crate::config::{ConfigSet, HadoopSettings};
use crate::error::Result;
use crate::network::{FirewallOpener, IngressRule, NetworkPolicy};
use crate::pool::{WorkerPool, DEFAULT_MAX_PARALLEL};
use crate::templates::Artifacts;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

/// What a successful run did
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config: ConfigSet,
    pub phases_completed: Vec<Phase>,
    pub authorized_rules: Vec<IngressRule>,
    pub job_tracker_url: String,
    pub namenode_url: String,
}

pub struct HadoopSetup {
    settings: HadoopSettings,
    max_parallel: usize,
    show_progress: bool,
}

impl HadoopSetup {
    pub fn new(settings: HadoopSettings) -> Self {
        Self {
            settings,
            max_parallel: DEFAULT_MAX_PARALLEL,
            show_progress: false,
        }
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn settings(&self) -> &HadoopSettings {
        &self.settings
    }

    /// Configure and start Hadoop on `topology`.
    ///
    /// `owner_user` gets an HDFS home directory. Firewall changes are only
    /// made when a `network` policy is supplied.
    pub async fn run(
        &self,
        topology: &ClusterTopology,
        owner_user: &str,
        network: Option<&dyn NetworkPolicy>,
    ) -> Result<RunSummary> {
        let pool = WorkerPool::new(self.max_parallel);
        self.run_with_pool(&pool, topology, owner_user, network).await
    }

    /// As [`HadoopSetup::run`], on a caller-supplied pool that is shut down
    /// before returning
    pub async fn run_with_pool(
        &self,
        pool: &WorkerPool,
        topology: &ClusterTopology,
        owner_user: &str,
        network: Option<&dyn NetworkPolicy>,
    ) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("hadoop_setup", %run_id, nodes = topology.len());

        let result = self
            .execute(pool, run_id, topology, owner_user, network)
            .instrument(span.clone())
            .await;
        pool.shutdown().instrument(span).await;
        result
    }

    async fn execute(
        &self,
        pool: &WorkerPool,
        run_id: Uuid,
        topology: &ClusterTopology,
        owner_user: &str,
        network: Option<&dyn NetworkPolicy>,
    ) -> Result<RunSummary> {
        let started_at = Utc::now();
        let master = topology.master();

        info!("Configuring Hadoop...");
        let config = ConfigSet::build(topology, &self.settings);
        info!(
            "Using a HDFS replication factor of {}...",
            config.dfs_replication
        );
        info!(
            "Using {} reduce tasks for {} slave(s)...",
            config.mapred_reduce_tasks, config.worker_count
        );

        let artifacts = Artifacts::render(
            &config,
            &self.settings,
            master.alias(),
            &topology.worker_aliases(),
        )?;
        let context = Arc::new(PhaseContext::new(self.settings.clone(), artifacts));

        let runner = PhaseRunner::new(pool).with_progress(self.show_progress);
        let mut phases_completed = Vec::with_capacity(Phase::ALL.len());
        for phase in Phase::ALL {
            runner.run(phase, topology.nodes(), &context).await?;
            phases_completed.push(phase);
        }

        StartupSequencer::new(&self.settings.hadoop_user, owner_user)
            .start_services(master)
            .await?;

        let authorized_rules = match network {
            Some(policy) => {
                FirewallOpener::new(policy)
                    .ensure_open(&self.settings.status_ports())
                    .await?
            }
            None => {
                debug!("No network policy configured; leaving ingress rules untouched");
                Vec::new()
            }
        };

        let job_tracker_url = format!(
            "http://{}:{}",
            master.dns_name(),
            self.settings.jobtracker_ui_port
        );
        let namenode_url = format!(
            "http://{}:{}",
            master.dns_name(),
            self.settings.namenode_ui_port
        );
        info!("Job tracker status: {}", job_tracker_url);
        info!("Namenode status: {}", namenode_url);

        Ok(RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            config,
            phases_completed,
            authorized_rules,
            job_tracker_url,
            namenode_url,
        })
    }
}
