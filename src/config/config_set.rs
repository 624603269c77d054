//! Derived, immutable configuration shared by every node job of a run

use super::HadoopSettings;
use crate::cluster::ClusterTopology;
use serde::Serialize;

/// Worker count at which the default replication factor grows to 3
const LARGE_CLUSTER_WORKERS: usize = 8;

/// Values substituted into the site configuration files.
///
/// Built once per run from the topology and [`HadoopSettings`], then shared
/// read-only (behind an `Arc`) by all concurrent jobs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigSet {
    pub worker_count: usize,
    pub dfs_replication: u32,
    pub dfs_data_dir: String,
    pub dfs_name_dir: String,
    pub dfs_hosts_exclude: String,
    pub dfs_du_reserved: u64,
    pub mapred_local_dir: String,
    pub mapred_system_dir: String,
    pub mapred_staging_root_dir: String,
    pub mapred_map_tasks_maximum: u32,
    pub mapred_reduce_tasks_maximum: u32,
    pub mapred_reduce_tasks: u64,
    pub mapred_child_java_opts: String,
}

impl ConfigSet {
    pub fn build(topology: &ClusterTopology, settings: &HadoopSettings) -> Self {
        Self::for_worker_count(topology.worker_count(), settings)
    }

    /// Pure derivation from the worker count.
    ///
    /// Precondition: numeric settings are non-negative and finite; they are
    /// validated when the inventory is loaded, not here.
    pub fn for_worker_count(worker_count: usize, settings: &HadoopSettings) -> Self {
        Self {
            worker_count,
            dfs_replication: replication_factor(worker_count, settings.dfs_replication),
            dfs_data_dir: settings.dfs_data_dir.clone(),
            dfs_name_dir: settings.dfs_name_dir.clone(),
            dfs_hosts_exclude: settings.dfs_hosts_exclude.clone(),
            dfs_du_reserved: settings.dfs_du_reserved,
            mapred_local_dir: settings.mapred_local_dir.clone(),
            mapred_system_dir: settings.mapred_system_dir.clone(),
            mapred_staging_root_dir: settings.mapred_staging_root_dir.clone(),
            mapred_map_tasks_maximum: settings.map_tasks_max,
            mapred_reduce_tasks_maximum: settings.reduce_tasks_max,
            mapred_reduce_tasks: reduce_task_count(
                settings.reduce_tasks_max,
                worker_count,
                settings.reduce_tasks_factor,
            ),
            mapred_child_java_opts: settings.mapred_child_java_opts.clone(),
        }
    }
}

/// HDFS replication: the override if given, else 2, or 3 from eight workers up
pub fn replication_factor(worker_count: usize, requested: Option<u32>) -> u32 {
    match requested {
        Some(replication) => replication,
        None if worker_count >= LARGE_CLUSTER_WORKERS => 3,
        None => 2,
    }
}

/// `floor(reduce_max * workers * factor + 0.5)`, rounding halves up
pub fn reduce_task_count(reduce_tasks_max: u32, worker_count: usize, factor: f64) -> u64 {
    (f64::from(reduce_tasks_max) * worker_count as f64 * factor + 0.5).floor() as u64
}
