//! User tunables for the Hadoop installation
//!
//! Recommended per-node task slot maxima by instance size:
//!
//! ```text
//! type        maps  reduces
//! m1.small      2      1
//! c1.medium     4      2
//! m1.large      4      2
//! m1.xlarge     8      4
//! c1.xlarge     8      4
//! ```

use serde::{Deserialize, Serialize};

/// Hadoop tunables and on-node layout, every field defaulted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HadoopSettings {
    /// Service account that owns the daemons and local directories
    #[serde(default = "default_hadoop_user")]
    pub hadoop_user: String,

    #[serde(default = "default_map_tasks_max")]
    pub map_tasks_max: u32,

    #[serde(default = "default_reduce_tasks_max")]
    pub reduce_tasks_max: u32,

    /// Multiplier applied to the cluster-wide reduce slot count
    #[serde(default = "default_reduce_tasks_factor")]
    pub reduce_tasks_factor: f64,

    /// Overrides the size-derived replication factor
    #[serde(default)]
    pub dfs_replication: Option<u32>,

    /// Bytes per volume reserved for non-HDFS use
    #[serde(default = "default_dfs_du_reserved")]
    pub dfs_du_reserved: u64,

    #[serde(default = "default_child_java_opts")]
    pub mapred_child_java_opts: String,

    #[serde(default = "default_hadoop_conf")]
    pub hadoop_conf: String,

    #[serde(default = "default_pid_dir")]
    pub hadoop_pid_dir: String,

    #[serde(default = "default_log_dir")]
    pub hadoop_log_dir: String,

    #[serde(default = "default_hosts_exclude")]
    pub dfs_hosts_exclude: String,

    #[serde(default = "default_dfs_dir")]
    pub dfs_dir: String,

    #[serde(default = "default_dfs_data_dir")]
    pub dfs_data_dir: String,

    #[serde(default = "default_dfs_name_dir")]
    pub dfs_name_dir: String,

    #[serde(default = "default_mapred_local_dir")]
    pub mapred_local_dir: String,

    #[serde(default = "default_mapred_system_dir")]
    pub mapred_system_dir: String,

    #[serde(default = "default_staging_root_dir")]
    pub mapred_staging_root_dir: String,

    /// Location of the dumbo job-submission helper config
    #[serde(default = "default_dumbo_conf")]
    pub dumbo_conf: String,

    /// Mode applied recursively to the local data, pid and log directories
    #[serde(default = "default_directory_permission")]
    pub directory_permission: String,

    #[serde(default = "default_job_tracker_port")]
    pub job_tracker_port: u16,

    #[serde(default = "default_namenode_ui_port")]
    pub namenode_ui_port: u16,

    #[serde(default = "default_jobtracker_ui_port")]
    pub jobtracker_ui_port: u16,
}

impl HadoopSettings {
    /// Local directories created and owned by the service account on every node
    pub fn local_directories(&self) -> [&str; 3] {
        [&self.dfs_dir, &self.hadoop_pid_dir, &self.hadoop_log_dir]
    }

    /// Status UI ports opened to the world on the master
    pub fn status_ports(&self) -> [u16; 2] {
        [self.namenode_ui_port, self.jobtracker_ui_port]
    }

    pub fn conf_path(&self, file: &str) -> String {
        format!("{}/{}", self.hadoop_conf.trim_end_matches('/'), file)
    }
}

impl Default for HadoopSettings {
    fn default() -> Self {
        Self {
            hadoop_user: default_hadoop_user(),
            map_tasks_max: default_map_tasks_max(),
            reduce_tasks_max: default_reduce_tasks_max(),
            reduce_tasks_factor: default_reduce_tasks_factor(),
            dfs_replication: None,
            dfs_du_reserved: default_dfs_du_reserved(),
            mapred_child_java_opts: default_child_java_opts(),
            hadoop_conf: default_hadoop_conf(),
            hadoop_pid_dir: default_pid_dir(),
            hadoop_log_dir: default_log_dir(),
            dfs_hosts_exclude: default_hosts_exclude(),
            dfs_dir: default_dfs_dir(),
            dfs_data_dir: default_dfs_data_dir(),
            dfs_name_dir: default_dfs_name_dir(),
            mapred_local_dir: default_mapred_local_dir(),
            mapred_system_dir: default_mapred_system_dir(),
            mapred_staging_root_dir: default_staging_root_dir(),
            dumbo_conf: default_dumbo_conf(),
            directory_permission: default_directory_permission(),
            job_tracker_port: default_job_tracker_port(),
            namenode_ui_port: default_namenode_ui_port(),
            jobtracker_ui_port: default_jobtracker_ui_port(),
        }
    }
}

fn default_hadoop_user() -> String {
    "hadoop".to_string()
}

fn default_map_tasks_max() -> u32 {
    2
}

fn default_reduce_tasks_max() -> u32 {
    1
}

fn default_reduce_tasks_factor() -> f64 {
    1.75
}

fn default_dfs_du_reserved() -> u64 {
    1 << 30
}

fn default_child_java_opts() -> String {
    "-Xmx512m".to_string()
}

fn default_hadoop_conf() -> String {
    "/etc/hadoop".to_string()
}

fn default_pid_dir() -> String {
    "/var/run/hadoop".to_string()
}

fn default_log_dir() -> String {
    "/var/log/hadoop".to_string()
}

fn default_hosts_exclude() -> String {
    "/etc/hadoop/excludes".to_string()
}

fn default_dfs_dir() -> String {
    "/mnt/hadoop".to_string()
}

fn default_dfs_data_dir() -> String {
    "/mnt/hadoop/dfs/data".to_string()
}

fn default_dfs_name_dir() -> String {
    "/mnt/hadoop/dfs/name".to_string()
}

fn default_mapred_local_dir() -> String {
    "/mnt/hadoop/mapred/local".to_string()
}

fn default_mapred_system_dir() -> String {
    "/user/${user.name}/.staging".to_string()
}

fn default_staging_root_dir() -> String {
    "/user".to_string()
}

fn default_dumbo_conf() -> String {
    "/etc/dumbo.conf".to_string()
}

fn default_directory_permission() -> String {
    "775".to_string()
}

fn default_job_tracker_port() -> u16 {
    8021
}

fn default_namenode_ui_port() -> u16 {
    50070
}

fn default_jobtracker_ui_port() -> u16 {
    50030
}
