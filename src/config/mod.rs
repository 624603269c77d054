//! Configuration: user tunables, the cluster inventory file and the derived
//! per-run [`ConfigSet`].

pub mod config_set;
pub mod inventory;
pub mod settings;


pub use config_set::{reduce_task_count, replication_factor, ConfigSet};
pub use inventory::{ConfigError, FirewallSettings, Inventory, NodeEntry, SshSettings};
pub use settings::HadoopSettings;
