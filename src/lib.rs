//! # hadoop-bootstrap
//!
//! Configure and start Hadoop on a freshly provisioned cluster.
//!
//! ## Usage
//!
//! ```bash
//! hadoop-bootstrap run --inventory cluster.yml
//! ```
//!
//! ## Modules
//!
//! - `app` - Binary plumbing: logging, verbosity, fatal error reporting
//! - `cluster` - Cluster topology and per-node transports (SSH)
//! - `config` - Inventory files, Hadoop tunables and the derived per-run configuration
//! - `error` - Run-level error taxonomy and exit codes
//! - `network` - Security group inspection and ingress authorization
//! - `orchestrator` - Phase runner, startup sequencer and the top-level run
//! - `pool` - Bounded worker pool with count-based completion waits
//! - `subprocess` - Local process abstraction used by the transports
//! - `templates` - Rendering of the per-node configuration files
//! - `testing` - In-memory collaborators for tests and benchmarks
pub mod app;
pub mod cluster;
pub mod config;
pub mod error;
pub mod network;
pub mod orchestrator;
pub mod pool;
pub mod subprocess;
pub mod templates;

pub mod testing;

#[cfg(test)]
mod property_tests;

pub use error::{Result, SetupError};
pub use orchestrator::{HadoopSetup, RunSummary};
