//! Shared helpers for integration tests

use std::path::PathBuf;
use tempfile::TempDir;

pub const THREE_NODE_INVENTORY: &str = r#"
cluster_name: analytics
owner_user: alice
nodes:
  - alias: master
    host: ec2-54-1-1-1.compute-1.amazonaws.com
  - alias: node001
    host: ec2-54-1-1-2.compute-1.amazonaws.com
  - alias: node002
    host: ec2-54-1-1-3.compute-1.amazonaws.com
hadoop:
  map_tasks_max: 4
  reduce_tasks_max: 2
"#;

/// Write `content` to `name` inside a fresh temporary directory
pub fn write_inventory(name: &str, content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    (dir, path)
}
