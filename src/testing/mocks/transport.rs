//! Scriptable in-memory [`NodeTransport`]

use crate::cluster::{CommandOutput, NodeTransport, TransportError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One operation seen by a [`MockTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedOp {
    Write { path: String, content: String },
    Execute(String),
    IsDirectory(String),
    MakeDirectory(String),
}

/// A recorded operation stamped with the shared clock value at call time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub seq: u64,
    pub op: RecordedOp,
}

struct CommandFailure {
    pattern: String,
    exit_code: i32,
    stderr: String,
}

/// Records every operation and fails the ones it was told to.
///
/// Files written are kept so later `is_directory` checks and content
/// assertions see the node's simulated state.
pub struct MockTransport {
    alias: String,
    clock: Arc<AtomicU64>,
    delay: Option<Duration>,
    unreachable: bool,
    failing_writes: HashSet<String>,
    command_failures: Vec<CommandFailure>,
    calls: Mutex<Vec<RecordedCall>>,
    files: Mutex<HashMap<String, String>>,
    directories: Mutex<HashSet<String>>,
}

impl MockTransport {
    pub fn new(alias: &str) -> Self {
        Self {
            alias: alias.to_string(),
            clock: Arc::new(AtomicU64::new(0)),
            delay: None,
            unreachable: false,
            failing_writes: HashSet::new(),
            command_failures: Vec::new(),
            calls: Mutex::new(Vec::new()),
            files: Mutex::new(HashMap::new()),
            directories: Mutex::new(HashSet::new()),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn with_clock(mut self, clock: Arc<AtomicU64>) -> Self {
        self.clock = clock;
        self
    }

    /// Sleep before every operation
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_directory(self, path: &str) -> Self {
        self.directories.lock().unwrap().insert(path.to_string());
        self
    }

    /// Fail writes to `path` with a non-zero exit
    pub fn fail_write(mut self, path: &str) -> Self {
        self.failing_writes.insert(path.to_string());
        self
    }

    /// Any command containing `pattern` exits with `exit_code`
    pub fn fail_command(mut self, pattern: &str, exit_code: i32, stderr: &str) -> Self {
        self.command_failures.push(CommandFailure {
            pattern: pattern.to_string(),
            exit_code,
            stderr: stderr.to_string(),
        });
        self
    }

    /// Every operation fails with a connection error
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Commands passed to `execute`, in call order
    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c.op {
                RecordedOp::Execute(command) => Some(command),
                _ => None,
            })
            .collect()
    }

    /// Paths written, in call order, including failed attempts
    pub fn written_paths(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c.op {
                RecordedOp::Write { path, .. } => Some(path),
                _ => None,
            })
            .collect()
    }

    /// Current content of a successfully written file
    pub fn file(&self, path: &str) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn created_directories(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c.op {
                RecordedOp::MakeDirectory(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    /// Clock value of the first recorded operation matching `predicate`
    pub fn first_seq(&self, predicate: impl Fn(&RecordedOp) -> bool) -> Option<u64> {
        self.calls()
            .into_iter()
            .find(|c| predicate(&c.op))
            .map(|c| c.seq)
    }

    async fn record(&self, op: RecordedOp) -> Result<(), TransportError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let seq = self.clock.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(RecordedCall { seq, op });

        if self.unreachable {
            return Err(TransportError::Connection {
                host: self.alias.clone(),
                reason: "Connection refused".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl NodeTransport for MockTransport {
    async fn write_remote_file(&self, path: &str, content: &str) -> Result<(), TransportError> {
        self.record(RecordedOp::Write {
            path: path.to_string(),
            content: content.to_string(),
        })
        .await?;

        if self.failing_writes.contains(path) {
            return Err(TransportError::NonZeroExit {
                code: 1,
                stderr: format!("{path}: No space left on device"),
            });
        }
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn execute(&self, command: &str) -> Result<CommandOutput, TransportError> {
        self.record(RecordedOp::Execute(command.to_string())).await?;

        let failure = self
            .command_failures
            .iter()
            .find(|f| command.contains(&f.pattern));
        Ok(match failure {
            Some(f) => CommandOutput {
                exit_code: f.exit_code,
                stdout: String::new(),
                stderr: f.stderr.clone(),
            },
            None => CommandOutput::default(),
        })
    }

    async fn is_directory(&self, path: &str) -> Result<bool, TransportError> {
        self.record(RecordedOp::IsDirectory(path.to_string())).await?;
        Ok(self.directories.lock().unwrap().contains(path))
    }

    async fn make_directory(&self, path: &str) -> Result<(), TransportError> {
        self.record(RecordedOp::MakeDirectory(path.to_string()))
            .await?;
        self.directories.lock().unwrap().insert(path.to_string());
        Ok(())
    }
}
