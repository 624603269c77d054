use crate::subprocess::ProcessError;
use async_trait::async_trait;

/// Failure talking to a single node
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection to {host} failed: {reason}")]
    Connection { host: String, reason: String },

    #[error("Remote command exited with status {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("Local process error: {0}")]
    Process(#[from] ProcessError),

    #[error("Remote I/O error: {0}")]
    Io(String),
}

/// Result of a remote shell command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Remote execution capability of one node
///
/// `execute` reports non-zero exits as data; use
/// [`NodeTransport::execute_checked`] when a failure must abort the caller.
#[async_trait]
pub trait NodeTransport: Send + Sync {
    /// Create or truncate `path` and write `content` to it
    async fn write_remote_file(&self, path: &str, content: &str) -> Result<(), TransportError>;

    async fn execute(&self, command: &str) -> Result<CommandOutput, TransportError>;

    async fn is_directory(&self, path: &str) -> Result<bool, TransportError>;

    async fn make_directory(&self, path: &str) -> Result<(), TransportError>;

    async fn execute_checked(&self, command: &str) -> Result<CommandOutput, TransportError> {
        let output = self.execute(command).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(TransportError::NonZeroExit {
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}
