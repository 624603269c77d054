//! [`NodeTransport`] over the local OpenSSH client

use super::transport::{CommandOutput, NodeTransport, TransportError};
use crate::config::SshSettings;
use crate::subprocess::{ProcessCommand, ProcessCommandBuilder, ProcessOutput, ProcessRunner};
use async_trait::async_trait;
use std::sync::Arc;

/// ssh reserves this status for its own failures
const SSH_ERROR_STATUS: i32 = 255;

pub struct SshTransport {
    host: String,
    settings: SshSettings,
    runner: Arc<dyn ProcessRunner>,
}

impl SshTransport {
    pub fn new(host: impl Into<String>, settings: SshSettings, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            host: host.into(),
            settings,
            runner,
        }
    }

    fn command(&self, remote: &str, stdin: Option<String>) -> ProcessCommand {
        let mut builder = ProcessCommandBuilder::new("ssh")
            .args(["-o", "BatchMode=yes", "-o", "StrictHostKeyChecking=no"])
            .arg("-o")
            .arg(&format!(
                "ConnectTimeout={}",
                self.settings.connect_timeout.as_secs().max(1)
            ))
            .arg("-p")
            .arg(&self.settings.port.to_string());

        if let Some(identity) = &self.settings.identity_file {
            builder = builder.arg("-i").arg(&identity.to_string_lossy());
        }

        builder = builder
            .arg(&format!("{}@{}", self.settings.user, self.host))
            .arg(remote)
            .maybe_timeout(self.settings.command_timeout);

        if let Some(input) = stdin {
            builder = builder.stdin(input);
        }
        builder.build()
    }

    async fn run(&self, remote: &str, stdin: Option<String>) -> Result<CommandOutput, TransportError> {
        let output = self.runner.run(self.command(remote, stdin)).await?;
        self.command_output(output)
    }

    fn command_output(&self, output: ProcessOutput) -> Result<CommandOutput, TransportError> {
        let exit_code = output.status.code().unwrap_or(-1);
        if exit_code == SSH_ERROR_STATUS {
            return Err(TransportError::Connection {
                host: self.host.clone(),
                reason: output.stderr.trim().to_string(),
            });
        }

        Ok(CommandOutput {
            exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

fn check(output: CommandOutput) -> Result<(), TransportError> {
    if output.success() {
        Ok(())
    } else {
        Err(TransportError::NonZeroExit {
            code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        })
    }
}

#[async_trait]
impl NodeTransport for SshTransport {
    async fn write_remote_file(&self, path: &str, content: &str) -> Result<(), TransportError> {
        let remote = format!("cat > {}", shell_words::quote(path));
        check(self.run(&remote, Some(content.to_string())).await?)
    }

    async fn execute(&self, command: &str) -> Result<CommandOutput, TransportError> {
        tracing::debug!("{}: {}", self.host, command);
        self.run(command, None).await
    }

    async fn is_directory(&self, path: &str) -> Result<bool, TransportError> {
        let output = self
            .run(&format!("test -d {}", shell_words::quote(path)), None)
            .await?;
        match output.exit_code {
            0 => Ok(true),
            1 => Ok(false),
            _ => Err(TransportError::NonZeroExit {
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            }),
        }
    }

    async fn make_directory(&self, path: &str) -> Result<(), TransportError> {
        check(
            self.run(&format!("mkdir -p {}", shell_words::quote(path)), None)
                .await?,
        )
    }
}
