//! Ordered service startup on the master
//!
//! Every step runs as the Hadoop service account and depends on the one
//! before it, so the sequence stops at the first failing command.

use crate::cluster::Node;
use crate::error::{Result, SetupError};
use serde::Serialize;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartupStep {
    FormatNamenode,
    StartDfs,
    StartMapred,
    CreateHomeDir,
    ChownHomeDir,
}

impl StartupStep {
    pub const ALL: [StartupStep; 5] = [
        StartupStep::FormatNamenode,
        StartupStep::StartDfs,
        StartupStep::StartMapred,
        StartupStep::CreateHomeDir,
        StartupStep::ChownHomeDir,
    ];

    /// The command run as the service account
    pub fn inner_command(&self, owner_user: &str) -> String {
        match self {
            StartupStep::FormatNamenode => "hadoop namenode -format".to_string(),
            StartupStep::StartDfs => "start-dfs.sh".to_string(),
            StartupStep::StartMapred => "start-mapred.sh".to_string(),
            StartupStep::CreateHomeDir => format!("hadoop fs -mkdir /user/{owner_user}"),
            StartupStep::ChownHomeDir => {
                format!("hadoop fs -chown {owner_user} /user/{owner_user}")
            }
        }
    }

    /// Full remote command line with the privilege drop applied
    pub fn command(&self, hadoop_user: &str, owner_user: &str) -> String {
        format!(
            "su {} -c {}",
            hadoop_user,
            shell_words::quote(&self.inner_command(owner_user))
        )
    }
}

impl fmt::Display for StartupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StartupStep::FormatNamenode => "format namenode",
            StartupStep::StartDfs => "start HDFS",
            StartupStep::StartMapred => "start MapReduce",
            StartupStep::CreateHomeDir => "create HDFS home directory",
            StartupStep::ChownHomeDir => "chown HDFS home directory",
        };
        f.write_str(name)
    }
}

pub struct StartupSequencer<'a> {
    hadoop_user: &'a str,
    owner_user: &'a str,
}

impl<'a> StartupSequencer<'a> {
    pub fn new(hadoop_user: &'a str, owner_user: &'a str) -> Self {
        Self {
            hadoop_user,
            owner_user,
        }
    }

    pub async fn start_services(&self, master: &Node) -> Result<()> {
        for step in StartupStep::ALL {
            match step {
                StartupStep::FormatNamenode => info!("Formatting namenode..."),
                StartupStep::StartDfs => info!("Starting HDFS..."),
                StartupStep::StartMapred => info!("Starting mapred..."),
                StartupStep::CreateHomeDir => info!(
                    "Creating the HDFS home directory of user {}...",
                    self.owner_user
                ),
                StartupStep::ChownHomeDir => {}
            }

            let command = step.command(self.hadoop_user, self.owner_user);
            master
                .transport()
                .execute_checked(&command)
                .await
                .map_err(|source| SetupError::StartupStep {
                    step,
                    node: master.alias().to_string(),
                    source,
                })?;
        }
        Ok(())
    }
}
