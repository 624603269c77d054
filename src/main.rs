use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hadoop_bootstrap::app::{handle_fatal_error, init_logging, AppConfig};
use hadoop_bootstrap::cluster::ClusterTopology;
use hadoop_bootstrap::config::{ConfigSet, Inventory};
use hadoop_bootstrap::network::{AwsCliNetworkPolicy, NetworkPolicy};
use hadoop_bootstrap::orchestrator::HadoopSetup;
use hadoop_bootstrap::subprocess::SubprocessManager;
use hadoop_bootstrap::templates::Artifacts;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configure and start Hadoop across a cluster
#[derive(Parser)]
#[command(name = "hadoop-bootstrap")]
#[command(about = "Configure and start Hadoop on every node of a cluster", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure every node, start the services and open the status ports
    Run {
        /// Cluster inventory (YAML or TOML); defaults to the per-user config location
        #[arg(short, long)]
        inventory: Option<PathBuf>,

        /// Leave security group ingress rules untouched
        #[arg(long)]
        no_firewall: bool,

        /// Do not draw per-phase progress bars
        #[arg(long)]
        no_progress: bool,
    },
    /// Render the configuration files without touching any node
    Render {
        #[arg(short, long)]
        inventory: Option<PathBuf>,

        /// Write each file under this directory, mirroring its remote path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the configuration derived from the inventory
    Plan {
        #[arg(short, long)]
        inventory: Option<PathBuf>,

        /// Print JSON instead of YAML
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    let show_progress = !matches!(cli.command, Commands::Run { no_progress: true, .. });
    let config = AppConfig::new(verbose).with_progress(show_progress);
    init_logging(&config);

    let result = match cli.command {
        Commands::Run {
            inventory,
            no_firewall,
            ..
        } => run_setup(inventory, no_firewall, &config).await,
        Commands::Render { inventory, output } => render(inventory, output),
        Commands::Plan { inventory, json } => plan(inventory, json),
    };

    if let Err(e) = result {
        handle_fatal_error(e, verbose);
    }
}

fn load_inventory(path: Option<PathBuf>) -> Result<Inventory> {
    let path = match path {
        Some(path) => path,
        None => Inventory::default_path()?,
    };
    debug!("Using inventory {}", path.display());
    Inventory::load(&path).with_context(|| format!("Failed to load inventory {}", path.display()))
}

async fn run_setup(inventory: Option<PathBuf>, no_firewall: bool, config: &AppConfig) -> Result<()> {
    let inventory = load_inventory(inventory)?;
    let subprocess = SubprocessManager::production();
    let topology = ClusterTopology::from_inventory(&inventory, subprocess.runner())?;

    let policy = (inventory.firewall.enabled && !no_firewall).then(|| {
        AwsCliNetworkPolicy::new(
            inventory.security_group(),
            inventory.firewall.region.clone(),
            subprocess.runner(),
        )
    });

    let setup = HadoopSetup::new(inventory.hadoop.clone())
        .with_max_parallel(inventory.max_parallel)
        .with_progress(config.show_progress);
    let summary = setup
        .run(
            &topology,
            &inventory.owner_user,
            policy.as_ref().map(|p| p as &dyn NetworkPolicy),
        )
        .await
        .with_context(|| format!("Hadoop setup of cluster '{}' failed", inventory.cluster_name))?;

    info!("Hadoop is running on cluster '{}'", inventory.cluster_name);
    println!("Job tracker status: {}", summary.job_tracker_url);
    println!("Namenode status: {}", summary.namenode_url);
    Ok(())
}

fn render_artifacts(inventory: &Inventory) -> Result<Artifacts> {
    let (master, workers) = inventory
        .nodes
        .split_first()
        .context("Inventory has no nodes")?;
    let worker_aliases: Vec<String> = workers.iter().map(|n| n.alias.clone()).collect();
    let config = ConfigSet::for_worker_count(worker_aliases.len(), &inventory.hadoop);
    Ok(Artifacts::render(
        &config,
        &inventory.hadoop,
        &master.alias,
        &worker_aliases,
    )?)
}

fn render(inventory: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let inventory = load_inventory(inventory)?;
    let artifacts = render_artifacts(&inventory)?;

    match output {
        Some(dir) => {
            for artifact in artifacts.all() {
                let target = mirrored_path(&dir, &artifact.path);
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create {}", parent.display()))?;
                }
                std::fs::write(&target, &artifact.content)
                    .with_context(|| format!("Failed to write {}", target.display()))?;
                println!("{}", target.display());
            }
        }
        None => {
            for artifact in artifacts.all() {
                println!("==> {} <==", artifact.path);
                println!("{}", artifact.content);
            }
        }
    }
    Ok(())
}

/// `/etc/hadoop/masters` under `out` becomes `out/etc/hadoop/masters`
fn mirrored_path(root: &Path, remote: &str) -> PathBuf {
    root.join(remote.trim_start_matches('/'))
}

fn plan(inventory: Option<PathBuf>, json: bool) -> Result<()> {
    let inventory = load_inventory(inventory)?;
    let config = ConfigSet::for_worker_count(
        inventory.nodes.len().saturating_sub(1),
        &inventory.hadoop,
    );

    let rendered = if json {
        serde_json::to_string_pretty(&config)?
    } else {
        serde_yaml::to_string(&config)?
    };
    println!("{}", rendered.trim_end());
    Ok(())
}
