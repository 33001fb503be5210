use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use scopeforge::acl::translate;
use scopeforge::config::{ClusterConfig, Config};
use scopeforge::reconcile::{close_client, SnapshotClusterClient};
use scopeforge::report::{self, OutputFormat};
use scopeforge::{Provisioner, RunMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "scopeforge.toml";

#[derive(Parser)]
#[command(name = "scopeforge")]
#[command(about = "Declarative topic and ACL provisioning for messaging clusters")]
#[command(version)]
pub struct Cli {
    /// Application config (clusters, engine and retry settings)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Blueprint document, overriding `blueprint_path` from the config
    #[arg(long)]
    pub blueprint: Option<PathBuf>,

    /// Definitions document, overriding `definitions_path` from the config
    #[arg(long)]
    pub definitions: Option<PathBuf>,

    /// Directory holding one JSON cluster snapshot per cluster
    #[arg(long, default_value = "state")]
    pub state: PathBuf,

    /// Report what would change without touching any cluster
    #[arg(long)]
    pub dry_run: bool,

    /// Debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Output format
    #[arg(long, default_value = "table")]
    pub format: OutputFormat,

    /// Cluster selection mode
    #[arg(long, default_value = "single")]
    pub mode: RunMode,

    /// Cluster to target in single mode (default: first enabled)
    #[arg(long)]
    pub cluster: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Copy)]
pub enum Commands {
    /// Compute and print the actions needed, without executing them
    Plan,
    /// Bring the clusters to the declared state
    Apply,
    /// Delete everything the definitions provision
    Teardown,
    /// Inspect the computed desired state
    #[command(subcommand)]
    Show(ShowCommands),
}

#[derive(Subcommand, Clone, Copy)]
pub enum ShowCommands {
    /// Generated topic names
    Topics,
    /// Effective configuration per topic
    Configs,
    /// User-topic mapping
    Utm,
    /// ACL entries, translated for the selected cluster's backend
    Acls {
        /// Print the abstract entries instead
        #[arg(long = "abstract")]
        abstract_only: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = load_config(&cli)?;
    let provisioner = Provisioner::from_config(config).context("Failed to load provisioning inputs")?;

    match cli.command {
        Commands::Show(target) => show(&provisioner, &cli, target),
        command => run(&provisioner, &cli, command).await,
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::from_file(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("Failed to load config from {}", DEFAULT_CONFIG_PATH))?,
        None => {
            info!("No {} found, using default configuration", DEFAULT_CONFIG_PATH);
            Config::default()
        }
    };

    if let Some(path) = &cli.blueprint {
        config.blueprint_path = path.clone();
    }
    if let Some(path) = &cli.definitions {
        config.definitions_path = path.clone();
    }
    if cli.dry_run {
        config.engine.dry_run = true;
    }

    Ok(config)
}

fn show(provisioner: &Provisioner, cli: &Cli, target: ShowCommands) -> anyhow::Result<()> {
    let expansion = provisioner.expansion();
    let table = match target {
        ShowCommands::Topics => report::topics_table(&expansion.tcm),
        ShowCommands::Configs => report::configs_table(&expansion.tcm),
        ShowCommands::Utm => report::utm_table(&expansion.utm),
        ShowCommands::Acls { abstract_only } => {
            let mapping = expansion.acl_mapping(provisioner.context());
            if abstract_only {
                report::acls_table(&mapping)
            } else {
                let cluster = provisioner.config().select_cluster(cli.cluster.as_deref())?;
                let translation = translate(&mapping, cluster.acl_backend);
                if !translation.rejected.is_empty() {
                    warn!(
                        "{} entries cannot be expressed for the {} backend",
                        translation.rejected.len(),
                        cluster.acl_backend
                    );
                }
                report::acls_table(&translation.accepted)
            }
        }
    };

    println!("{}", table.render(cli.format)?);
    Ok(())
}

fn state_path(dir: &Path, cluster: &ClusterConfig) -> PathBuf {
    dir.join(format!("{}.json", cluster.name))
}

async fn run(provisioner: &Provisioner, cli: &Cli, command: Commands) -> anyhow::Result<()> {
    let dry_run = provisioner.config().engine.dry_run;
    let clusters = provisioner.clusters(cli.mode, cli.cluster.as_deref())?;
    let mut failures = 0usize;

    if !dry_run {
        std::fs::create_dir_all(&cli.state)
            .with_context(|| format!("Failed to create state directory {}", cli.state.display()))?;
    }

    for cluster in clusters {
        let path = state_path(&cli.state, cluster);
        let client = Arc::new(
            SnapshotClusterClient::load(&path)
                .with_context(|| format!("Failed to load cluster snapshot {}", path.display()))?,
        );
        info!(
            "Running {} against cluster {} ({} backend)",
            command_name(command),
            cluster.name,
            cluster.acl_backend
        );

        let work = async {
            let output = match command {
                Commands::Plan => {
                    let plan = provisioner.plan(cluster, client.clone()).await?;
                    report::render(&plan, report::plan_table, cli.format)?
                }
                Commands::Apply | Commands::Teardown => {
                    let result = if matches!(command, Commands::Apply) {
                        provisioner.apply(cluster, client.clone(), dry_run).await?
                    } else {
                        provisioner.teardown(cluster, client.clone(), dry_run).await?
                    };
                    failures += result.failed.len();
                    report::render(&result, report::report_table, cli.format)?
                }
                Commands::Show(_) => String::new(),
            };
            Ok::<_, scopeforge::ProvisionError>(output)
        };

        let outcome = tokio::select! {
            result = work => Some(result),
            _ = tokio::signal::ctrl_c() => {
                warn!("Received shutdown signal, stopping run on cluster {}", cluster.name);
                None
            }
        };

        if !dry_run && !matches!(command, Commands::Plan) {
            client
                .persist()
                .with_context(|| format!("Failed to persist cluster snapshot {}", path.display()))?;
        }
        if let Err(e) = close_client(client.as_ref(), &provisioner.config().retry).await {
            warn!("Failed to close connection to cluster {}: {}", cluster.name, e);
        }

        match outcome {
            Some(result) => {
                let output = result.with_context(|| format!("Run against cluster {} failed", cluster.name))?;
                println!("{}", output);
            }
            None => bail!("Interrupted while running against cluster {}", cluster.name),
        }
    }

    if failures > 0 {
        bail!("{} cluster actions failed", failures);
    }
    Ok(())
}

fn command_name(command: Commands) -> &'static str {
    match command {
        Commands::Plan => "plan",
        Commands::Apply => "apply",
        Commands::Teardown => "teardown",
        Commands::Show(_) => "show",
    }
}
