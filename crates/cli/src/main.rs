//! Kube Dashboard CLI
//!
//! A command-line tool for pausing and resuming workloads, checking their
//! status and viewing cluster inventory and health.

mod backend;
mod client;
mod commands;
mod config;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{health, inventory, workloads};

use crate::backend::{Backend, DirectBackend};
use crate::output::print_info;

/// Kube Dashboard CLI
#[derive(Parser)]
#[command(name = "kdash")]
#[command(author, version, about = "CLI for the Kubernetes workload dashboard", long_about = None)]
pub struct Cli {
    /// Dashboard API URL (can also be set via KDASH_API_URL env var)
    #[arg(long, env = "KDASH_API_URL")]
    pub api_url: Option<String>,

    /// Path to kubeconfig file, used with --direct (uses default if not specified)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<String>,

    /// Kubeconfig context, used with --direct
    #[arg(long)]
    pub context: Option<String>,

    /// Talk to the cluster directly instead of the dashboard API
    #[arg(long)]
    pub direct: bool,

    /// Workload state store directory, used with --direct
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pause a deployment or pod, remembering its replica count
    Pause {
        /// Namespace of the workload
        namespace: String,

        /// Deployment or pod name
        name: String,

        #[command(flatten)]
        owner: OwnerArgs,

        #[command(flatten)]
        wait: WaitArgs,
    },

    /// Resume a paused deployment or pod
    Resume {
        /// Namespace of the workload
        namespace: String,

        /// Deployment or pod name
        name: String,

        /// Replica count to restore instead of the remembered one
        #[arg(long)]
        replicas: Option<u32>,

        #[command(flatten)]
        owner: OwnerArgs,

        #[command(flatten)]
        wait: WaitArgs,
    },

    /// Show whether a workload is running, stopped or scaling
    Status {
        /// Namespace of the workload
        namespace: String,

        /// Deployment or pod name
        name: String,
    },

    /// List workloads paused by the dashboard
    Paused,

    /// List cluster objects
    Get {
        /// Object kind
        #[arg(value_enum)]
        resource: inventory::Resource,

        /// Filter by namespace
        #[arg(long, short)]
        namespace: Option<String>,
    },

    /// Show cluster health and alerts
    Health,
}

#[derive(clap::Args)]
pub struct OwnerArgs {
    /// Kind of the pod's owner (e.g. ReplicaSet), as shown in the dashboard
    #[arg(long)]
    pub owner_kind: Option<String>,

    /// Name of the pod's owner
    #[arg(long)]
    pub owner_name: Option<String>,
}

#[derive(clap::Args)]
pub struct WaitArgs {
    /// Wait until the workload reaches its target replica count
    #[arg(long)]
    pub wait: bool,

    /// Seconds to wait before giving up
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,
}

fn action_args(
    namespace: String,
    name: String,
    owner: OwnerArgs,
    wait: WaitArgs,
) -> workloads::ActionArgs {
    workloads::ActionArgs {
        namespace,
        name,
        owner_kind: owner.owner_kind,
        owner_name: owner.owner_name,
        wait: wait.wait,
        timeout_secs: wait.timeout,
    }
}

async fn connect(cli: &Cli, settings: &config::Config) -> Result<Backend> {
    if cli.direct {
        let kubeconfig = cli.kubeconfig.as_deref().map(PathBuf::from);
        let state_dir = settings.state_dir(cli.state_dir.as_deref());
        let direct =
            DirectBackend::connect(kubeconfig.as_deref(), cli.context.as_deref(), state_dir).await?;
        Ok(Backend::Direct(Box::new(direct)))
    } else {
        let api_url = settings.api_url(cli.api_url.as_deref());
        Ok(Backend::Api(client::ApiClient::new(&api_url)?))
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = config::Config::load()?;
    let backend = connect(&cli, &settings).await?;
    if cli.verbose {
        print_info(&format!("Using {}", backend.describe()));
    }

    // Execute command
    match cli.command {
        Commands::Pause {
            namespace,
            name,
            owner,
            wait,
        } => {
            let args = action_args(namespace, name, owner, wait);
            workloads::pause(&backend, args, cli.format, cli.verbose).await?;
        }
        Commands::Resume {
            namespace,
            name,
            replicas,
            owner,
            wait,
        } => {
            let args = action_args(namespace, name, owner, wait);
            workloads::resume(&backend, args, replicas, cli.format, cli.verbose).await?;
        }
        Commands::Status { namespace, name } => {
            workloads::status(&backend, &namespace, &name, cli.format).await?;
        }
        Commands::Paused => {
            workloads::paused(&backend, cli.format).await?;
        }
        Commands::Get { resource, namespace } => {
            let namespace = settings.namespace(namespace);
            inventory::get(&backend, resource, namespace.as_deref(), cli.format).await?;
        }
        Commands::Health => {
            health::show(&backend, cli.format, cli.verbose).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
