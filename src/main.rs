use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::time::Duration;

mod commands;
mod constants;
mod engine;
mod integrations;
mod template;
mod utils;

use commands::template::ExportOptions;
use engine::ProvisionerSettings;
use integrations::providers::openstack::OpenStackCredentials;

#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Instance batch management commands
    Instance {
        #[command(subcommand)]
        command: InstanceCommands,
    },

    /// Tenant template export commands
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
}

#[derive(Subcommand, Debug)]
enum InstanceCommands {
    /// Create a batch of instances
    Create {
        /// Authenticate as a different user
        #[arg(long)]
        username: Option<String>,

        /// Operate on a different tenant
        #[arg(long)]
        tenant: Option<String>,

        /// Keypair assigned to the created instances
        #[arg(long, default_value = constants::DEFAULT_KEY_NAME)]
        key_name: String,

        /// Maximum number of concurrent provisioning workers
        #[arg(long, default_value_t = constants::DEFAULT_MAX_WORKERS)]
        max_workers: usize,

        /// Seconds between server status polls
        #[arg(long, default_value_t = constants::DEFAULT_POLL_INTERVAL.as_secs())]
        poll_interval: u64,

        /// Seconds before a stuck worker is abandoned
        #[arg(long, default_value_t = constants::DEFAULT_JOIN_TIMEOUT.as_secs())]
        join_timeout: u64,

        /// Maximum number of retry passes; unlimited when omitted
        #[arg(long)]
        retry_limit: Option<u32>,

        /// Sweep every non-ACTIVE server in the tenant, not just this batch's
        #[arg(long)]
        wide_sweep: bool,

        /// Skip confirmation prompt
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },

    /// Delete the instances attached to one network
    Delete {
        /// Authenticate as a different user
        #[arg(long)]
        username: Option<String>,

        /// Operate on a different tenant
        #[arg(long)]
        tenant: Option<String>,

        /// Skip confirmation prompt
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },

    /// Delete every instance in the tenant
    DeleteAll {
        /// Authenticate as a different user
        #[arg(long)]
        username: Option<String>,

        /// Operate on a different tenant
        #[arg(long)]
        tenant: Option<String>,

        /// Skip confirmation prompt
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum TemplateCommands {
    /// Export the tenant's non-orchestrated resources as a template
    Compute {
        /// Authenticate as a different user
        #[arg(long)]
        username: Option<String>,

        /// Operate on a different tenant
        #[arg(long)]
        tenant: Option<String>,

        /// Snapshot each server and boot the template from the snapshots
        #[arg(long)]
        snapshots: bool,

        /// Pin generated ports to their current fixed IPs
        #[arg(long)]
        static_ips: bool,
    },

    /// Re-export an existing stack's template
    Heat {
        /// Authenticate as a different user
        #[arg(long)]
        username: Option<String>,

        /// Operate on a different tenant
        #[arg(long)]
        tenant: Option<String>,
    },

    /// Export both the stack template and the compute template
    All {
        /// Authenticate as a different user
        #[arg(long)]
        username: Option<String>,

        /// Operate on a different tenant
        #[arg(long)]
        tenant: Option<String>,

        /// Snapshot each server and boot the template from the snapshots
        #[arg(long)]
        snapshots: bool,

        /// Pin generated ports to their current fixed IPs
        #[arg(long)]
        static_ips: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Read environment variables
    dotenvy::dotenv().ok();

    // Setup logging
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(constants::LOG_FILE)
        .expect("Failed to open log file");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Instance { command } => match command {
            InstanceCommands::Create {
                username,
                tenant,
                key_name,
                max_workers,
                poll_interval,
                join_timeout,
                retry_limit,
                wide_sweep,
                yes,
            } => {
                let credentials = OpenStackCredentials::load(username, tenant)?;
                let settings = ProvisionerSettings {
                    max_workers,
                    poll_interval: Duration::from_secs(poll_interval),
                    join_timeout: Duration::from_secs(join_timeout),
                    retry_limit,
                    wide_sweep,
                };
                commands::instance::create(&credentials, &key_name, settings, yes).await?;
            }
            InstanceCommands::Delete {
                username,
                tenant,
                yes,
            } => {
                let credentials = OpenStackCredentials::load(username, tenant)?;
                commands::instance::delete(&credentials, yes).await?;
            }
            InstanceCommands::DeleteAll {
                username,
                tenant,
                yes,
            } => {
                let credentials = OpenStackCredentials::load(username, tenant)?;
                commands::instance::delete_all(&credentials, yes).await?;
            }
        },
        Commands::Template { command } => match command {
            TemplateCommands::Compute {
                username,
                tenant,
                snapshots,
                static_ips,
            } => {
                let credentials = OpenStackCredentials::load(username, tenant)?;
                commands::template::compute(
                    &credentials,
                    ExportOptions {
                        snapshots,
                        static_ips,
                    },
                )
                .await?;
            }
            TemplateCommands::Heat { username, tenant } => {
                let credentials = OpenStackCredentials::load(username, tenant)?;
                commands::template::heat(&credentials).await?;
            }
            TemplateCommands::All {
                username,
                tenant,
                snapshots,
                static_ips,
            } => {
                let credentials = OpenStackCredentials::load(username, tenant)?;
                commands::template::all(
                    &credentials,
                    ExportOptions {
                        snapshots,
                        static_ips,
                    },
                )
                .await?;
            }
        },
    }

    Ok(())
}
