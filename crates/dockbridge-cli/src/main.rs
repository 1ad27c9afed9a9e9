//! Dockbridge CLI - expose a remote builder's Docker Engine on a local socket

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dockbridge_cli::config::{self, DockbridgeConfig};
use dockbridge_lib::{
    CancellationToken, DirectAgent, DirectAgentConfig, Inventory, InventoryProvisioner,
    RemoteSocket, RemoteSocketConfig, RunOutcome, DEFAULT_REMOTE_PORT,
};

/// Dockbridge - talk to a remote builder's Docker Engine through a local socket
#[derive(Parser, Debug)]
#[command(name = "dockbridge")]
#[command(about = "Expose a remote builder's Docker Engine on a local Unix socket", long_about = None)]
#[command(version = env!("DOCKBRIDGE_GIT_TAG"))]
#[command(long_version = concat!(env!("DOCKBRIDGE_GIT_TAG"), "\nCommit: ", env!("DOCKBRIDGE_GIT_HASH"), "\nBuilt: ", env!("DOCKBRIDGE_BUILD_TIME")))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// App whose remote builder should be exposed
    #[arg(short, long, env = "DOCKBRIDGE_APP")]
    app: Option<String>,

    /// Bind path for docker.sock (default: a fresh temporary directory)
    #[arg(short, long)]
    bind: Option<PathBuf>,

    /// Docker Engine port on the remote builder
    #[arg(long, default_value_t = DEFAULT_REMOTE_PORT)]
    remote_port: u16,

    /// Builder inventory file (default: ~/.dockbridge/inventory.yaml)
    #[arg(long, env = "DOCKBRIDGE_INVENTORY")]
    inventory: Option<PathBuf>,

    /// Organizations whose private network this host can reach (default: any)
    #[arg(long, env = "DOCKBRIDGE_ORGANIZATIONS", value_delimiter = ',')]
    organizations: Vec<String>,

    /// Timeout in seconds for each connection to the remote builder
    #[arg(long, default_value = "10")]
    connect_timeout: u64,

    /// Remote builder host that is already reachable; skips the tunnel
    #[arg(long, env = "DOCKBRIDGE_REMOTE_BUILDER_HOST")]
    remote_builder_host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage global CLI configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Set the default app
    SetApp {
        /// App name to store
        name: String,
    },
    /// Show the default app
    GetApp,
    /// Clear the default app
    ClearApp,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Config { ref command }) => handle_config_command(command),
        None => run_remote(cli).await,
    }
}

async fn run_remote(cli: Cli) -> Result<()> {
    let stored = stored_config(&cli, config::ConfigManager::load)?;
    let remote_config = build_remote_config(&cli, &stored);

    let provisioner = if remote_config.remote_builder_host.is_some() {
        // Nothing will be resolved; do not require an inventory
        InventoryProvisioner::new(Inventory::default())
    } else {
        let path = stored.resolve_inventory(cli.inventory.clone())?;
        debug!("Loading builder inventory from {:?}", path);
        InventoryProvisioner::from_file(&path).context("Failed to load builder inventory")?
    };

    let agent = DirectAgent::new(DirectAgentConfig {
        connect_timeout: Duration::from_secs(cli.connect_timeout),
        organizations: cli.organizations.clone(),
    });

    let remote = RemoteSocket::new(remote_config, Arc::new(provisioner), Arc::new(agent))
        .on_ready(|ready| {
            println!("Docker Engine @ {}", ready.docker_host);
        });

    let shutdown = CancellationToken::new();
    let ctrl_c_token = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down remote builder socket...");
        ctrl_c_token.cancel();
    });

    match remote.run(shutdown).await? {
        RunOutcome::Bypassed { remote_host } => {
            println!(
                "Using remote builder host {}; no tunnel started",
                remote_host
            );
        }
        RunOutcome::Served { docker_host } => {
            info!("Closed {}", docker_host);
        }
        RunOutcome::Cancelled => {
            info!("Cancelled before the socket was ready");
        }
    }

    Ok(())
}

/// Non-empty `--remote-builder-host`
fn remote_builder_host(cli: &Cli) -> Option<String> {
    cli.remote_builder_host
        .clone()
        .filter(|host| !host.is_empty())
}

/// Stored config, skipped entirely when the builder host is overridden
fn stored_config<F>(cli: &Cli, load: F) -> Result<DockbridgeConfig>
where
    F: FnOnce() -> Result<DockbridgeConfig>,
{
    if remote_builder_host(cli).is_some() {
        return Ok(DockbridgeConfig::default());
    }
    load()
}

fn build_remote_config(cli: &Cli, stored: &DockbridgeConfig) -> RemoteSocketConfig {
    let app_name = stored.resolve_app_name(cli.app.clone()).unwrap_or_default();

    let mut config = RemoteSocketConfig::new(app_name)
        .with_remote_port(cli.remote_port)
        .with_remote_builder_host(remote_builder_host(cli));
    if let Some(bind) = &cli.bind {
        config = config.with_bind_path(bind);
    }
    config
}

fn handle_config_command(command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::SetApp { name } => {
            config::ConfigManager::set_app(name.clone())?;
            println!("Default app set to {}", name);
            println!("   Stored in: ~/.dockbridge/config.json");
            Ok(())
        }
        ConfigCommands::GetApp => match config::ConfigManager::get_app()? {
            Some(name) => {
                println!("{}", name);
                Ok(())
            }
            None => {
                println!("No default app configured");
                println!();
                println!("Set one with:");
                println!("   dockbridge config set-app <NAME>");
                Ok(())
            }
        },
        ConfigCommands::ClearApp => {
            config::ConfigManager::clear_app()?;
            println!("Default app cleared");
            Ok(())
        }
    }
}

fn init_logging(log_level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))
        .context("Failed to initialize logging filter")?;

    // stdout carries the endpoint line, so logs go to stderr
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}
