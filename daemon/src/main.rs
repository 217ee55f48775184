use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use sshsync::{Credential, RemotePlatform, SshExecutor, SyncEngine};

mod config;
mod daemon;
mod telemetry;
mod watcher;

use config::DaemonConfig;
use daemon::SyncDaemon;

#[derive(Parser)]
#[command(name = "sshsync")]
#[command(about = "Mirror a local project tree onto a remote host over ssh/scp")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (default: sshsync.toml next to the executable)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level, overriding the configuration file
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload the tree once, then mirror changes until Ctrl+C
    Start {
        /// Local tree to mirror
        #[arg(long)]
        local_root: Option<PathBuf>,

        /// Skip the initial upload and only mirror live changes
        #[arg(long)]
        no_initial_sync: bool,

        /// Authenticate with ssh keys or an agent instead of a password
        #[arg(long)]
        key_auth: bool,

        /// Remote platform (linux, macos, windows)
        #[arg(long)]
        platform: Option<RemotePlatform>,

        /// Remote host
        #[arg(long)]
        host: Option<String>,

        /// Remote ssh port
        #[arg(long)]
        port: Option<u16>,

        /// Remote user name
        #[arg(long)]
        username: Option<String>,
    },
    /// Inspect or create configuration files
    Config {
        #[command(subcommand)]
        action: ConfigActions,
    },
}

#[derive(Subcommand)]
enum ConfigActions {
    /// Validate configuration file
    Validate,
    /// Show current configuration
    Show,
    /// Generate default configuration
    Generate {
        /// Output path for configuration
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            local_root,
            no_initial_sync,
            key_auth,
            platform,
            host,
            port,
            username,
        } => {
            let mut config = load_config(cli.config.as_deref()).await?;
            if let Some(level) = cli.log_level {
                config.daemon.log_level = level;
            }
            if let Some(root) = local_root {
                config.daemon.local_root = Some(root);
            }
            if let Some(platform) = platform {
                config.remote.platform = platform;
            }
            if let Some(host) = host {
                config.remote.host = host;
            }
            if let Some(port) = port {
                config.remote.port = port;
            }
            if let Some(username) = username {
                config.remote.username = username;
            }
            config.daemon.initial_sync &= !no_initial_sync;
            config.daemon.key_auth |= key_auth;

            let _guard = telemetry::init_logging(
                &config.daemon.log_level,
                config.daemon.log_file.as_deref(),
            )?;

            if let Err(e) = config.validate() {
                error!("Invalid configuration: {:#}", e);
                return Err(e);
            }

            run(config).await
        }
        Commands::Config { action } => {
            let _guard = telemetry::init_logging(cli.log_level.as_deref().unwrap_or("info"), None)?;
            let path = cli.config.unwrap_or_else(config::default_config_path);
            match action {
                ConfigActions::Validate => validate_config(&path).await,
                ConfigActions::Show => show_config(&path).await,
                ConfigActions::Generate { output } => generate_config(output.as_deref()).await,
            }
        }
    }
}

/// Read the configuration file, falling back to defaults when the implicit
/// file is absent
async fn load_config(explicit: Option<&Path>) -> Result<DaemonConfig> {
    match explicit {
        Some(path) => DaemonConfig::load(path).await,
        None => {
            let path = config::default_config_path();
            if path.exists() {
                DaemonConfig::load(&path).await
            } else {
                Ok(DaemonConfig::default())
            }
        }
    }
}

async fn run(config: DaemonConfig) -> Result<()> {
    let local_root = match &config.daemon.local_root {
        Some(root) => root.clone(),
        None => config::executable_dir()?,
    };
    let local_root = local_root
        .canonicalize()
        .with_context(|| format!("resolving local root {}", local_root.display()))?;

    let credential = if config.daemon.key_auth {
        Credential::KeyBased
    } else {
        let prompt = format!("{}@{}'s password: ", config.remote.username, config.remote.host);
        Credential::Password(rpassword::prompt_password(prompt).context("reading password")?)
    };

    let executor = Arc::new(SshExecutor::new(&config.remote, credential, config.transfer.timeout));
    let engine = SyncEngine::new(config.sync_config(), local_root, executor)?;

    info!("Starting sshsync");
    SyncDaemon::new(engine, config.daemon).run().await?;
    Ok(())
}

async fn validate_config(path: &Path) -> Result<()> {
    info!("Validating configuration at {}", path.display());

    match DaemonConfig::load(path).await.and_then(|config| {
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!(
                "Remote: {}@{}:{} ({})",
                config.remote.username,
                config.remote.host,
                config.remote.port,
                config.remote.platform
            );
            println!("Remote root: {}", config.sync_config().remote_root());
            Ok(())
        }
        Err(e) => {
            println!("✗ Configuration validation failed: {:#}", e);
            Err(e)
        }
    }
}

async fn show_config(path: &Path) -> Result<()> {
    match DaemonConfig::load(path).await {
        Ok(config) => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Err(e) => {
            println!("Failed to load configuration: {:#}", e);
            Err(e)
        }
    }
}

async fn generate_config(output_path: Option<&Path>) -> Result<()> {
    let config = DaemonConfig::default();

    if let Some(path) = output_path {
        config.save(path).await?;
        println!("Configuration generated at {}", path.display());
    } else {
        println!("{}", toml::to_string_pretty(&config)?);
    }

    Ok(())
}
