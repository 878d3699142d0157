//! SACCO daemon: entry point for running the governance engine.

mod app;
mod config;
mod logging;
mod shutdown;

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::config::DaemonConfig;
use crate::logging::{init_logging, LogFormat};

#[derive(Parser)]
#[command(name = "sacco-daemon", about = "Cooperative savings and credit governance daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "SACCO_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the LMDB store.
    #[arg(long, env = "SACCO_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Address the RPC server binds to.
    #[arg(long, env = "SACCO_RPC_BIND")]
    rpc_bind: Option<IpAddr>,

    /// RPC server port.
    #[arg(long, env = "SACCO_RPC_PORT")]
    rpc_port: Option<u16>,

    /// Base URL of the audit service.
    #[arg(long, env = "SACCO_AUDIT_ENDPOINT")]
    audit_endpoint: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "SACCO_LOG_FORMAT")]
    log_format: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "SACCO_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Serve the RPC API and relay audit events.
    Run,
    /// Open the store, run the integrity check, and exit.
    Check,
    /// Print the effective configuration as TOML.
    Config,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<(DaemonConfig, Command)> {
        let mut config = match &self.config {
            Some(path) => DaemonConfig::from_toml_file(path)?,
            None => DaemonConfig::default(),
        };
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(bind) = self.rpc_bind {
            config.rpc_bind = bind;
        }
        if let Some(port) = self.rpc_port {
            config.rpc_port = port;
        }
        if let Some(endpoint) = self.audit_endpoint {
            config.audit.endpoint = Some(endpoint);
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        Ok((config, self.command))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, command) = Cli::parse().into_config()?;
    let format: LogFormat = config.log_format.parse().map_err(anyhow::Error::msg)?;
    init_logging(format, &config.log_level)?;

    match command {
        Command::Run => {
            tracing::info!(
                rpc = %config.rpc_addr(),
                data_dir = %config.data_dir.display(),
                max_members = config.governance.max_members,
                "starting sacco daemon"
            );
            app::run(config).await?;
        }
        Command::Check => {
            app::open_store(&config)?;
            tracing::info!("store is healthy");
        }
        Command::Config => {
            println!("{}", config.to_toml_string()?);
        }
    }
    Ok(())
}
