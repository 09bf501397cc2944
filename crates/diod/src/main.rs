//! diod — the DIO control-plane daemon.
//!
//! Single binary that assembles the control plane:
//! - Worker registry (redb)
//! - Round-robin scheduler
//! - Health monitor (probing + eviction)
//! - Autoscaler (Docker-provisioned workers)
//! - Registration / inference API (axum)
//!
//! # Usage
//!
//! ```text
//! diod serve --config dio.toml --listen-addr 0.0.0.0:50051
//! ```

mod config;
mod serve;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigLayer, DaemonConfig};

#[derive(Parser)]
#[command(name = "diod", about = "DIO inference control plane")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the control plane (registry, loops, and API in one process).
    Serve(ServeArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// TOML config file. Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address the API listens on.
    #[arg(long)]
    listen_addr: Option<String>,

    /// Path of the redb registry file.
    #[arg(long)]
    registry_path: Option<PathBuf>,

    /// Health probe interval (e.g. 30s).
    #[arg(long)]
    health_interval: Option<String>,

    /// Per-probe deadline (e.g. 2s).
    #[arg(long)]
    probe_timeout: Option<String>,

    /// Consecutive failed probes before eviction (0 disables).
    #[arg(long)]
    eviction_threshold: Option<u32>,

    /// Autoscaler check interval (e.g. 15s).
    #[arg(long)]
    autoscale_interval: Option<String>,

    /// Minimum number of live workers.
    #[arg(long)]
    autoscale_threshold: Option<usize>,

    /// Image spawned workers run.
    #[arg(long)]
    worker_image: Option<String>,

    /// How long a requested spawn counts as pending (e.g. 2m).
    #[arg(long)]
    spawn_timeout: Option<String>,

    /// Deadline for a forwarded inference request (e.g. 30s).
    #[arg(long)]
    dispatch_timeout: Option<String>,

    /// Docker-compatible CLI used to start workers.
    #[arg(long)]
    container_runtime: Option<String>,

    /// Docker network spawned workers join.
    #[arg(long)]
    worker_network: Option<String>,

    /// Address spawned workers register with.
    #[arg(long)]
    manager_addr: Option<String>,
}

impl ServeArgs {
    fn into_config(self) -> anyhow::Result<DaemonConfig> {
        let file = match &self.config {
            Some(path) => ConfigLayer::from_file(path)?,
            None => ConfigLayer::default(),
        };
        let flags = ConfigLayer {
            listen_addr: self.listen_addr,
            registry_path: self.registry_path,
            health_interval: self.health_interval,
            probe_timeout: self.probe_timeout,
            eviction_threshold: self.eviction_threshold,
            autoscale_interval: self.autoscale_interval,
            autoscale_threshold: self.autoscale_threshold,
            worker_image: self.worker_image,
            spawn_timeout: self.spawn_timeout,
            dispatch_timeout: self.dispatch_timeout,
            container_runtime: self.container_runtime,
            worker_network: self.worker_network,
            manager_addr: self.manager_addr,
        };
        Ok(DaemonConfig::resolve(file.merge(flags))?)
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,diod=debug,dio=debug"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve(args) => {
            let config = args.into_config()?;
            serve::run(config).await
        }
    }
}
