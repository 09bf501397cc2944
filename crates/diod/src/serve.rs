//! Serve mode — the whole control plane in one process.
//!
//! 1. Opens the worker registry and seeds the scheduler from it
//! 2. Starts the health monitor and autoscaler loops
//! 3. Serves the control-plane API until Ctrl-C
//! 4. Stops both loops through the shared shutdown channel

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use dio_api::ApiState;
use dio_autoscale::{Autoscaler, DockerProvisioner, SpawnLedger};
use dio_health::{EvictionCallback, HealthMonitor};
use dio_registry::{WorkerRecord, WorkerRegistry};
use dio_scheduler::Scheduler;
use dio_worker::HttpWorkerClient;

use crate::config::DaemonConfig;

pub async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    info!("DIO control plane starting");

    // ── Registry + scheduler ─────────────────────────────────────
    if let Some(parent) = config.registry_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let registry = WorkerRegistry::open(&config.registry_path)?;
    info!(path = ?config.registry_path, "worker registry opened");

    let scheduler = Arc::new(Scheduler::new());
    let live = scheduler.refresh_from(&registry)?;
    info!(live, "scheduler seeded from registry");

    let client = HttpWorkerClient::new();
    let ledger = SpawnLedger::new(config.spawn_timeout);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Health monitor ───────────────────────────────────────────
    let on_evict = refresh_on_evict(registry.clone(), scheduler.clone());
    let monitor = HealthMonitor::new(registry.clone(), client.clone())
        .with_probe_timeout(config.probe_timeout)
        .with_eviction_threshold(config.eviction_threshold)
        .with_eviction_callback(on_evict);

    let health_interval = config.health_interval;
    let health_shutdown = shutdown_rx.clone();
    let health_handle = tokio::spawn(async move {
        monitor.run(health_interval, health_shutdown).await;
    });

    // ── Autoscaler ───────────────────────────────────────────────
    let mut provisioner = DockerProvisioner::new().with_binary(&config.container_runtime);
    if let Some(network) = &config.worker_network {
        provisioner = provisioner.with_network(network);
    }
    if let Some(manager_addr) = &config.manager_addr {
        provisioner = provisioner.with_env("DIO_MANAGER_ADDR", manager_addr);
    }
    let autoscaler = Autoscaler::new(scheduler.clone(), provisioner, &config.worker_image)
        .with_ledger(ledger.clone());

    let autoscale_interval = config.autoscale_interval;
    let autoscale_threshold = config.autoscale_threshold;
    let autoscale_shutdown = shutdown_rx.clone();
    let autoscale_handle = tokio::spawn(async move {
        autoscaler
            .run(autoscale_interval, autoscale_threshold, autoscale_shutdown)
            .await;
    });

    // ── API server ───────────────────────────────────────────────
    let state = ApiState::new(registry, scheduler, client)
        .with_ledger(ledger)
        .with_dispatch_timeout(config.dispatch_timeout);
    let router = dio_api::build_router(state);

    info!(addr = %config.listen_addr, "API server starting");
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // The registry's last handles go away with the loops.
    let _ = health_handle.await;
    let _ = autoscale_handle.await;

    info!("DIO control plane stopped");
    Ok(())
}

/// Rebuild the scheduler as soon as a worker is evicted.
fn refresh_on_evict(registry: WorkerRegistry, scheduler: Arc<Scheduler>) -> EvictionCallback {
    Arc::new(move |worker: WorkerRecord| {
        let registry = registry.clone();
        let scheduler = scheduler.clone();
        Box::pin(async move {
            match scheduler.refresh_from(&registry) {
                Ok(live) => info!(worker_id = %worker.worker_id, live, "scheduler refreshed after eviction"),
                Err(e) => warn!(worker_id = %worker.worker_id, error = %e, "scheduler refresh after eviction failed"),
            }
        })
    })
}
