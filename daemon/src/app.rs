//! Wires the store, façade, audit relay and RPC server together.

use std::sync::Arc;

use anyhow::{bail, Context};
use sacco_engine::{AuditRelay, ChainedAuditLog, GovernanceFacade, HttpAuditSink, OutboxSink};
use sacco_rpc::{router, RpcServer};
use sacco_store_lmdb::{check_data_dir, check_integrity, IntegrityReport, LmdbEnvironment};
use sacco_types::{Clock, SystemClock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{AuditConfig, DaemonConfig};
use crate::shutdown::{os_signal, Shutdown};

const MAX_DBS: u32 = 32;

/// Open the LMDB environment and refuse to continue if it is damaged.
pub fn open_store(config: &DaemonConfig) -> anyhow::Result<Arc<LmdbEnvironment>> {
    check_data_dir(&config.data_dir).map_err(anyhow::Error::msg)?;
    let store = LmdbEnvironment::open(&config.data_dir, MAX_DBS, config.map_size_bytes())
        .with_context(|| format!("opening store at {}", config.data_dir.display()))?;
    let report = check_integrity(&store)?;
    ensure_healthy(&report)?;
    info!(
        databases = report.databases_checked,
        entries = report.total_entries,
        path = %config.data_dir.display(),
        "store opened"
    );
    Ok(Arc::new(store))
}

fn ensure_healthy(report: &IntegrityReport) -> anyhow::Result<()> {
    if !report.is_healthy() {
        bail!("store integrity check failed: {}", report.errors.join("; "));
    }
    Ok(())
}

/// Run until SIGINT/SIGTERM or until the RPC server stops on its own.
pub async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    let store = open_store(&config)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let shutdown = Shutdown::new();

    // The façade only ever writes to the durable outbox; the relay forwards.
    let sink = OutboxSink::new(store.clone(), clock.clone());
    let facade = GovernanceFacade::new(store.clone(), sink, config.engine_config()).with_clock(clock);
    let relay = spawn_relay(&config.audit, store, shutdown.listener());

    let server = RpcServer::new(config.rpc_addr());
    let app = router(Arc::new(facade));
    let server_shutdown = shutdown.listener();
    let mut server_task = tokio::spawn(async move { server.serve(app, server_shutdown).await });

    let finished = tokio::select! {
        joined = &mut server_task => Some(joined),
        signal = os_signal() => {
            info!(signal, "shutting down");
            None
        }
    };
    shutdown.trigger();
    let served = match finished {
        Some(joined) => joined,
        None => server_task.await,
    };
    relay.await.context("audit relay task panicked")?;

    served.context("rpc server task panicked")??;
    info!("sacco daemon exited cleanly");
    Ok(())
}

/// Start the relay that drains the outbox into the store's audit chain and,
/// when an endpoint is configured, on to the remote audit service.
fn spawn_relay(
    audit: &AuditConfig,
    store: Arc<LmdbEnvironment>,
    shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    let chain = ChainedAuditLog::new(store.clone());
    match &audit.endpoint {
        Some(endpoint) => {
            let sink = HttpAuditSink::with_timeout(endpoint, audit.request_timeout());
            info!(url = sink.url(), "forwarding audit events to remote service");
            let relay = AuditRelay::new(store, sink, audit.relay_batch, audit.relay_interval())
                .with_local_chain();
            tokio::spawn(async move {
                relay.run(shutdown).await;
                report_chain(&chain);
            })
        }
        None => {
            info!("no audit endpoint configured; audit events stay in the local chain");
            let relay = AuditRelay::local(store, audit.relay_batch, audit.relay_interval());
            tokio::spawn(async move {
                relay.run(shutdown).await;
                report_chain(&chain);
            })
        }
    }
}

fn report_chain(chain: &ChainedAuditLog<LmdbEnvironment>) {
    match chain.verify() {
        Ok(checks) => {
            let broken = checks.iter().filter(|r| !r.is_valid()).count();
            if broken > 0 {
                warn!(records = checks.len(), broken, "audit chain failed verification");
            } else {
                info!(records = checks.len(), "audit chain verified");
            }
        }
        Err(e) => warn!(error = %e, "could not read the audit chain"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sacco_store::{AuditEvent, AuditSink, OutboxStore};
    use sacco_types::{Amount, GroupId, Timestamp, UserId};
    use std::time::Duration;

    fn config_in(dir: &std::path::Path) -> DaemonConfig {
        DaemonConfig {
            data_dir: dir.join("db"),
            map_size_mb: 16,
            ..DaemonConfig::default()
        }
    }

    #[test]
    fn opens_fresh_and_existing_stores() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        drop(open_store(&config).unwrap());
        assert!(config.data_dir.join("data.mdb").exists());
        open_store(&config).unwrap();
    }

    #[test]
    fn refuses_foreign_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::create_dir_all(&config.data_dir).unwrap();
        std::fs::write(config.data_dir.join("notes.txt"), "hello").unwrap();
        assert!(open_store(&config).is_err());
    }

    #[test]
    fn unhealthy_report_is_an_error() {
        let report = IntegrityReport {
            databases_checked: 14,
            total_entries: 0,
            errors: vec!["database 'loans' is missing".into()],
        };
        let err = ensure_healthy(&report).unwrap_err();
        assert!(err.to_string().contains("loans"));
    }

    #[tokio::test]
    async fn relay_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&config_in(dir.path())).unwrap();
        let shutdown = Shutdown::new();
        let handle = spawn_relay(&AuditConfig::default(), store, shutdown.listener());
        shutdown.trigger();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn relayed_events_survive_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let audit = AuditConfig {
            relay_interval_ms: 10,
            ..AuditConfig::default()
        };
        let event = AuditEvent::contribution(
            GroupId::generate(),
            UserId::new("ana"),
            Amount::new(2_500),
            "Contribution to group savings",
            Timestamp::new(1_700_000_000),
        );
        {
            let store = open_store(&config).unwrap();
            let sink = OutboxSink::new(store.clone(), Arc::new(SystemClock));
            sink.record(&event).await.unwrap();

            let shutdown = Shutdown::new();
            let handle = spawn_relay(&audit, store.clone(), shutdown.listener());
            for _ in 0..200 {
                if store.outbox_len().unwrap() == 0 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            shutdown.trigger();
            handle.await.unwrap();
            assert_eq!(store.outbox_len().unwrap(), 0);
        }

        let reopened = open_store(&config).unwrap();
        let chain = ChainedAuditLog::new(reopened);
        assert_eq!(chain.len().unwrap(), 1);
        assert!(chain.verify().unwrap().iter().all(|r| r.is_valid()));
        assert_eq!(chain.history(&event.group_id, &event.user_id).unwrap()[0].event, event);
    }
}
