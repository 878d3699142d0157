//! Durable audit delivery through a store-backed outbox.
//!
//! [`OutboxSink`] is an [`AuditSink`] that only appends to the store's outbox
//! table, so an accepted event survives a crash or an audit outage. A
//! background [`AuditRelay`] drains undelivered entries, in order, into the
//! local hash chain and on to the remote sink when there is one, and retries
//! failures on its next pass. Delivered entries leave the outbox.

use crate::chain::ChainedAuditLog;
use sacco_store::{AuditError, AuditEvent, AuditSink, ChainStore, OutboxEntry, OutboxStore, StoreError};
use sacco_types::Clock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub struct OutboxSink<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: OutboxStore + Send + Sync> OutboxSink<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

impl<S: OutboxStore + Send + Sync> AuditSink for OutboxSink<S> {
    fn record(&self, event: &AuditEvent) -> impl Future<Output = Result<(), AuditError>> + Send {
        let result = self
            .store
            .append_outbox(event, self.clock.now())
            .map(|seq| debug!(seq, kind = event.kind_name(), "audit event queued"))
            .map_err(|e| AuditError::Unavailable(e.to_string()));
        async move { result }
    }
}

/// Outcome of one relay pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct AuditRelay<S, A> {
    store: Arc<S>,
    chain: Option<ChainedAuditLog<S>>,
    sink: Option<A>,
    batch: usize,
    interval: Duration,
}

impl<S> AuditRelay<S, ChainedAuditLog<S>>
where
    S: OutboxStore + ChainStore + Send + Sync,
{
    /// Relay into the store's own hash chain only.
    pub fn local(store: Arc<S>, batch: usize, interval: Duration) -> Self {
        Self {
            chain: Some(ChainedAuditLog::new(store.clone())),
            store,
            sink: None,
            batch: batch.max(1),
            interval,
        }
    }
}

impl<S, A> AuditRelay<S, A>
where
    S: OutboxStore + ChainStore + Send + Sync,
    A: AuditSink,
{
    /// Relay to `sink` only.
    pub fn new(store: Arc<S>, sink: A, batch: usize, interval: Duration) -> Self {
        Self {
            store,
            chain: None,
            sink: Some(sink),
            batch: batch.max(1),
            interval,
        }
    }

    /// Also chain every entry locally, keyed by its outbox sequence number,
    /// before it is forwarded.
    pub fn with_local_chain(mut self) -> Self {
        self.chain = Some(ChainedAuditLog::new(self.store.clone()));
        self
    }

    async fn deliver(&self, entry: &OutboxEntry) -> Result<(), AuditError> {
        if let Some(chain) = &self.chain {
            chain.append_at(Some(entry.seq), &entry.event)?;
        }
        match &self.sink {
            Some(sink) => sink.record(&entry.event).await,
            None => Ok(()),
        }
    }

    /// Deliver up to one batch of pending entries.
    ///
    /// Stops at the first failure so the downstream sink sees events in
    /// enqueue order.
    pub async fn drain_once(&self) -> Result<RelayReport, StoreError> {
        let mut report = RelayReport::default();
        for entry in self.store.pending_outbox(self.batch)? {
            match self.deliver(&entry).await {
                Ok(()) => {
                    self.store.mark_outbox_delivered(entry.seq)?;
                    report.delivered += 1;
                }
                Err(e) => {
                    self.store.record_outbox_failure(entry.seq, &e.to_string())?;
                    warn!(
                        seq = entry.seq,
                        attempts = entry.attempts + 1,
                        error = %e,
                        "audit relay delivery failed; will retry"
                    );
                    report.failed += 1;
                    break;
                }
            }
        }
        Ok(report)
    }

    /// Drain on a fixed interval until shutdown is signalled.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(interval_ms = self.interval.as_millis() as u64, batch = self.batch, "audit relay started");
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("audit relay shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.drain_once().await {
                        Ok(report) if report.delivered > 0 => {
                            debug!(delivered = report.delivered, failed = report.failed, "audit relay pass");
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "audit relay could not read the outbox"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sacco_nullables::{NullAuditSink, NullClock, NullStore, SinkMode};
    use sacco_types::{Amount, GroupId, Timestamp, UserId};

    fn event(minor: u64) -> AuditEvent {
        AuditEvent::contribution(
            GroupId::generate(),
            UserId::new("u"),
            Amount::new(minor),
            "",
            Timestamp::new(1),
        )
    }

    #[tokio::test]
    async fn queued_events_are_relayed_in_order() {
        let store = Arc::new(NullStore::new());
        let outbox = OutboxSink::new(store.clone(), Arc::new(NullClock::default()));
        for minor in [1, 2, 3] {
            outbox.record(&event(minor)).await.unwrap();
        }

        let downstream = Arc::new(NullAuditSink::new());
        let relay = AuditRelay::new(store.clone(), downstream.clone(), 10, Duration::from_secs(1));
        let report = relay.drain_once().await.unwrap();
        assert_eq!(report, RelayReport { delivered: 3, failed: 0 });

        let delivered: Vec<_> = downstream.events().into_iter().map(|e| e.kind).collect();
        assert_eq!(delivered, vec![event(1).kind, event(2).kind, event(3).kind]);
        assert!(store.pending_outbox(10).unwrap().is_empty());
        assert_eq!(store.outbox_len().unwrap(), 0);
    }

    #[tokio::test]
    async fn failure_stops_the_pass_and_is_retried() {
        let store = Arc::new(NullStore::new());
        let outbox = OutboxSink::new(store.clone(), Arc::new(NullClock::default()));
        outbox.record(&event(1)).await.unwrap();
        outbox.record(&event(2)).await.unwrap();

        let downstream = Arc::new(NullAuditSink::with_mode(SinkMode::Fail));
        let relay = AuditRelay::new(store.clone(), downstream.clone(), 10, Duration::from_secs(1));
        let report = relay.drain_once().await.unwrap();
        assert_eq!(report, RelayReport { delivered: 0, failed: 1 });
        assert_eq!(downstream.attempts(), 1);

        let pending = store.pending_outbox(10).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].attempts, 1);
        assert!(pending[0].last_error.is_some());

        downstream.set_mode(SinkMode::Succeed);
        let report = relay.drain_once().await.unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(store.outbox_len().unwrap(), 0);
    }

    #[tokio::test]
    async fn local_relay_chains_entries_and_empties_the_outbox() {
        let store = Arc::new(NullStore::new());
        let outbox = OutboxSink::new(store.clone(), Arc::new(NullClock::default()));
        for minor in [1, 2] {
            outbox.record(&event(minor)).await.unwrap();
        }

        let relay = AuditRelay::local(store.clone(), 10, Duration::from_secs(1));
        assert_eq!(relay.drain_once().await.unwrap().delivered, 2);
        assert_eq!(store.outbox_len().unwrap(), 0);

        let chain = ChainedAuditLog::new(store.clone());
        assert_eq!(chain.len().unwrap(), 2);
        assert!(chain.verify().unwrap().iter().all(|r| r.is_valid()));
    }

    #[tokio::test]
    async fn retried_entry_is_chained_once() {
        let store = Arc::new(NullStore::new());
        let outbox = OutboxSink::new(store.clone(), Arc::new(NullClock::default()));
        outbox.record(&event(1)).await.unwrap();

        let downstream = Arc::new(NullAuditSink::with_mode(SinkMode::Fail));
        let relay = AuditRelay::new(store.clone(), downstream.clone(), 10, Duration::from_secs(1))
            .with_local_chain();
        assert_eq!(relay.drain_once().await.unwrap().failed, 1);
        assert_eq!(store.chain_len().unwrap(), 1);

        downstream.set_mode(SinkMode::Succeed);
        assert_eq!(relay.drain_once().await.unwrap().delivered, 1);
        assert_eq!(store.chain_len().unwrap(), 1);
        assert_eq!(downstream.events().len(), 1);
    }

    #[tokio::test]
    async fn outbox_unavailable_is_an_audit_error() {
        let store = Arc::new(NullStore::new());
        store.set_failing(true);
        let outbox = OutboxSink::new(store, Arc::new(NullClock::default()));
        assert!(matches!(
            outbox.record(&event(1)).await,
            Err(AuditError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn run_exits_on_shutdown() {
        let store = Arc::new(NullStore::new());
        let relay = AuditRelay::new(
            store,
            Arc::new(NullAuditSink::new()),
            10,
            Duration::from_millis(10),
        );
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(relay.run(rx));
        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
