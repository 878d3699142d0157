//! Best-effort delivery of audit events.
//!
//! A failed or slow audit write must never change the outcome of the
//! operation that produced it. Every call is bounded by a timeout and every
//! failure is logged and swallowed here.

use sacco_store::{AuditError, AuditEvent, AuditSink};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{trace, warn};

pub struct AuditDispatcher<A> {
    sink: A,
    timeout: Duration,
}

impl<A: AuditSink> AuditDispatcher<A> {
    pub fn new(sink: A, timeout: Duration) -> Self {
        Self { sink, timeout }
    }

    pub fn sink(&self) -> &A {
        &self.sink
    }

    /// Hand `event` to the sink. Returns whether it was accepted, for logging only.
    pub async fn emit(&self, event: AuditEvent) -> bool {
        let result = match timeout(self.timeout, self.sink.record(&event)).await {
            Ok(result) => result,
            Err(_) => Err(AuditError::Timeout),
        };
        match result {
            Ok(()) => {
                trace!(kind = event.kind_name(), group = %event.group_id, "audit event recorded");
                true
            }
            Err(e) => {
                warn!(
                    kind = event.kind_name(),
                    group = %event.group_id,
                    user = %event.user_id,
                    error = %e,
                    "audit write failed; continuing"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sacco_nullables::{NullAuditSink, SinkMode};
    use sacco_types::{Amount, GroupId, Timestamp, UserId};
    use std::sync::Arc;

    fn event() -> AuditEvent {
        AuditEvent::contribution(
            GroupId::generate(),
            UserId::new("u-1"),
            Amount::new(100),
            "note",
            Timestamp::new(1),
        )
    }

    #[tokio::test]
    async fn accepted_event_reaches_sink() {
        let sink = Arc::new(NullAuditSink::new());
        let dispatcher = AuditDispatcher::new(sink.clone(), Duration::from_millis(50));
        assert!(dispatcher.emit(event()).await);
        assert_eq!(sink.events().len(), 1);
    }

    #[tokio::test]
    async fn failure_is_swallowed() {
        let sink = Arc::new(NullAuditSink::with_mode(SinkMode::Fail));
        let dispatcher = AuditDispatcher::new(sink.clone(), Duration::from_millis(50));
        assert!(!dispatcher.emit(event()).await);
        assert_eq!(sink.attempts(), 1);
    }

    #[tokio::test]
    async fn hang_is_cut_off_by_timeout() {
        let sink = Arc::new(NullAuditSink::with_mode(SinkMode::Hang));
        let dispatcher = AuditDispatcher::new(sink.clone(), Duration::from_millis(50));
        assert!(!dispatcher.emit(event()).await);
        assert!(sink.events().is_empty());
    }
}
