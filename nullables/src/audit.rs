//! Nullable audit sink: record events instead of shipping them.

use sacco_store::{AuditError, AuditEvent, AuditSink};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// How the null sink answers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkMode {
    /// Accept and record every event.
    Succeed,
    /// Reject every event with [`AuditError::Unavailable`].
    Fail,
    /// Never complete; exercises the caller's timeout.
    Hang,
}

/// A test audit sink with a switchable failure mode.
pub struct NullAuditSink {
    mode: Mutex<SinkMode>,
    events: Mutex<Vec<AuditEvent>>,
    attempts: AtomicUsize,
}

impl NullAuditSink {
    pub fn new() -> Self {
        Self::with_mode(SinkMode::Succeed)
    }

    pub fn with_mode(mode: SinkMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            events: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn set_mode(&self, mode: SinkMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// Events accepted so far, in arrival order.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Every call to `record`, accepted or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for NullAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for NullAuditSink {
    fn record(&self, event: &AuditEvent) -> impl Future<Output = Result<(), AuditError>> + Send {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let mode = *self.mode.lock().unwrap();
        let event = event.clone();
        async move {
            match mode {
                SinkMode::Succeed => {
                    self.events.lock().unwrap().push(event);
                    Ok(())
                }
                SinkMode::Fail => Err(AuditError::Unavailable(
                    "null sink configured to fail".to_string(),
                )),
                SinkMode::Hang => std::future::pending().await,
            }
        }
    }
}
