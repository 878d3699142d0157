//! Stop signal shared by the RPC server and the audit relay.

use tokio::signal;
use tokio::sync::broadcast;

/// Fans one stop request out to every task holding a listener.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn listener(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        // No listeners left means every task already stopped.
        let _ = self.tx.send(());
    }
}

/// Resolves on the first SIGINT or SIGTERM and names it.
pub async fn os_signal() -> &'static str {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = signal::ctrl_c() => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_reaches_server_and_relay() {
        let shutdown = Shutdown::new();
        let mut server = shutdown.listener();
        let mut relay = shutdown.listener();
        shutdown.trigger();
        assert!(server.recv().await.is_ok());
        assert!(relay.recv().await.is_ok());
    }

    #[test]
    fn trigger_after_tasks_exit_is_harmless() {
        let shutdown = Shutdown::new();
        drop(shutdown.listener());
        shutdown.trigger();
    }
}
