//! Axum-based RPC server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use sacco_engine::GovernanceFacade;
use sacco_store::{AuditSink, SaccoStore};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

use crate::error::RpcError;
use crate::handlers;

/// Build the API router over a shared façade.
pub fn router<S, A>(facade: Arc<GovernanceFacade<S, A>>) -> Router
where
    S: SaccoStore + 'static,
    A: AuditSink + 'static,
{
    let api = Router::new()
        // Groups
        .route("/groups/create", post(handlers::create_group::<S, A>))
        .route("/groups/list", post(handlers::list_groups::<S, A>))
        .route("/groups/get", post(handlers::get_group::<S, A>))
        .route("/groups/mine", post(handlers::my_groups::<S, A>))
        // Membership
        .route("/members/join", post(handlers::request_join::<S, A>))
        .route("/members/vote", post(handlers::cast_vote::<S, A>))
        .route("/members/pending", post(handlers::list_pending::<S, A>))
        .route("/members/approved", post(handlers::list_approved::<S, A>))
        .route("/members/privacy", post(handlers::set_privacy::<S, A>))
        // Savings
        .route(
            "/contributions/record",
            post(handlers::record_contribution::<S, A>),
        )
        .route(
            "/contributions/list",
            post(handlers::list_contributions::<S, A>),
        )
        // Loans
        .route("/loans/request", post(handlers::request_loan::<S, A>))
        .route("/loans/repay", post(handlers::record_repayment::<S, A>))
        .route("/loans/list", post(handlers::list_loans::<S, A>))
        .route("/dashboard", post(handlers::dashboard::<S, A>))
        // Audit trail
        .route("/audit/trail", post(handlers::audit_trail::<S, A>))
        .route("/audit/history", post(handlers::audit_history::<S, A>))
        .route("/audit/stats", post(handlers::audit_stats::<S, A>))
        .route("/audit/voting", post(handlers::voting_analytics::<S, A>))
        .route("/audit/financial", post(handlers::financial_analytics::<S, A>));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/v1", api)
        .with_state(facade)
}

pub struct RpcServer {
    pub addr: SocketAddr,
}

impl RpcServer {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Bind and serve `app` until `shutdown` fires.
    pub async fn serve(
        &self,
        app: Router,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), RpcError> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| RpcError::Server(format!("bind {}: {e}", self.addr)))?;
        let local = listener
            .local_addr()
            .map_err(|e| RpcError::Server(e.to_string()))?;
        info!(addr = %local, "rpc server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await
            .map_err(|e| RpcError::Server(e.to_string()))?;
        info!("rpc server stopped");
        Ok(())
    }
}
