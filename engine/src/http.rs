//! HTTP client that ships audit events to an external audit service.

use sacco_store::{AuditError, AuditEvent, AuditSink};
use std::future::Future;
use std::time::Duration;

/// Default timeout for a single audit POST.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Audit sink that `POST`s each event as JSON to `{endpoint}/events`.
///
/// Any 2xx answer counts as accepted. 4xx means the service refused the
/// event; anything else is treated as the service being unavailable.
pub struct HttpAuditSink {
    http_client: reqwest::Client,
    url: String,
}

impl HttpAuditSink {
    pub fn new(endpoint: &str) -> Self {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            url: format!("{}/events", endpoint.trim_end_matches('/')),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let response = self
            .http_client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AuditError::Timeout
                } else if e.is_connect() {
                    AuditError::Unavailable(format!("connection failed: {e}"))
                } else {
                    AuditError::Other(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status.is_client_error() {
            Err(AuditError::Rejected(format!("HTTP {status}")))
        } else {
            Err(AuditError::Unavailable(format!("HTTP {status}")))
        }
    }
}

impl AuditSink for HttpAuditSink {
    fn record(&self, event: &AuditEvent) -> impl Future<Output = Result<(), AuditError>> + Send {
        self.post(event)
    }
}
