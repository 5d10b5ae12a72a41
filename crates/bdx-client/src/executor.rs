//! # Request execution
//!
//! The engine never talks HTTP directly; it hands a query URL to a
//! [`RequestExecutor`] and gets the raw response bytes back. The default
//! executor is a thin reqwest wrapper; deployments with special transport
//! needs (proxies, mutual TLS, recording) plug in their own.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::error::ConfigurationError;

/// Errors executing a publisher query.
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// The request failed: transport error or a non-success status.
    #[error("connection to {url} failed: {reason}")]
    Connection { url: Url, reason: String },

    /// The query URL uses a protocol the executor does not speak.
    #[error("unsupported protocol \"{scheme}\" in publisher URL {url}")]
    UnsupportedProtocol { scheme: String, url: Url },
}

/// Executes publisher queries.
///
/// Implementations must be safe for concurrent use; one executor instance
/// is shared by every resolution call.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Fetch the response body for `url`.
    async fn execute(&self, url: &Url) -> Result<Bytes, ExecutorError>;
}

/// The default executor: a GET over `http`/`https` with a per-request
/// timeout, treating any non-success status as a connection failure.
#[derive(Debug, Clone)]
pub struct DefaultRequestExecutor {
    http: reqwest::Client,
}

impl DefaultRequestExecutor {
    /// An executor with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::HttpClient`] when the underlying HTTP client
    /// cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self, ConfigurationError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigurationError::HttpClient(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl RequestExecutor for DefaultRequestExecutor {
    async fn execute(&self, url: &Url) -> Result<Bytes, ExecutorError> {
        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(ExecutorError::UnsupportedProtocol {
                    scheme: scheme.to_string(),
                    url: url.clone(),
                })
            }
        }
        debug!(%url, "executing publisher query");
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ExecutorError::Connection {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExecutorError::Connection {
                url: url.clone(),
                reason: format!("publisher returned status {status}"),
            });
        }
        response.bytes().await.map_err(|e| ExecutorError::Connection {
            url: url.clone(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_http_schemes() {
        let executor = DefaultRequestExecutor::new(Duration::from_secs(1)).unwrap();
        let url = Url::parse("ftp://smp.example.org/a/services/b").unwrap();
        match executor.execute(&url).await {
            Err(ExecutorError::UnsupportedProtocol { scheme, .. }) => assert_eq!(scheme, "ftp"),
            other => panic!("expected UnsupportedProtocol, got: {other:?}"),
        }
    }
}
