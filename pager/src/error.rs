//! Error types for a watch tick
//!
//! Every variant is fatal to the invocation that raised it. The scheduler
//! logs the failure and tries again on the next tick.

use thiserror::Error;
use watch_common::CacheError;

/// Errors that can abort a reconciliation tick
#[derive(Error, Debug)]
pub enum WatchError {
    /// Configuration could not be turned into a usable watch (bad trend URL,
    /// missing field, unparsable threshold)
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The analytics API returned something this watcher cannot evaluate
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An upstream API answered with a non-success status
    #[error("error from {service} API: status={status} response={body}")]
    Upstream {
        /// Which collaborator failed ("PostHog" or "PagerDuty")
        service: &'static str,
        /// HTTP status code
        status: u16,
        /// Response body text
        body: String,
    },

    /// The request could not be sent or its body could not be decoded
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The cache store failed
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Result type alias for watch operations
pub type WatchResult<T> = Result<T, WatchError>;

impl WatchError {
    /// Build an [`WatchError::Upstream`] from a failed response, consuming its body
    pub(crate) async fn upstream(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        WatchError::Upstream {
            service,
            status,
            body,
        }
    }
}
