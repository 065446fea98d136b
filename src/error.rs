// backend and registry failures stay local to one update; only startup
// failures in main are fatal

use std::time::Duration;

use thiserror::Error;

/// Failures of the persistent subscriber store.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("subscriber store error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Failures of the text-generation backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The call did not finish within the configured bound.
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    /// Quota exhausted, bad request, or any other error reported upstream.
    #[error("generation failed upstream: {0}")]
    QuotaOrUpstream(String),

    #[error("generation request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Failures sending to or polling the messaging platform.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("telegram request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("telegram api error {code}: {description}")]
    Api { code: i64, description: String },
}

/// Failures while handling one inbound update.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
