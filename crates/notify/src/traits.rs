//! Sink trait definitions and shared error types.

use crate::artifact::Artifact;

/// Errors that can occur during artifact delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Trait for notification transport implementations.
///
/// The engine treats the result as success/failure only; formatting
/// limits and retries live behind this boundary.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one artifact to a destination.
    async fn send(&self, destination: &str, artifact: &Artifact) -> Result<(), NotifyError>;

    /// Human-readable name for this sink (e.g., "webhook").
    fn sink_name(&self) -> &str;
}

/// Trait for the external destructive-action collaborator.
#[async_trait::async_trait]
pub trait DeleteSink: Send + Sync {
    /// Delete the source content of an event. Failures are terminal,
    /// not transient; callers log and continue.
    async fn delete(&self, event_id: &str) -> Result<(), NotifyError>;
}
