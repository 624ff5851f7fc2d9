//! HTTP webhook sink.
//!
//! Delivers artifacts as JSON payloads to a per-destination endpoint
//! under a configured base URL. Also implements the delete collaborator
//! against the same endpoint family.

use crate::artifact::Artifact;
use crate::traits::{DeleteSink, NotificationSink, NotifyError};

/// Delivers artifacts as JSON over HTTP.
///
/// `send` posts to `{base_url}/destinations/{destination}`; `delete`
/// issues `DELETE {base_url}/events/{event_id}`. Non-2xx responses are
/// mapped to [`NotifyError::Transport`].
#[derive(Debug)]
pub struct WebhookSink {
    base_url: String,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl NotificationSink for WebhookSink {
    async fn send(&self, destination: &str, artifact: &Artifact) -> Result<(), NotifyError> {
        let url = format!("{}/destinations/{}", self.base_url, destination);
        let response = self.client.post(&url).json(artifact).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(%url, %status, body = %body, "webhook returned non-2xx status");
            return Err(NotifyError::Transport(format!(
                "webhook returned {status}: {body}"
            )));
        }

        tracing::debug!(%url, %status, "artifact delivered");
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "webhook"
    }
}

#[async_trait::async_trait]
impl DeleteSink for WebhookSink {
    async fn delete(&self, event_id: &str) -> Result<(), NotifyError> {
        let url = format!("{}/events/{}", self.base_url, event_id);
        let response = self.client.delete(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            tracing::warn!(%url, %status, "delete returned non-2xx status");
            return Err(NotifyError::Transport(format!(
                "delete returned {status}"
            )));
        }

        tracing::debug!(%url, "event deleted");
        Ok(())
    }
}
