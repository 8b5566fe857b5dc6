use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::Outcome;
use crate::{Error, Result};

/// Sends an outcome to a callback target.
///
/// Returns the HTTP status code of the response, or an error when no
/// response was obtained (connection refused, timeout, invalid URL, …).
/// Interpreting the status is up to the caller.
#[async_trait]
pub trait CallbackSender: Send + Sync {
    async fn send(&self, target: &str, outcome: &Outcome) -> Result<u16>;
}

/// [`CallbackSender`] posting JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCallbackSender {
    client: Client,
}

impl HttpCallbackSender {
    /// Create a sender whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client))
    }

    /// Wrap a preconfigured client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CallbackSender for HttpCallbackSender {
    async fn send(&self, target: &str, outcome: &Outcome) -> Result<u16> {
        let response = self
            .client
            .post(target)
            .json(outcome)
            .send()
            .await
            .map_err(|e| Error::delivery(format!("request to {target} failed: {e}")))?;
        let status = response.status();
        tracing::debug!(event_id = %outcome.event_id, %status, "callback response");
        Ok(status.as_u16())
    }
}
