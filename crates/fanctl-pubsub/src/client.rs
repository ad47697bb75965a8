//! REST client for the telemetry queue's pull/acknowledge boundary.

use crate::conversions::{received_to_domain, PullResponse};
use anyhow::{Context, Result};
use async_trait::async_trait;
use fanctl_domain::{AckHandle, AuthProvider, TelemetryMessage, TelemetrySubscription};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct PubSubClientConfig {
    /// Base HTTP URL of the queue API, e.g. `https://pubsub.googleapis.com/v1`.
    pub base_url: String,
    pub project_id: String,
    pub subscription: String,
    /// Client-side bound on the pull call. Must exceed the server-side
    /// long-poll window or healthy pulls get cut off.
    pub pull_timeout: Duration,
}

/// HTTP client bound to one subscription. Long-lived and thread-safe.
pub struct PubSubClient {
    client: reqwest::Client,
    subscription_url: String,
    auth: Arc<dyn AuthProvider>,
}

pub(crate) fn subscription_url(base_url: &str, project_id: &str, subscription: &str) -> String {
    format!(
        "{}/projects/{}/subscriptions/{}",
        base_url.trim_end_matches('/'),
        project_id,
        subscription
    )
}

impl PubSubClient {
    pub fn new(config: PubSubClientConfig, auth: Arc<dyn AuthProvider>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.pull_timeout)
            .build()
            .context("Failed to build queue HTTP client")?;

        Ok(Self {
            client,
            subscription_url: subscription_url(
                &config.base_url,
                &config.project_id,
                &config.subscription,
            ),
            auth,
        })
    }

    async fn post_json(&self, action: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let token = self
            .auth
            .bearer_token()
            .await
            .context("Failed to obtain bearer token")?;

        let response = self
            .client
            .post(format!("{}:{}", self.subscription_url, action))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Queue {} request failed", action))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            anyhow::bail!("Queue API error ({}) on {}: {}", status.as_u16(), action, body);
        }

        Ok(response)
    }
}

#[async_trait]
impl TelemetrySubscription for PubSubClient {
    async fn pull(&self, max_messages: usize) -> Result<Vec<TelemetryMessage>> {
        // returnImmediately=false asks the server to hold the request open
        // until messages are available, bounded by the client timeout.
        let response = self
            .post_json(
                "pull",
                serde_json::json!({
                    "returnImmediately": false,
                    "maxMessages": max_messages,
                }),
            )
            .await?;

        let pull_response: PullResponse = response
            .json()
            .await
            .context("Failed to decode pull response")?;

        let messages: Vec<TelemetryMessage> = pull_response
            .received_messages
            .into_iter()
            .map(received_to_domain)
            .collect();

        debug!(message_count = messages.len(), "pulled telemetry batch");
        Ok(messages)
    }

    async fn acknowledge(&self, handles: &[AckHandle]) -> Result<()> {
        let ack_ids: Vec<&str> = handles.iter().map(AckHandle::as_str).collect();

        self.post_json("acknowledge", serde_json::json!({ "ackIds": ack_ids }))
            .await?;

        debug!(ack_count = ack_ids.len(), "acknowledged messages");
        Ok(())
    }
}
