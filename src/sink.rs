//! Delivery sink - best-effort posting of batched text to a destination

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Where flushed batches go. Delivery is best-effort: the caller logs
/// failures and moves on, it never retries within a cycle.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, destination: &str, text: &str) -> Result<()>;
}

/// Slack incoming-webhook payload.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    channel: &'a str,
    text: &'a str,
}

/// Slack incoming-webhook client.
#[derive(Debug)]
pub struct SlackWebhook {
    client: Client,
    webhook_url: String,
}

impl SlackWebhook {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self> {
        let webhook_url = webhook_url.into();
        if webhook_url.is_empty() {
            anyhow::bail!("webhook_url is required");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self { client, webhook_url })
    }
}

#[async_trait]
impl DeliverySink for SlackWebhook {
    async fn deliver(&self, destination: &str, text: &str) -> Result<()> {
        let payload = WebhookPayload {
            channel: destination,
            text,
        };

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .context("webhook request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("webhook returned {status}: {body}");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_requires_url() {
        let result = SlackWebhook::new("");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("webhook_url"));
    }

    #[test]
    fn test_webhook_accepts_url() {
        assert!(SlackWebhook::new("https://hooks.slack.example/services/T/B/x").is_ok());
    }
}
