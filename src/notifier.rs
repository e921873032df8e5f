use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::models::{AlertEvent, WebhookPayload};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to send Slack notification: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Slack notification failed with status: {status} ({body})")]
    Status { status: StatusCode, body: String },
}

/// Where alerts go. Delivery is best effort: callers log the error and move on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertSink {
    async fn deliver(&self, alert: &AlertEvent) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone)]
pub struct SlackNotifier {
    webhook_url: String,
    client: Client,
}

impl SlackNotifier {
    pub fn new(webhook_url: &str, timeout: Duration) -> Result<Self, NotifyError> {
        Ok(Self {
            webhook_url: webhook_url.to_string(),
            client: Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl AlertSink for SlackNotifier {
    async fn deliver(&self, alert: &AlertEvent) -> Result<(), NotifyError> {
        let payload = WebhookPayload::from(alert);
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!(
                "Alert sent to Slack for {} ({}) raised at {}",
                alert.account_name,
                alert.address,
                alert.raised_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            Ok(())
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(NotifyError::Status { status, body })
        }
    }
}
