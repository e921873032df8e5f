// src/models.rs
use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Attachment color for low balance alerts.
pub const DANGER_COLOR: &str = "danger";

/// One balance reading, taken fresh every cycle
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceSample {
    pub address: String,
    pub raw: U256,          // smallest unit (wei)
    pub converted: Decimal, // major unit (ETH)
}

/// A wallet found below its threshold, consumed by the notifier
#[derive(Debug, Clone, PartialEq)]
pub struct AlertEvent {
    pub account_name: String,
    pub address: String,
    pub balance: Decimal,
    pub threshold: Decimal,
    pub unit_symbol: String,
    pub explorer_link: String,
    pub severity_color: &'static str,
    pub raised_at: DateTime<Utc>,
}

impl AlertEvent {
    /// Slack mrkdwn body of the alert.
    pub fn message(&self) -> String {
        format!(
            "*Warning: Low Wallet Balance*\n*Wallet Name:* {}\n*Balance:* {} {}\n*Threshold:* {} {}\n*Details:* {}",
            self.account_name,
            six_places(self.balance),
            self.unit_symbol,
            six_places(self.threshold),
            self.unit_symbol,
            self.explorer_link
        )
    }
}

/// Round half away from zero to 6 places and pad, e.g. `0.5` -> `0.500000`.
pub fn six_places(value: Decimal) -> String {
    format!(
        "{:.6}",
        value.round_dp_with_strategy(6, RoundingStrategy::MidpointAwayFromZero)
    )
}

/// Webhook body: a single attachment carrying the alert text
#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
pub struct Attachment {
    pub color: &'static str,
    pub text: String,
}

impl From<&AlertEvent> for WebhookPayload {
    fn from(alert: &AlertEvent) -> Self {
        Self {
            attachments: vec![Attachment {
                color: alert.severity_color,
                text: alert.message(),
            }],
        }
    }
}

/// Outcome of one pass over every configured wallet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub checked: usize,
    pub below_threshold: usize,
    pub alerts_delivered: usize,
    pub failures: usize,
}
