use dotenvy::dotenv;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::{env, path::Path, str::FromStr, time::Duration};
use thiserror::Error;
use tracing::{info, warn};

use crate::utils::mask_url;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Largest scale `rust_decimal` can hold without losing fractional digits.
pub const MAX_DECIMALS: u8 = 28;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfig {
    pub slack_webhook: String,
    pub rpc_url: String,
    pub explorer_url: String,
    pub interval_in_secs: u64,
    #[serde(default)]
    pub wallets: Vec<AccountWatch>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_in_secs: u64,
    #[serde(default = "default_unit_symbol")]
    pub unit_symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountWatch {
    pub name: String,
    pub address: String,
    #[serde(deserialize_with = "deserialize_threshold")]
    pub threshold_in_eth: Decimal,
}

fn default_request_timeout() -> u64 {
    10
}

fn default_unit_symbol() -> String {
    "ETH".to_string()
}

fn default_decimals() -> u8 {
    18
}

/// Thresholds may be written as YAML numbers or strings. Floats go through
/// their shortest textual form so `0.1` stays `0.1` instead of the nearest
/// binary fraction.
fn deserialize_threshold<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Float(f64),
        Text(String),
    }

    let text = match Raw::deserialize(deserializer)? {
        Raw::Int(v) => v.to_string(),
        Raw::Float(v) => v.to_string(),
        Raw::Text(v) => v,
    };
    Decimal::from_str(text.trim())
        .map_err(|e| serde::de::Error::custom(format!("invalid threshold {text:?}: {e}")))
}

impl MonitorConfig {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_in_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_in_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("slackWebhook", &self.slack_webhook),
            ("rpcUrl", &self.rpc_url),
            ("explorerUrl", &self.explorer_url),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{key} must not be empty")));
            }
        }

        if self.decimals > MAX_DECIMALS {
            return Err(ConfigError::Invalid(format!(
                "decimals must be at most {MAX_DECIMALS}, got {}",
                self.decimals
            )));
        }

        if let Some(wallet) = self.wallets.iter().find(|w| w.threshold_in_eth.is_sign_negative()) {
            return Err(ConfigError::Invalid(format!(
                "wallet {} has a negative threshold {}",
                wallet.name, wallet.threshold_in_eth
            )));
        }

        Ok(())
    }
}

/// Config path from `CONFIG_PATH` (a `.env` file is honoured), else `config.yaml`.
pub fn config_path() -> String {
    dotenv().ok();
    env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

pub fn load(path: impl AsRef<Path>) -> Result<MonitorConfig, ConfigError> {
    let path = path.as_ref();
    let shown = path.display().to_string();

    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: shown.clone(),
        source,
    })?;
    let cfg = MonitorConfig::from_yaml(&text).map_err(|source| ConfigError::Parse {
        path: shown.clone(),
        source,
    })?;
    cfg.validate()?;

    info!("Loaded config from {}", shown);
    info!("  Slack Webhook URL: {}", mask_url(&cfg.slack_webhook));
    info!("  RPC URL: {}", mask_url(&cfg.rpc_url));
    info!("  Explorer URL: {}", cfg.explorer_url);
    info!("  Interval in Seconds: {}", cfg.interval_in_secs);
    info!("  Wallets tracked: {}", cfg.wallets.len());

    if cfg.interval_in_secs == 0 {
        warn!("intervalInSecs is 0, cycles will run back to back");
    }

    Ok(cfg)
}
