use alloy::primitives::U256;
use chrono::Utc;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

use crate::config::{AccountWatch, MonitorConfig};
use crate::models::{AlertEvent, BalanceSample, DANGER_COLOR};

#[derive(Debug, Error)]
#[error("balance {raw} cannot be expressed with {decimals} decimals")]
pub struct ConversionError {
    pub raw: U256,
    pub decimals: u8,
}

/// Native currency of the monitored chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainUnit {
    pub symbol: String,
    pub decimals: u8,
}

impl Default for ChainUnit {
    fn default() -> Self {
        Self {
            symbol: "ETH".to_string(),
            decimals: 18,
        }
    }
}

fn pow10(exp: u32) -> U256 {
    U256::from(10u8).pow(U256::from(exp))
}

/// `raw / 10^decimals` as a decimal. Exact whenever the result fits in 28
/// significant digits; beyond that the fraction is rounded.
pub fn to_major_units(raw: U256, decimals: u8) -> Result<Decimal, ConversionError> {
    let places = decimals as usize;
    let digits = format!("{:0>width$}", raw.to_string(), width = places + 1);
    let (whole, frac) = digits.split_at(digits.len() - places);
    let text = if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{frac}")
    };

    Decimal::from_str_exact(&text)
        .or_else(|_| Decimal::from_str(&text))
        .map(|d| d.normalize())
        .map_err(|_| ConversionError { raw, decimals })
}

/// `raw < threshold * 10^decimals`, compared on integers so rounding can
/// never flip the outcome.
pub fn is_below(raw: U256, threshold: Decimal, decimals: u8) -> bool {
    if threshold.is_sign_negative() {
        return false;
    }
    let mantissa = U256::from(threshold.mantissa().unsigned_abs());
    let scale = threshold.scale();
    let decimals = u32::from(decimals);

    if scale <= decimals {
        raw < mantissa * pow10(decimals - scale)
    } else {
        // threshold has sub-unit precision: scale the balance up instead
        match raw.checked_mul(pow10(scale - decimals)) {
            Some(scaled) => scaled < mantissa,
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub sample: BalanceSample,
    pub alert: Option<AlertEvent>,
}

#[derive(Debug, Clone)]
pub struct ThresholdEvaluator {
    unit: ChainUnit,
    explorer_url: String,
}

impl ThresholdEvaluator {
    pub fn new(unit: ChainUnit, explorer_url: &str) -> Self {
        Self {
            unit,
            explorer_url: explorer_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(cfg: &MonitorConfig) -> Self {
        Self::new(
            ChainUnit {
                symbol: cfg.unit_symbol.clone(),
                decimals: cfg.decimals,
            },
            &cfg.explorer_url,
        )
    }

    pub fn unit(&self) -> &ChainUnit {
        &self.unit
    }

    pub fn explorer_link(&self, address: &str) -> String {
        format!("{}/address/{}", self.explorer_url, address)
    }

    pub fn evaluate(&self, wallet: &AccountWatch, raw: U256) -> Result<Evaluation, ConversionError> {
        let converted = to_major_units(raw, self.unit.decimals)?;
        let sample = BalanceSample {
            address: wallet.address.clone(),
            raw,
            converted,
        };

        let alert = is_below(raw, wallet.threshold_in_eth, self.unit.decimals).then(|| AlertEvent {
            account_name: wallet.name.clone(),
            address: wallet.address.clone(),
            balance: converted,
            threshold: wallet.threshold_in_eth,
            unit_symbol: self.unit.symbol.clone(),
            explorer_link: self.explorer_link(&wallet.address),
            severity_color: DANGER_COLOR,
            raised_at: Utc::now(),
        });

        Ok(Evaluation { sample, alert })
    }
}
