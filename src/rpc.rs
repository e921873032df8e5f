// src/rpc.rs
use alloy::primitives::U256;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::utils::{mask_url, parse_hex_quantity};

const PROBE_ATTEMPTS: u32 = 3;
const PROBE_PAUSE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),
    #[error("node returned error {code}: {message}")]
    Node { code: i64, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A failed balance lookup. The address is kept so the poll loop can log it.
#[derive(Debug, Error)]
#[error("balance query for {address} failed: {source}")]
pub struct BalanceQueryError {
    pub address: String,
    #[source]
    pub source: RpcError,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RpcResponse<T> {
    Success { result: T },
    Error { error: RpcErrorObject },
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceReader {
    /// Balance of `address` at the latest block, in the chain's smallest unit.
    async fn balance_of(&self, address: &str) -> Result<U256, BalanceQueryError>;
}

/// JSON-RPC client over HTTP. One `reqwest::Client` is reused for every call.
pub struct RpcClient {
    url: String,
    client: Client,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, RpcError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.to_string(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    /// Build a client and make sure the node answers, with a few retries.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, RpcError> {
        Self::connect_with_pause(url, timeout, PROBE_PAUSE).await
    }

    async fn connect_with_pause(
        url: &str,
        timeout: Duration,
        pause: Duration,
    ) -> Result<Self, RpcError> {
        let client = Self::new(url, timeout)?;

        let mut attempt = 1;
        loop {
            match client.get_block_number().await {
                Ok(block) => {
                    info!("Connected to {} at block {}", mask_url(url), block);
                    return Ok(client);
                }
                Err(e) if attempt < PROBE_ATTEMPTS => {
                    warn!(
                        "RPC probe failed (attempt {}): {}. Retrying...",
                        attempt, e
                    );
                    attempt += 1;
                    tokio::time::sleep(pause).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        debug!("Sending {} → {}", method, mask_url(&self.url));

        let resp = self.client.post(&self.url).json(&payload).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(RpcError::Status(resp.status()));
        }
        let text = resp.text().await?;
        debug!("Raw {} response: {}", method, text);

        match serde_json::from_str::<RpcResponse<T>>(&text) {
            Ok(RpcResponse::Success { result }) => Ok(result),
            Ok(RpcResponse::Error { error }) => Err(RpcError::Node {
                code: error.code,
                message: error.message,
            }),
            Err(e) => Err(RpcError::Malformed(e.to_string())),
        }
    }

    pub async fn get_block_number(&self) -> Result<u64, RpcError> {
        let result: String = self.call("eth_blockNumber", json!([])).await?;
        parse_hex_quantity(&result, |digits| {
            u64::from_str_radix(digits, 16).map_err(|e| e.to_string())
        })
        .map_err(RpcError::Malformed)
    }

    pub async fn get_balance(&self, address: &str) -> Result<U256, RpcError> {
        let result: String = self
            .call("eth_getBalance", json!([address, "latest"]))
            .await?;
        parse_hex_quantity(&result, |digits| {
            U256::from_str_radix(digits, 16).map_err(|e| e.to_string())
        })
        .map_err(RpcError::Malformed)
    }
}

#[async_trait]
impl BalanceReader for RpcClient {
    async fn balance_of(&self, address: &str) -> Result<U256, BalanceQueryError> {
        self.get_balance(address)
            .await
            .map_err(|source| BalanceQueryError {
                address: address.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{fake_node, flaky_node, NodeReply};

    const ADDR: &str = "0x00000000219ab540356cBB839Cbe05303d7705Fa";

    fn client(url: &str) -> RpcClient {
        RpcClient::new(url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn reads_hex_balance() {
        let node = fake_node(vec![(ADDR, NodeReply::Balance("0x14d1120d7b160000"))]).await;

        let balance = client(&node.url).balance_of(ADDR).await.unwrap();

        assert_eq!(balance, U256::from(1_500_000_000_000_000_000u64));
    }

    #[tokio::test]
    async fn sends_get_balance_at_latest() {
        let node = fake_node(vec![(ADDR, NodeReply::Balance("0x0"))]).await;

        client(&node.url).balance_of(ADDR).await.unwrap();

        let requests = node.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["method"], "eth_getBalance");
        assert_eq!(requests[0]["params"], json!([ADDR, "latest"]));
        assert_eq!(requests[0]["jsonrpc"], "2.0");
    }

    #[tokio::test]
    async fn reads_balances_wider_than_u128() {
        let hex = format!("0x1{}", "0".repeat(40));
        let node = fake_node(vec![(ADDR, NodeReply::Owned(hex))]).await;

        let balance = client(&node.url).balance_of(ADDR).await.unwrap();

        assert_eq!(balance, U256::from(1u8) << 160usize);
    }

    #[tokio::test]
    async fn node_error_carries_address() {
        let node = fake_node(vec![(ADDR, NodeReply::Error(-32602, "invalid address"))]).await;

        let err = client(&node.url).balance_of(ADDR).await.unwrap_err();

        assert_eq!(err.address, ADDR);
        assert!(matches!(err.source, RpcError::Node { code: -32602, .. }));
        assert!(err.to_string().contains(ADDR));
    }

    #[tokio::test]
    async fn http_failure_is_a_query_error() {
        let node = fake_node(vec![(ADDR, NodeReply::Status(StatusCode::BAD_GATEWAY))]).await;

        let err = client(&node.url).balance_of(ADDR).await.unwrap_err();

        assert!(matches!(err.source, RpcError::Status(s) if s == StatusCode::BAD_GATEWAY));
    }

    #[tokio::test]
    async fn malformed_quantity_is_rejected() {
        let node = fake_node(vec![(ADDR, NodeReply::Balance("12345"))]).await;

        let err = client(&node.url).balance_of(ADDR).await.unwrap_err();

        assert!(matches!(err.source, RpcError::Malformed(_)));
    }

    #[tokio::test]
    async fn unreachable_node_is_a_transport_error() {
        let err = client("http://127.0.0.1:1").balance_of(ADDR).await.unwrap_err();
        assert!(matches!(err.source, RpcError::Transport(_)));
    }

    #[tokio::test]
    async fn connect_probes_block_number() {
        let node = fake_node(vec![]).await;

        RpcClient::connect(&node.url, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(node.requests()[0]["method"], "eth_blockNumber");
    }

    #[tokio::test]
    async fn connect_retries_after_failed_probe() {
        let node = flaky_node(1).await;

        RpcClient::connect_with_pause(&node.url, Duration::from_secs(5), Duration::from_millis(10))
            .await
            .unwrap();

        let requests = node.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r["method"] == "eth_blockNumber"));
    }

    #[tokio::test]
    async fn connect_gives_up_after_three_attempts() {
        let node = flaky_node(usize::MAX).await;

        let err = RpcClient::connect_with_pause(
            &node.url,
            Duration::from_secs(5),
            Duration::from_millis(10),
        )
        .await
        .err()
        .unwrap();

        assert!(matches!(err, RpcError::Status(s) if s == StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(node.requests().len(), 3);
    }
}
