//! JSON-RPC over HTTP transport for [`LedgerClient`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, B256, U256, U64};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use super::rpc::{RpcMethod, RpcRequest, RpcResponse};
use super::{LedgerClient, LedgerError};
use crate::config::RPC_QUERY_TIMEOUT;
use crate::transaction::SignedTransaction;

/// Talks to an EVM node's HTTP JSON-RPC endpoint.
///
/// Read-only queries are bounded by a per-request timeout. Submissions are
/// not: the dispatcher owns the submit deadline, so the HTTP layer never
/// races it.
#[derive(Debug)]
pub struct HttpLedgerClient {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
    query_timeout: Duration,
}

impl HttpLedgerClient {
    /// Creates a client for the node at `url`.
    pub fn new(url: impl Into<String>) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LedgerError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
            query_timeout: RPC_QUERY_TIMEOUT,
        })
    }

    /// Overrides the timeout applied to read-only queries.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// The node endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: RpcMethod,
        params: serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<T, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let envelope: RpcResponse = serde_json::from_slice(&body).map_err(|e| {
            LedgerError::Network(format!(
                "{}: HTTP {status}, undecodable response: {e}",
                method.as_str()
            ))
        })?;
        let result = envelope.into_result()?;

        debug!(method = method.as_str(), id, "rpc call completed");
        serde_json::from_value(result).map_err(|e| {
            LedgerError::Network(format!("{}: unexpected result: {e}", method.as_str()))
        })
    }

    async fn query<T: DeserializeOwned>(
        &self,
        method: RpcMethod,
        params: serde_json::Value,
    ) -> Result<T, LedgerError> {
        self.call(method, params, Some(self.query_timeout)).await
    }
}

fn transport_error(err: reqwest::Error, timeout: Option<Duration>) -> LedgerError {
    match timeout {
        Some(limit) if err.is_timeout() => LedgerError::Timeout(limit),
        _ => LedgerError::Network(err.to_string()),
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn estimate_gas_price(&self) -> Result<U256, LedgerError> {
        self.query(RpcMethod::GasPrice, json!([])).await
    }

    async fn submit(&self, tx: &SignedTransaction) -> Result<B256, LedgerError> {
        let hash: B256 = self
            .call(RpcMethod::SendRawTransaction, json!([tx.raw()]), None)
            .await?;
        if hash != tx.hash() {
            warn!(
                local = %tx.hash(),
                node = %hash,
                "node acknowledged a different transaction hash"
            );
        }
        Ok(hash)
    }

    async fn current_nonce(&self, address: Address) -> Result<u64, LedgerError> {
        let count: U64 = self
            .query(RpcMethod::GetTransactionCount, json!([address, "pending"]))
            .await?;
        Ok(count.to::<u64>())
    }

    async fn chain_id(&self) -> Result<u64, LedgerError> {
        let id: U64 = self.query(RpcMethod::ChainId, json!([])).await?;
        Ok(id.to::<u64>())
    }

    async fn balance(&self, address: Address) -> Result<U256, LedgerError> {
        self.query(RpcMethod::GetBalance, json!([address, "latest"]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_keeps_url_and_default_timeout() {
        let client = HttpLedgerClient::new("http://localhost:8545").unwrap();
        assert_eq!(client.url(), "http://localhost:8545");
        assert_eq!(client.query_timeout, RPC_QUERY_TIMEOUT);

        let client = client.with_query_timeout(Duration::from_millis(250));
        assert_eq!(client.query_timeout, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn unreachable_node_is_a_network_error() {
        // Port 9 (discard) on loopback is closed on any sane test host.
        let client = HttpLedgerClient::new("http://127.0.0.1:9").unwrap();
        let err = client.estimate_gas_price().await.unwrap_err();
        assert_eq!(err.reason(), crate::ledger::RejectReason::Network);
    }
}
