//! # JSON-RPC Wire Types
//!
//! Request/response envelopes for the subset of the Ethereum JSON-RPC API
//! the service speaks. The transport lives in [`super::http`].
//!
//! ## Method Index
//!
//! | Method                      | Used for                               |
//! |-----------------------------|----------------------------------------|
//! | `eth_chainId`               | Startup check against configured chain |
//! | `eth_gasPrice`              | Fee quote, once per intent             |
//! | `eth_getTransactionCount`   | Nonce seed at startup and on resync    |
//! | `eth_getBalance`            | Startup funding check                  |
//! | `eth_sendRawTransaction`    | Submission                             |

use serde::{Deserialize, Serialize};

/// Supported JSON-RPC methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcMethod {
    /// Parameters: none.
    #[serde(rename = "eth_chainId")]
    ChainId,
    /// Parameters: none.
    #[serde(rename = "eth_gasPrice")]
    GasPrice,
    /// Parameters: `(address, block_tag)`.
    #[serde(rename = "eth_getTransactionCount")]
    GetTransactionCount,
    /// Parameters: `(address, block_tag)`.
    #[serde(rename = "eth_getBalance")]
    GetBalance,
    /// Parameters: `(raw_tx_hex)`.
    #[serde(rename = "eth_sendRawTransaction")]
    SendRawTransaction,
}

impl RpcMethod {
    /// Wire name, e.g. `"eth_gasPrice"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChainId => "eth_chainId",
            Self::GasPrice => "eth_gasPrice",
            Self::GetTransactionCount => "eth_getTransactionCount",
            Self::GetBalance => "eth_getBalance",
            Self::SendRawTransaction => "eth_sendRawTransaction",
        }
    }
}

// ---------------------------------------------------------------------------
// RPC Request / Response
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Always "2.0".
    pub jsonrpc: String,
    pub id: u64,
    pub method: RpcMethod,
    /// Positional parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

impl RpcRequest {
    pub fn new(id: u64, method: RpcMethod, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method,
            params,
        }
    }
}

/// A JSON-RPC 2.0 response.
///
/// Exactly one of `result` or `error` is set by a conforming node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    /// Creates a successful response.
    pub fn success(id: u64, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    /// Creates an error response.
    pub fn error(id: u64, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }

    /// Splits the envelope into its result or error.
    ///
    /// A response with neither (a `null` result counts as absent) is
    /// reported as an internal error.
    pub fn into_result(self) -> Result<serde_json::Value, RpcError> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(error),
            (Some(result), None) => Ok(result),
            (None, None) => Err(RpcError::internal_error("response has neither result nor error")),
        }
    }
}

// ---------------------------------------------------------------------------
// RPC Errors
// ---------------------------------------------------------------------------

/// JSON-RPC 2.0 error object.
///
/// Standard codes:
/// - `-32700`: Parse error
/// - `-32600`: Invalid request
/// - `-32601`: Method not found
/// - `-32602`: Invalid params
/// - `-32603`: Internal error
/// - `-32000`: Generic server error; geth and anvil use it for transaction
///   rejections, with the detail in `message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::new(-32603, msg)
    }

    /// A node-side transaction rejection in geth's shape.
    pub fn server_error(msg: impl Into<String>) -> Self {
        Self::new(-32000, msg)
    }
}
