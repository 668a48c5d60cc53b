//! `HttpLedgerClient` against a fake JSON-RPC node served by axum on a
//! loopback port.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use accord_protocol::crypto::LedgerKeypair;
use accord_protocol::identity::Identity;
use accord_protocol::ledger::{HttpLedgerClient, LedgerClient, RejectReason};
use accord_protocol::transaction::{sign_intent, IntentKind, TransactionBuilder};

// ---------------------------------------------------------------------------
// Fake node
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeNode {
    /// method -> `result` or `error` member of the reply.
    replies: HashMap<&'static str, Value>,
    delay: Option<Duration>,
    seen: Mutex<Vec<Value>>,
}

async fn handle(State(node): State<Arc<FakeNode>>, Json(request): Json<Value>) -> Json<Value> {
    node.seen.lock().push(request.clone());
    if let Some(delay) = node.delay {
        tokio::time::sleep(delay).await;
    }

    let method = request["method"].as_str().unwrap_or_default();
    let mut reply = json!({ "jsonrpc": "2.0", "id": request["id"] });
    match node.replies.get(method) {
        Some(Value::Object(body)) if body.contains_key("error") => {
            reply["error"] = body["error"].clone();
        }
        Some(result) => reply["result"] = result.clone(),
        None => reply["error"] = json!({ "code": -32601, "message": "method not found" }),
    }
    Json(reply)
}

async fn serve(node: FakeNode) -> (HttpLedgerClient, Arc<FakeNode>) {
    let node = Arc::new(node);
    let app = Router::new()
        .route("/", post(handle))
        .with_state(Arc::clone(&node));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = HttpLedgerClient::new(format!("http://{addr}")).unwrap();
    (client, node)
}

fn signed_transfer() -> accord_protocol::transaction::SignedTransaction {
    let identity = Identity::new(LedgerKeypair::generate(), 0);
    let intent = TransactionBuilder::new(IntentKind::ValueTransfer)
        .to(Address::repeat_byte(0x11))
        .value(U256::from(100_000u64))
        .gas_limit(21_000)
        .gas_price(U256::from(1u64))
        .finalize(0);
    sign_intent(intent, &identity, Some(1337)).unwrap()
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn decodes_hex_quantities() {
    let mut node = FakeNode::default();
    node.replies.insert("eth_gasPrice", json!("0x3b9aca00"));
    node.replies.insert("eth_chainId", json!("0x539"));
    node.replies.insert("eth_getTransactionCount", json!("0x2a"));
    node.replies
        .insert("eth_getBalance", json!("0xde0b6b3a7640000"));
    let (client, node) = serve(node).await;

    assert_eq!(
        client.estimate_gas_price().await.unwrap(),
        U256::from(1_000_000_000u64)
    );
    assert_eq!(client.chain_id().await.unwrap(), 1337);

    let address = Address::repeat_byte(0x42);
    assert_eq!(client.current_nonce(address).await.unwrap(), 42);
    assert_eq!(
        client.balance(address).await.unwrap(),
        U256::from(1_000_000_000_000_000_000u128)
    );

    let seen = node.seen.lock();
    assert_eq!(seen.len(), 4);
    assert_eq!(seen[2]["method"], "eth_getTransactionCount");
    assert_eq!(seen[2]["params"][1], "pending");
    assert_eq!(seen[3]["params"][1], "latest");
}

#[tokio::test]
async fn garbage_result_is_a_network_error() {
    let mut node = FakeNode::default();
    node.replies.insert("eth_gasPrice", json!({ "unexpected": true }));
    let (client, _) = serve(node).await;

    let err = client.estimate_gas_price().await.unwrap_err();
    assert_eq!(err.reason(), RejectReason::Network);
}

#[tokio::test]
async fn slow_query_times_out() {
    let mut node = FakeNode::default();
    node.replies.insert("eth_gasPrice", json!("0x1"));
    node.delay = Some(Duration::from_secs(5));
    let (client, _) = serve(node).await;
    let client = client.with_query_timeout(Duration::from_millis(100));

    let err = client.estimate_gas_price().await.unwrap_err();
    assert_eq!(err.reason(), RejectReason::Timeout);
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_sends_raw_bytes_and_returns_node_hash() {
    let tx = signed_transfer();
    let mut node = FakeNode::default();
    node.replies
        .insert("eth_sendRawTransaction", json!(format!("{}", tx.hash())));
    let (client, node) = serve(node).await;

    let hash: B256 = client.submit(&tx).await.unwrap();
    assert_eq!(hash, tx.hash());

    let seen = node.seen.lock();
    assert_eq!(seen[0]["method"], "eth_sendRawTransaction");
    assert_eq!(
        seen[0]["params"][0],
        format!("0x{}", hex::encode(tx.raw()))
    );
}

#[tokio::test]
async fn submit_rejection_is_classified() {
    let mut node = FakeNode::default();
    node.replies.insert(
        "eth_sendRawTransaction",
        json!({
            "error": { "code": -32000, "message": "insufficient funds for gas * price + value" }
        }),
    );
    let (client, _) = serve(node).await;

    let err = client.submit(&signed_transfer()).await.unwrap_err();
    assert_eq!(err.reason(), RejectReason::InsufficientFunds);
}

#[tokio::test]
async fn unknown_node_error_keeps_its_code() {
    let (client, _) = serve(FakeNode::default()).await;

    let err = client.submit(&signed_transfer()).await.unwrap_err();
    assert_eq!(err.reason(), RejectReason::RejectedByNode);
    assert!(err.to_string().contains("-32601"));
}
