//! Live-mode chain client against a stub JSON-RPC node
//!
//! The node answers the handful of methods the client uses and scripts the
//! receipt side: mined after some polls, never mined, or reverted.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use dexboot_chain::{ArtifactRegistry, Chain, ChainClient, ChainConfig, ChainError, TxOptions, TxRequest};
use dexboot_core::{Address, ModuleDescriptor, SystemPlan};
use dexboot_pipeline::{Linker, Sequencer};

// =========================================================================
// Stub node
// =========================================================================

#[derive(Debug, Clone, Copy)]
enum Outcome {
    /// Receipt appears on the given poll (1-based)
    MinedOnPoll(u32),
    /// Receipt never appears
    NeverMined,
    /// Receipt appears with status 0
    StatusZero,
    /// eth_sendTransaction itself fails with a revert message
    RevertOnSend,
}

struct StubNode {
    outcome: Outcome,
    account: Address,
    sent: Mutex<Vec<Value>>,
    receipt_polls: AtomicU32,
}

impl StubNode {
    fn sent(&self) -> Vec<Value> {
        self.sent.lock().unwrap().clone()
    }

    fn receipt_polls(&self) -> u32 {
        self.receipt_polls.load(Ordering::SeqCst)
    }
}

const REVERT_MESSAGE: &str = "VM Exception while processing transaction: revert";

fn tx_hash() -> String {
    format!("0x{}", "11".repeat(32))
}

fn receipt(from: Address, status: &str) -> Value {
    json!({
        "transactionHash": tx_hash(),
        "transactionIndex": "0x0",
        "blockHash": format!("0x{}", "22".repeat(32)),
        "blockNumber": "0x2a",
        "from": from,
        "to": from,
        "cumulativeGasUsed": "0x5208",
        "gasUsed": "0x5208",
        "contractAddress": null,
        "logs": [],
        "logsBloom": format!("0x{}", "0".repeat(512)),
        "status": status,
        "effectiveGasPrice": "0x0",
        "type": "0x0",
    })
}

async fn rpc(State(node): State<Arc<StubNode>>, Json(body): Json<Value>) -> Json<Value> {
    let id = body["id"].clone();
    let method = body["method"].as_str().unwrap_or_default();

    let result = match method {
        "eth_accounts" => json!([node.account]),
        "eth_blockNumber" => json!("0x2a"),
        "net_version" => json!("1337"),
        "eth_chainId" => json!("0x539"),
        "eth_gasPrice" => json!("0x0"),
        "eth_estimateGas" => json!("0x5208"),
        "eth_sendTransaction" => {
            if let Outcome::RevertOnSend = node.outcome {
                return Json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32000, "message": REVERT_MESSAGE },
                }));
            }
            node.sent.lock().unwrap().push(body["params"][0].clone());
            json!(tx_hash())
        }
        "eth_getTransactionReceipt" => {
            let poll = node.receipt_polls.fetch_add(1, Ordering::SeqCst) + 1;
            match node.outcome {
                Outcome::MinedOnPoll(n) if poll >= n => receipt(node.account, "0x1"),
                Outcome::StatusZero => receipt(node.account, "0x0"),
                _ => Value::Null,
            }
        }
        other => {
            return Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("method {} not found", other) },
            }));
        }
    };

    Json(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}

async fn start_stub_node(outcome: Outcome) -> (Arc<StubNode>, ChainClient, oneshot::Sender<()>) {
    let node = Arc::new(StubNode {
        outcome,
        account: Address::repeat_byte(0xac),
        sent: Mutex::new(Vec::new()),
        receipt_polls: AtomicU32::new(0),
    });

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let app = Router::new().route("/", post(rpc)).with_state(node.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async { let _ = shutdown_rx.await; })
            .await
            .unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    let chain = ChainClient::new(ChainConfig {
        receipt_poll_interval_ms: 10,
        receipt_poll_attempts: 3,
        ..ChainConfig::live(format!("http://{}", addr))
    });
    (node, chain, shutdown_tx)
}

fn self_transfer(from: Address) -> TxRequest {
    TxRequest {
        to: Some(from),
        data: Vec::new(),
        options: TxOptions::sender(from).with_value(0).with_gas(100_000).with_gas_price(0),
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_node_queries() {
    let (node, chain, _shutdown) = start_stub_node(Outcome::NeverMined).await;

    assert!(!chain.is_mock());
    assert_eq!(chain.accounts().await.unwrap(), vec![node.account]);
    assert_eq!(chain.block_number().await.unwrap(), 42);
    assert_eq!(chain.network_id().await.unwrap(), "1337");
}

#[tokio::test]
async fn test_pending_receipt_is_polled_until_mined() {
    let (node, chain, _shutdown) = start_stub_node(Outcome::MinedOnPoll(2)).await;

    let receipt = chain.send_transaction(self_transfer(node.account)).await.unwrap();
    assert_eq!(receipt.block_number, 42);
    assert_eq!(receipt.gas_used, 21_000);
    assert_eq!(receipt.tx_hash_hex(), tx_hash());
    assert_eq!(node.receipt_polls(), 2);

    let sent = node.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["from"], json!(node.account));
    assert_eq!(sent[0]["to"], json!(node.account));
    assert_eq!(sent[0]["gas"], "0x186a0");
    assert_eq!(sent[0]["gasPrice"], "0x0");
    assert_eq!(sent[0]["value"], "0x0");
}

#[tokio::test]
async fn test_never_mined_gives_up_after_configured_polls() {
    let (node, chain, _shutdown) = start_stub_node(Outcome::NeverMined).await;

    let err = chain.send_transaction(self_transfer(node.account)).await.unwrap_err();
    match err {
        ChainError::NotMined(hash, attempts) => {
            assert_eq!(hash, tx_hash());
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(node.receipt_polls(), 3);
}

#[tokio::test]
async fn test_never_mined_deployment_is_submission_failure() {
    let (node, chain, _shutdown) = start_stub_node(Outcome::NeverMined).await;
    let artifacts = ArtifactRegistry::synthetic(&SystemPlan::standard().fresh());
    let descriptor = ModuleDescriptor::deploy("DefaultDepositContract", 6_000_000);
    let mut sequencer = Sequencer::new();

    let err = sequencer
        .deploy(&chain, &artifacts, &Linker::new(), &descriptor, vec![], 6_000_000, node.account)
        .await
        .unwrap_err();
    assert!(err.is_submission_failure());
    assert!(err.to_string().contains("DefaultDepositContract"));
    assert!(!sequencer.is_deployed(&descriptor.name));

    // creation transaction carries no recipient
    let sent = node.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].get("to").map_or(true, Value::is_null));
}

#[tokio::test]
async fn test_status_zero_receipt_is_reverted() {
    let (node, chain, _shutdown) = start_stub_node(Outcome::StatusZero).await;

    let err = chain.send_transaction(self_transfer(node.account)).await.unwrap_err();
    match err {
        ChainError::Reverted(reason) => assert!(reason.contains("status 0x0"), "{}", reason),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(node.receipt_polls(), 1);
}

#[tokio::test]
async fn test_revert_reported_by_node_is_reverted() {
    let (node, chain, _shutdown) = start_stub_node(Outcome::RevertOnSend).await;

    let err = chain.send_transaction(self_transfer(node.account)).await.unwrap_err();
    match err {
        ChainError::Reverted(reason) => assert!(reason.contains("revert"), "{}", reason),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(node.sent().is_empty());
    assert_eq!(node.receipt_polls(), 0);
}
