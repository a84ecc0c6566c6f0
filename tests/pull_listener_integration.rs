//! Integration tests for `PullListener` driven by a mocked JSON-RPC endpoint.
//!
//! `wiremock` stands in for the chain node, the same way
//! `megaeth-rpc`'s client tests mock `eth_getLogs`-shaped JSON-RPC over HTTP.
//! `eth_getBlockByNumber`/`eth_getTransactionReceipt` are stubbed to `null`:
//! `PullListener::fetch_block_timestamp`/`fetch_receipt` both treat any
//! failure to resolve as "unknown" rather than propagating, so a `null`
//! result exercises the real code path without needing to hand-construct a
//! fully-shaped `alloy` `Block`/`TransactionReceipt` JSON body.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use alloy::providers::{DynProvider, ProviderBuilder};
use async_trait::async_trait;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use common::fixtures::logs;
use multichain_indexer::config::ScanSettings;
use multichain_indexer::dispatcher::EventDispatcher;
use multichain_indexer::handlers::traits::EventHandler;
use multichain_indexer::listener::{Listener, PullListener};
use multichain_indexer::types::entities::ContractConfig;
use multichain_indexer::types::events::{DecodedEvent, EventMetadata};
use multichain_indexer::types::primitives::ChainId;

const LATEST_BLOCK: u64 = 100;

/// Responds to `eth_blockNumber`/`eth_getLogs`/`eth_getBlockByNumber`/
/// `eth_getTransactionReceipt` by inspecting the JSON-RPC `method` field.
/// `eth_getLogs` returns the configured log exactly once; every later call
/// (including retries from a second tick) returns an empty array, matching a
/// real node that has already delivered those logs.
struct ChainNodeResponder {
    log: serde_json::Value,
    logs_served: AtomicUsize,
}

impl Respond for ChainNodeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let id = body.get("id").cloned().unwrap_or(serde_json::json!(1));
        let method = body.get("method").and_then(serde_json::Value::as_str).unwrap_or("");

        let result = match method {
            "eth_blockNumber" => serde_json::json!(format!("0x{LATEST_BLOCK:x}")),
            "eth_getLogs" => {
                if self.logs_served.fetch_add(1, Ordering::SeqCst) == 0 {
                    serde_json::json!([self.log.clone()])
                } else {
                    serde_json::json!([])
                }
            }
            _ => serde_json::Value::Null,
        };

        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result,
        }))
    }
}

struct CountingHandler {
    count: Arc<AtomicUsize>,
}

#[async_trait]
impl EventHandler for CountingHandler {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn can_handle(&self, event: &DecodedEvent) -> bool {
        matches!(event, DecodedEvent::Transfer(_))
    }

    async fn handle(
        &self,
        _contract: &ContractConfig,
        _meta: &EventMetadata,
        _event: &DecodedEvent,
        _raw_log: &alloy::rpc::types::Log,
    ) -> multichain_indexer::error::Result<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn fast_scan_settings() -> ScanSettings {
    ScanSettings {
        scan_interval_ms: 30,
        blocks_per_scan: 1000,
        contract_batch_size: 10,
        contract_batch_delay_ms: 0,
        event_batch_size: 10,
        event_batch_delay_ms: 0,
        block_batch_size: 1000,
        block_batch_delay_ms: 0,
        websocket_reconnect_attempts: 5,
        contract_refresh_interval_ms: 30_000,
        rate_limit_report_interval_secs: 10,
    }
}

#[tokio::test]
async fn cursor_advances_to_latest_block_after_a_tick() {
    let mock_server = MockServer::start().await;

    let contract = logs::erc20_contract(1, Address::repeat_byte(0xAA), 6, true);
    let raw_log = logs::transfer_log(
        contract.address.into(),
        Address::repeat_byte(0x01),
        Address::repeat_byte(0x02),
        U256::from(250_000_000_000_u128),
        95,
        0,
        B256::repeat_byte(0x01),
    );
    let log_json = serde_json::to_value(&raw_log).unwrap();

    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ChainNodeResponder {
            log: log_json,
            logs_served: AtomicUsize::new(0),
        })
        .mount(&mock_server)
        .await;

    let provider: DynProvider =
        DynProvider::new(ProviderBuilder::new().connect_http(mock_server.uri().parse().unwrap()));

    let dispatcher = Arc::new(EventDispatcher::default());
    let count = Arc::new(AtomicUsize::new(0));
    dispatcher.register_handler(Arc::new(CountingHandler {
        count: Arc::clone(&count),
    }));

    let listener = PullListener::new(
        ChainId::new(1),
        provider,
        vec![contract],
        dispatcher,
        fast_scan_settings(),
        30,
        1,
    );

    listener.start().await.unwrap();

    let mut advanced = false;
    for _ in 0..100 {
        if listener.head_block() == Some(LATEST_BLOCK) {
            advanced = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(advanced, "cursor did not advance to the latest block in time");

    for _ in 0..50 {
        if count.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(count.load(Ordering::SeqCst), 1, "the one log in range must reach the handler exactly once");

    listener.stop().await.unwrap();
}

#[tokio::test]
async fn empty_contract_set_still_advances_cursor_without_scanning() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ChainNodeResponder {
            log: serde_json::Value::Null,
            logs_served: AtomicUsize::new(0),
        })
        .mount(&mock_server)
        .await;

    let provider: DynProvider =
        DynProvider::new(ProviderBuilder::new().connect_http(mock_server.uri().parse().unwrap()));

    let listener = PullListener::new(
        ChainId::new(1),
        provider,
        vec![],
        Arc::new(EventDispatcher::default()),
        fast_scan_settings(),
        30,
        1,
    );

    listener.start().await.unwrap();

    let mut advanced = false;
    for _ in 0..100 {
        if listener.head_block() == Some(LATEST_BLOCK) {
            advanced = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(advanced, "cursor must still advance past a scan with no contracts configured");

    listener.stop().await.unwrap();
}
