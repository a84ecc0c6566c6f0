//! Integration tests for `PostgresStore` against real PostgreSQL.
//!
//! These exercise the `ConfigStore`/`EventStore` ports' actual SQL, not an
//! in-memory fake: unique-index dedup, upsert semantics, and row/domain
//! conversions round-tripping through real columns.

mod common;

use alloy::primitives::Address;
use chrono::Utc;
use uuid::Uuid;

use common::fixtures::{TestDb, logs, seed};
use multichain_indexer::ports::store::{ConfigStore, EventStore};
use multichain_indexer::types::entities::{
    BlockchainEvent, BlockchainEventData, ContractData, ContractDataMetadata, ContractIdentity,
    EventPayload, NativeCurrency,
};
use multichain_indexer::types::entities::{ChainConfig, ContractConfig};
use multichain_indexer::types::enums::{ChainType, ListenerStrategy};
use multichain_indexer::types::primitives::{BlockNumber, ChainId, EthAddress};

fn sample_chain_config(chain_id: i64) -> ChainConfig {
    ChainConfig {
        chain_id: ChainId::new(chain_id),
        name: "Test Chain".to_string(),
        chain_type: ChainType::Evm,
        rpc_url: "https://rpc.example/test".to_string(),
        stream_url: None,
        strategy: ListenerStrategy::Pull,
        scan_interval_ms: ChainConfig::DEFAULT_SCAN_INTERVAL_MS,
        enabled: true,
        native_currency: NativeCurrency {
            name: "Ether".to_string(),
            symbol: "ETH".to_string(),
            decimals: 18,
        },
        metadata: serde_json::Value::Null,
    }
}

fn sample_event(chain_id: i64, tx_hash: &str, log_index: u64) -> BlockchainEvent {
    BlockchainEvent {
        id: Uuid::new_v4(),
        chain_id: ChainId::new(chain_id),
        transaction_hash: tx_hash.to_string(),
        log_index,
        block_number: BlockNumber::new(100),
        timestamp_ms: 1_700_000_000_000,
        event_type: "contract_log".to_string(),
        contract_address: EthAddress::ZERO,
        data: BlockchainEventData {
            topics: vec!["0xdead".to_string()],
            raw_data: "0x".to_string(),
            log_index,
            transaction_index: 0,
            gas_used: Some(21_000),
            tx_status: Some(1),
            contract: ContractIdentity {
                name: "Test Token".to_string(),
                symbol: "TEST".to_string(),
                contract_type: "erc20".to_string(),
            },
            event: EventPayload {
                name: "Transfer".to_string(),
                signature: "Transfer(address,address,uint256)".to_string(),
                args: serde_json::json!({}),
            },
        },
        processed: true,
        processed_at: Some(Utc::now()),
        processing_result: None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn chain_configs_round_trip_through_real_rows() {
    let db = TestDb::new().await;
    let cfg = sample_chain_config(1);
    seed::chain_config(&db.pool, &cfg).await;

    let fetched = db.store.get_chain_configs().await.unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0], cfg);
}

#[tokio::test]
async fn contract_configs_scoped_by_chain_id() {
    let db = TestDb::new().await;
    seed::chain_config(&db.pool, &sample_chain_config(1)).await;
    seed::chain_config(&db.pool, &sample_chain_config(2)).await;

    let contract_chain_1 = logs::erc20_contract(1, Address::repeat_byte(0xAA), 6, true);
    let contract_chain_2 = logs::erc20_contract(2, Address::repeat_byte(0xBB), 18, false);
    seed::contract_config(&db.pool, &contract_chain_1).await;
    seed::contract_config(&db.pool, &contract_chain_2).await;

    let chain_1_contracts = db
        .store
        .get_contract_configs(ChainId::new(1))
        .await
        .unwrap();
    assert_eq!(chain_1_contracts.len(), 1);
    assert_eq!(chain_1_contracts[0].address, contract_chain_1.address);

    let single = db
        .store
        .get_contract_config(ChainId::new(2), contract_chain_2.address)
        .await
        .unwrap();
    assert_eq!(single, Some(contract_chain_2));
}

#[tokio::test]
async fn get_contract_config_returns_none_when_unregistered() {
    let db = TestDb::new().await;
    seed::chain_config(&db.pool, &sample_chain_config(1)).await;

    let missing = db
        .store
        .get_contract_config(ChainId::new(1), EthAddress::ZERO)
        .await
        .unwrap();
    assert!(missing.is_none());
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn insert_event_dedups_on_identity_unique_index() {
    let db = TestDb::new().await;
    let event = sample_event(1, "0xtx1", 0);

    let first = db.store.insert_event(&event).await.unwrap();
    assert!(first, "first insert of a new identity must succeed");

    // Same (chain_id, transaction_hash, log_index), different row id: this
    // is exactly the replay scenario in spec.md §8 scenario 2.
    let mut replay = event.clone();
    replay.id = Uuid::new_v4();
    let second = db.store.insert_event(&replay).await.unwrap();
    assert!(!second, "replaying the same log must be a silent no-op");
}

#[tokio::test]
async fn insert_event_allows_distinct_log_index_in_same_tx() {
    let db = TestDb::new().await;
    let event_0 = sample_event(1, "0xtx1", 0);
    let event_1 = sample_event(1, "0xtx1", 1);

    assert!(db.store.insert_event(&event_0).await.unwrap());
    assert!(db.store.insert_event(&event_1).await.unwrap());
}

#[tokio::test]
async fn contract_data_upsert_updates_counters_in_place() {
    let db = TestDb::new().await;
    let mut data = ContractData {
        chain_id: ChainId::new(1),
        contract_address: EthAddress::ZERO,
        contract_type: "erc20".to_string(),
        collection_key: ContractData::collection_key("erc20", ChainId::new(1)),
        name: "Test Token".to_string(),
        symbol: "TEST".to_string(),
        decimals: 6,
        total_supply: None,
        owner: None,
        is_active: true,
        last_updated: Utc::now(),
        first_seen_block: None,
        last_processed_block: None,
        start_from_block: None,
        metadata: ContractDataMetadata::default(),
    };
    data.observe_block(BlockNumber::new(100));
    data.metadata.transfer_count = 1;

    db.store.upsert_contract_data(&data).await.unwrap();

    data.observe_block(BlockNumber::new(105));
    data.metadata.transfer_count = 2;
    db.store.upsert_contract_data(&data).await.unwrap();

    let fetched = db
        .store
        .get_contract_data(ChainId::new(1), EthAddress::ZERO)
        .await
        .unwrap()
        .expect("row must exist after upsert");

    assert_eq!(fetched.last_processed_block, Some(BlockNumber::new(105)));
    assert_eq!(fetched.metadata.transfer_count, 2);
    assert_eq!(
        fetched.first_seen_block,
        Some(BlockNumber::new(100)),
        "first_seen_block must not move on subsequent upserts"
    );
}

#[tokio::test]
async fn get_contract_data_returns_none_before_first_observation() {
    let db = TestDb::new().await;
    let missing = db
        .store
        .get_contract_data(ChainId::new(1), EthAddress::ZERO)
        .await
        .unwrap();
    assert!(missing.is_none());
}
