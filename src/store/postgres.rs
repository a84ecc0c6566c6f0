//! PostgreSQL implementation of the config store and event store ports.
//!
//! # Type conversions
//!
//! PostgreSQL has no native unsigned integer types, so block numbers, chain
//! ids, and the various counters are stored as `BIGINT`/`SMALLINT` and cast at
//! the boundary. These casts are safe in practice: block numbers and chain
//! ids never approach `i64::MAX`, and decimals/priority values fit in `i16`.
//! Addresses and topic hashes are stored as normalized lowercase hex `TEXT`
//! rather than `BYTEA`, matching how the config store's external control
//! surface is expected to author them.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, postgres::PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::InfraError;
use crate::ports::store::{ConfigStore, EventStore, StoreResult};
use crate::types::entities::{
    BlockchainEvent, BlockchainEventData, ChainConfig, ContractConfig, ContractData,
    ContractDataMetadata, ContractMetadata, NativeCurrency,
};
use crate::types::enums::{ChainType, ListenerStrategy};
use crate::types::primitives::{BlockNumber, ChainId, EthAddress, TokenAmount, TopicHash};

/// Wrap a row that failed to convert into domain types as a decode error,
/// consistent with how `sqlx` itself reports malformed rows.
fn decode_error(msg: impl Into<String>) -> InfraError {
    InfraError::Database(sqlx::Error::Decode(msg.into().into()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// POSTGRES STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// PostgreSQL-backed implementation of [`ConfigStore`] and [`EventStore`].
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new store wrapping an already-connected pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails to apply.
    pub async fn run_migrations(&self) -> Result<(), InfraError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| decode_error(format!("migration failed: {e}")))?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct ChainConfigRow {
    chain_id: i64,
    name: String,
    chain_type: ChainType,
    rpc_url: String,
    stream_url: Option<String>,
    strategy: ListenerStrategy,
    scan_interval_ms: i64,
    enabled: bool,
    native_currency_name: String,
    native_currency_symbol: String,
    native_currency_decimals: i16,
    metadata: serde_json::Value,
}

impl From<ChainConfigRow> for ChainConfig {
    fn from(row: ChainConfigRow) -> Self {
        Self {
            chain_id: ChainId::new(row.chain_id),
            name: row.name,
            chain_type: row.chain_type,
            rpc_url: row.rpc_url,
            stream_url: row.stream_url,
            strategy: row.strategy,
            scan_interval_ms: row.scan_interval_ms as u64,
            enabled: row.enabled,
            native_currency: NativeCurrency {
                name: row.native_currency_name,
                symbol: row.native_currency_symbol,
                decimals: row.native_currency_decimals as u8,
            },
            metadata: row.metadata,
        }
    }
}

const CHAIN_CONFIG_COLUMNS: &str = r"
    chain_id, name, chain_type, rpc_url, stream_url, strategy, scan_interval_ms,
    enabled, native_currency_name, native_currency_symbol, native_currency_decimals,
    metadata
";

// ═══════════════════════════════════════════════════════════════════════════════
// CONTRACT CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct ContractConfigRow {
    chain_id: i64,
    address: String,
    name: String,
    symbol: String,
    contract_type: String,
    events: Vec<String>,
    abi: Vec<String>,
    enabled: bool,
    decimals: i16,
    is_stablecoin: bool,
    priority: Option<String>,
}

impl TryFrom<ContractConfigRow> for ContractConfig {
    type Error = InfraError;

    fn try_from(row: ContractConfigRow) -> Result<Self, Self::Error> {
        let address = EthAddress::from_hex(&row.address)
            .map_err(|e| decode_error(format!("invalid contract address in DB: {e}")))?;
        let events = row
            .events
            .iter()
            .map(|hex| TopicHash::from_hex(hex))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| decode_error(format!("invalid topic hash in DB: {e}")))?;

        Ok(Self {
            chain_id: ChainId::new(row.chain_id),
            address,
            name: row.name,
            symbol: row.symbol,
            contract_type: row.contract_type,
            events,
            abi: row.abi,
            enabled: row.enabled,
            metadata: ContractMetadata {
                decimals: row.decimals as u8,
                is_stablecoin: row.is_stablecoin,
                priority: row.priority,
            },
        })
    }
}

const CONTRACT_CONFIG_COLUMNS: &str = r"
    chain_id, address, name, symbol, contract_type, events, abi, enabled,
    decimals, is_stablecoin, priority
";

// ═══════════════════════════════════════════════════════════════════════════════
// CONTRACT DATA
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct ContractDataRow {
    chain_id: i64,
    contract_address: String,
    contract_type: String,
    collection_key: String,
    name: String,
    symbol: String,
    decimals: i16,
    total_supply: Option<sqlx::types::BigDecimal>,
    owner: Option<String>,
    is_active: bool,
    last_updated: DateTime<Utc>,
    first_seen_block: Option<i64>,
    last_processed_block: Option<i64>,
    start_from_block: Option<i64>,
    transfer_count: i64,
    large_transfer_count: i64,
    last_transfer_timestamp: Option<DateTime<Utc>>,
}

impl TryFrom<ContractDataRow> for ContractData {
    type Error = InfraError;

    fn try_from(row: ContractDataRow) -> Result<Self, Self::Error> {
        let contract_address = EthAddress::from_hex(&row.contract_address)
            .map_err(|e| decode_error(format!("invalid contract address in DB: {e}")))?;
        let owner = row
            .owner
            .map(|hex| EthAddress::from_hex(&hex))
            .transpose()
            .map_err(|e| decode_error(format!("invalid owner address in DB: {e}")))?;

        Ok(Self {
            chain_id: ChainId::new(row.chain_id),
            contract_address,
            contract_type: row.contract_type,
            collection_key: row.collection_key,
            name: row.name,
            symbol: row.symbol,
            decimals: row.decimals as u8,
            total_supply: row.total_supply.as_ref().map(TokenAmount::from_bigdecimal),
            owner,
            is_active: row.is_active,
            last_updated: row.last_updated,
            first_seen_block: row.first_seen_block.map(|n| BlockNumber::new(n as u64)),
            last_processed_block: row.last_processed_block.map(|n| BlockNumber::new(n as u64)),
            start_from_block: row.start_from_block.map(|n| BlockNumber::new(n as u64)),
            metadata: ContractDataMetadata {
                transfer_count: row.transfer_count as u64,
                large_transfer_count: row.large_transfer_count as u64,
                last_transfer_timestamp: row.last_transfer_timestamp,
            },
        })
    }
}

const CONTRACT_DATA_COLUMNS: &str = r"
    chain_id, contract_address, contract_type, collection_key, name, symbol, decimals,
    total_supply, owner, is_active, last_updated, first_seen_block, last_processed_block,
    start_from_block, transfer_count, large_transfer_count, last_transfer_timestamp
";

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCKCHAIN EVENT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct BlockchainEventRow {
    id: Uuid,
    chain_id: i64,
    transaction_hash: String,
    log_index: i64,
    block_number: i64,
    timestamp_ms: i64,
    event_type: String,
    contract_address: String,
    data: serde_json::Value,
    processed: bool,
    processed_at: Option<DateTime<Utc>>,
    processing_result: Option<serde_json::Value>,
}

impl TryFrom<BlockchainEventRow> for BlockchainEvent {
    type Error = InfraError;

    fn try_from(row: BlockchainEventRow) -> Result<Self, Self::Error> {
        let contract_address = EthAddress::from_hex(&row.contract_address)
            .map_err(|e| decode_error(format!("invalid contract address in DB: {e}")))?;
        let data: BlockchainEventData = serde_json::from_value(row.data)?;

        Ok(Self {
            id: row.id,
            chain_id: ChainId::new(row.chain_id),
            transaction_hash: row.transaction_hash,
            log_index: row.log_index as u64,
            block_number: BlockNumber::new(row.block_number as u64),
            timestamp_ms: row.timestamp_ms,
            event_type: row.event_type,
            contract_address,
            data,
            processed: row.processed,
            processed_at: row.processed_at,
            processing_result: row.processing_result,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl ConfigStore for PostgresStore {
    #[instrument(skip(self))]
    async fn get_chain_configs(&self) -> StoreResult<Vec<ChainConfig>> {
        let rows = sqlx::query_as::<_, ChainConfigRow>(&format!(
            "SELECT {CHAIN_CONFIG_COLUMNS} FROM chain_configs ORDER BY chain_id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        Ok(rows.into_iter().map(ChainConfig::from).collect())
    }

    #[instrument(skip(self), fields(%chain_id))]
    async fn get_contract_configs(&self, chain_id: ChainId) -> StoreResult<Vec<ContractConfig>> {
        let rows = sqlx::query_as::<_, ContractConfigRow>(&format!(
            "SELECT {CONTRACT_CONFIG_COLUMNS} FROM contract_configs WHERE chain_id = $1 ORDER BY address"
        ))
        .bind(chain_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        rows.into_iter().map(ContractConfig::try_from).collect()
    }

    #[instrument(skip(self), fields(%chain_id, address = %address.to_hex()))]
    async fn get_contract_config(
        &self,
        chain_id: ChainId,
        address: EthAddress,
    ) -> StoreResult<Option<ContractConfig>> {
        let row = sqlx::query_as::<_, ContractConfigRow>(&format!(
            "SELECT {CONTRACT_CONFIG_COLUMNS} FROM contract_configs WHERE chain_id = $1 AND address = $2"
        ))
        .bind(chain_id.get())
        .bind(address.to_hex())
        .fetch_optional(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        row.map(ContractConfig::try_from).transpose()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl EventStore for PostgresStore {
    #[instrument(skip(self, event), fields(chain_id = %event.chain_id, tx = %event.transaction_hash, log_index = event.log_index))]
    async fn insert_event(&self, event: &BlockchainEvent) -> StoreResult<bool> {
        let data = serde_json::to_value(&event.data)?;

        let result = sqlx::query(
            r"
            INSERT INTO blockchain_events (
                id, chain_id, transaction_hash, log_index, block_number, timestamp_ms,
                event_type, contract_address, data, processed, processed_at, processing_result
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (chain_id, transaction_hash, log_index) DO NOTHING
            ",
        )
        .bind(event.id)
        .bind(event.chain_id.get())
        .bind(&event.transaction_hash)
        .bind(event.log_index as i64)
        .bind(event.block_number.get() as i64)
        .bind(event.timestamp_ms)
        .bind(&event.event_type)
        .bind(event.contract_address.to_hex())
        .bind(data)
        .bind(event.processed)
        .bind(event.processed_at)
        .bind(event.processing_result.clone())
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        let inserted = result.rows_affected() > 0;
        if !inserted {
            debug!(chain_id = %event.chain_id, tx = %event.transaction_hash, log_index = event.log_index, "duplicate event, skipped");
        }
        Ok(inserted)
    }

    #[instrument(skip(self), fields(%chain_id, contract = %contract_address.to_hex()))]
    async fn get_contract_data(
        &self,
        chain_id: ChainId,
        contract_address: EthAddress,
    ) -> StoreResult<Option<ContractData>> {
        let row = sqlx::query_as::<_, ContractDataRow>(&format!(
            "SELECT {CONTRACT_DATA_COLUMNS} FROM contract_data WHERE chain_id = $1 AND contract_address = $2"
        ))
        .bind(chain_id.get())
        .bind(contract_address.to_hex())
        .fetch_optional(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        row.map(ContractData::try_from).transpose()
    }

    #[instrument(skip(self, data), fields(chain_id = %data.chain_id, contract = %data.contract_address.to_hex()))]
    async fn upsert_contract_data(&self, data: &ContractData) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO contract_data (
                chain_id, contract_address, contract_type, collection_key, name, symbol,
                decimals, total_supply, owner, is_active, last_updated, first_seen_block,
                last_processed_block, start_from_block, transfer_count, large_transfer_count,
                last_transfer_timestamp
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (chain_id, contract_address) DO UPDATE SET
                contract_type = EXCLUDED.contract_type,
                collection_key = EXCLUDED.collection_key,
                name = EXCLUDED.name,
                symbol = EXCLUDED.symbol,
                decimals = EXCLUDED.decimals,
                total_supply = EXCLUDED.total_supply,
                owner = EXCLUDED.owner,
                is_active = EXCLUDED.is_active,
                last_updated = EXCLUDED.last_updated,
                first_seen_block = EXCLUDED.first_seen_block,
                last_processed_block = EXCLUDED.last_processed_block,
                start_from_block = EXCLUDED.start_from_block,
                transfer_count = EXCLUDED.transfer_count,
                large_transfer_count = EXCLUDED.large_transfer_count,
                last_transfer_timestamp = EXCLUDED.last_transfer_timestamp
            ",
        )
        .bind(data.chain_id.get())
        .bind(data.contract_address.to_hex())
        .bind(&data.contract_type)
        .bind(&data.collection_key)
        .bind(&data.name)
        .bind(&data.symbol)
        .bind(data.decimals as i16)
        .bind(data.total_supply.as_ref().map(TokenAmount::to_bigdecimal))
        .bind(data.owner.as_ref().map(EthAddress::to_hex))
        .bind(data.is_active)
        .bind(data.last_updated)
        .bind(data.first_seen_block.map(|b| b.get() as i64))
        .bind(data.last_processed_block.map(|b| b.get() as i64))
        .bind(data.start_from_block.map(|b| b.get() as i64))
        .bind(data.metadata.transfer_count as i64)
        .bind(data.metadata.large_transfer_count as i64)
        .bind(data.metadata.last_transfer_timestamp)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        debug!(chain_id = %data.chain_id, contract = %data.contract_address.to_hex(), "contract data upserted");
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    // Full integration coverage lives in tests/store_integration.rs, which
    // spins up a real Postgres via testcontainers; these are row-conversion
    // unit tests that don't need a database.

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn postgres_store_is_send_sync() {
        assert_send_sync::<PostgresStore>();
    }

    #[test]
    fn chain_config_row_roundtrips_into_domain_type() {
        let row = ChainConfigRow {
            chain_id: 1,
            name: "Ethereum Mainnet".to_string(),
            chain_type: ChainType::Evm,
            rpc_url: "https://rpc.example/eth".to_string(),
            stream_url: Some("wss://stream.example/eth".to_string()),
            strategy: ListenerStrategy::Push,
            scan_interval_ms: 5_000,
            enabled: true,
            native_currency_name: "Ether".to_string(),
            native_currency_symbol: "ETH".to_string(),
            native_currency_decimals: 18,
            metadata: serde_json::Value::Null,
        };

        let config: ChainConfig = row.into();
        assert_eq!(config.chain_id, ChainId::new(1));
        assert_eq!(config.strategy, ListenerStrategy::Push);
        assert_eq!(config.native_currency.decimals, 18);
    }

    #[test]
    fn contract_config_row_rejects_malformed_address() {
        let row = ContractConfigRow {
            chain_id: 1,
            address: "not-an-address".to_string(),
            name: "Test Token".to_string(),
            symbol: "TEST".to_string(),
            contract_type: "erc20".to_string(),
            events: vec![],
            abi: vec![],
            enabled: true,
            decimals: 6,
            is_stablecoin: false,
            priority: None,
        };

        assert!(ContractConfig::try_from(row).is_err());
    }

    #[test]
    fn contract_config_row_converts_valid_fields() {
        let row = ContractConfigRow {
            chain_id: 1,
            address: EthAddress::ZERO.to_hex(),
            name: "Test Token".to_string(),
            symbol: "TEST".to_string(),
            contract_type: "erc20".to_string(),
            events: vec![
                "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef".to_string(),
            ],
            abi: vec!["Transfer(address,address,uint256)".to_string()],
            enabled: true,
            decimals: 6,
            is_stablecoin: true,
            priority: Some("high".to_string()),
        };

        let contract = ContractConfig::try_from(row).expect("valid row converts");
        assert_eq!(contract.events.len(), 1);
        assert!(contract.metadata.is_stablecoin);
    }
}
