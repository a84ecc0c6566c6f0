//! Test fixtures for integration tests.
//!
//! `TestDb` wraps a fresh Postgres container with migrations applied;
//! `seed` inserts `ChainConfig`/`ContractConfig` rows directly via SQL,
//! since `ConfigStore` is a read-only port from the core's point of view
//! (spec.md §6: the config store is operator-managed, external to the core).

use sqlx::PgPool;
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;

use multichain_indexer::store::PostgresStore;

use super::containers::{build_connection_string, postgres_image};

/// A test database instance with pool and container.
///
/// The container is kept alive as long as this struct exists; dropping it
/// stops the container.
pub struct TestDb {
    /// The connection pool to the test database.
    pub pool: PgPool,
    /// The `PostgresStore` wrapping the pool.
    pub store: PostgresStore,
    /// The container, kept alive for the duration of the test.
    _container: ContainerAsync<Postgres>,
}

impl TestDb {
    /// Start a fresh Postgres container, connect, and run migrations.
    ///
    /// # Panics
    ///
    /// Panics if container startup, connection, or migrations fail.
    pub async fn new() -> Self {
        let container = postgres_image()
            .start()
            .await
            .expect("failed to start postgres container");

        let host = container.get_host().await.expect("failed to get host");
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("failed to get port");

        let connection_string = build_connection_string(&host.to_string(), port);
        let pool = connect_with_retries(&connection_string, 30)
            .await
            .expect("failed to connect to database");

        let store = PostgresStore::new(pool.clone());
        store
            .run_migrations()
            .await
            .expect("failed to run migrations");

        Self {
            pool,
            store,
            _container: container,
        }
    }
}

/// Connect with retries: the container's "ready to accept connections" log
/// line can precede Postgres actually being reachable by a few hundred ms.
async fn connect_with_retries(url: &str, max_attempts: u32) -> Result<PgPool, sqlx::Error> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match PgPool::connect(url).await {
            Ok(pool) => match sqlx::query("SELECT 1").execute(&pool).await {
                Ok(_) => return Ok(pool),
                Err(e) if attempts < max_attempts => {
                    tracing::debug!("connection verify failed (attempt {attempts}): {e}");
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                }
                Err(e) => return Err(e),
            },
            Err(e) if attempts < max_attempts => {
                tracing::debug!("connection failed (attempt {attempts}): {e}");
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Seed helpers: insert rows the core only ever reads through `ConfigStore`.
pub mod seed {
    use multichain_indexer::types::entities::{ChainConfig, ContractConfig};

    /// Insert a `ChainConfig` row, matching `migrations/0001_init.sql`'s
    /// `chain_configs` table.
    pub async fn chain_config(pool: &sqlx::PgPool, cfg: &ChainConfig) {
        sqlx::query(
            r"
            INSERT INTO chain_configs (
                chain_id, name, chain_type, rpc_url, stream_url, strategy,
                scan_interval_ms, enabled, native_currency_name,
                native_currency_symbol, native_currency_decimals, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (chain_id) DO UPDATE SET
                name = EXCLUDED.name,
                enabled = EXCLUDED.enabled
            ",
        )
        .bind(cfg.chain_id.get())
        .bind(&cfg.name)
        .bind(cfg.chain_type.to_string())
        .bind(&cfg.rpc_url)
        .bind(&cfg.stream_url)
        .bind(cfg.strategy.to_string())
        .bind(cfg.scan_interval_ms as i64)
        .bind(cfg.enabled)
        .bind(&cfg.native_currency.name)
        .bind(&cfg.native_currency.symbol)
        .bind(i16::from(cfg.native_currency.decimals))
        .bind(&cfg.metadata)
        .execute(pool)
        .await
        .expect("failed to seed chain_config");
    }

    /// Insert a `ContractConfig` row, matching `contract_configs`.
    pub async fn contract_config(pool: &sqlx::PgPool, cfg: &ContractConfig) {
        let events: Vec<String> = cfg.events.iter().map(|t| t.to_hex()).collect();

        sqlx::query(
            r"
            INSERT INTO contract_configs (
                chain_id, address, name, symbol, contract_type, events, abi,
                enabled, decimals, is_stablecoin, priority
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (chain_id, address) DO UPDATE SET
                enabled = EXCLUDED.enabled,
                events = EXCLUDED.events
            ",
        )
        .bind(cfg.chain_id.get())
        .bind(cfg.address.to_hex())
        .bind(&cfg.name)
        .bind(&cfg.symbol)
        .bind(&cfg.contract_type)
        .bind(&events)
        .bind(&cfg.abi)
        .bind(cfg.enabled)
        .bind(i16::from(cfg.metadata.decimals))
        .bind(cfg.metadata.is_stablecoin)
        .bind(&cfg.metadata.priority)
        .execute(pool)
        .await
        .expect("failed to seed contract_config");
    }
}

/// Build realistic `Transfer`/`Approval` log fixtures and their surrounding
/// `ContractConfig`/metadata, the way `tests/full_flow_integration.rs` and
/// `tests/pull_listener_integration.rs` need them.
pub mod logs {
    use alloy::primitives::{Address, B256, U256};
    use alloy::rpc::types::Log;
    use alloy::sol_types::SolEvent;

    use multichain_indexer::abi::erc20;
    use multichain_indexer::types::entities::{ContractConfig, ContractMetadata};
    use multichain_indexer::types::primitives::ChainId;

    /// Build a `ContractConfig` for an ERC-20 token monitoring `Transfer`
    /// and `Approval`.
    #[must_use]
    pub fn erc20_contract(
        chain_id: i64,
        address: Address,
        decimals: u8,
        is_stablecoin: bool,
    ) -> ContractConfig {
        ContractConfig {
            chain_id: ChainId::new(chain_id),
            address: address.into(),
            name: "Test Token".to_string(),
            symbol: "TEST".to_string(),
            contract_type: "erc20".to_string(),
            events: vec![
                erc20::Transfer::SIGNATURE_HASH.into(),
                erc20::Approval::SIGNATURE_HASH.into(),
            ],
            abi: vec![
                "Transfer(address,address,uint256)".to_string(),
                "Approval(address,address,uint256)".to_string(),
            ],
            enabled: true,
            metadata: ContractMetadata {
                decimals,
                is_stablecoin,
                priority: None,
            },
        }
    }

    /// Encode a `Transfer` event into the RPC `Log` shape a node would
    /// return from `eth_getLogs`/`eth_subscribe`.
    #[must_use]
    pub fn transfer_log(
        address: Address,
        from: Address,
        to: Address,
        value: U256,
        block_number: u64,
        log_index: u64,
        tx_hash: B256,
    ) -> Log {
        let event = erc20::Transfer { from, to, value };
        Log {
            inner: alloy::primitives::Log {
                address,
                data: event.encode_log_data(),
            },
            block_hash: Some(B256::repeat_byte(0xBB)),
            block_number: Some(block_number),
            block_timestamp: None,
            transaction_hash: Some(tx_hash),
            transaction_index: Some(0),
            log_index: Some(log_index),
            removed: false,
        }
    }
}
