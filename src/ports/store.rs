//! Storage ports: the external config store and event store (spec.md §6).
//!
//! The core only ever reads `ChainConfig`/`ContractConfig` and only ever
//! writes `ContractData`/`BlockchainEvent`. Nothing else about how those
//! documents are seeded, queried by operators, or exposed over HTTP is this
//! crate's concern — that's why these two traits are deliberately narrow.

use async_trait::async_trait;

use crate::error::InfraError;
use crate::types::entities::{BlockchainEvent, ChainConfig, ContractConfig, ContractData};
use crate::types::primitives::{ChainId, EthAddress};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, InfraError>;

/// Read access to operator-managed chain and contract configuration.
///
/// The core never writes through this port: `ChainConfig`/`ContractConfig`
/// are owned and mutated by an external control surface, and the core only
/// observes them on startup and on each config-reload tick
/// (`crate::config_reloader`).
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// All chain configurations, enabled or not. Callers filter on `enabled`
    /// themselves so a reload can detect a chain transitioning to disabled.
    async fn get_chain_configs(&self) -> StoreResult<Vec<ChainConfig>>;

    /// All contract configurations for one chain, enabled or not.
    async fn get_contract_configs(&self, chain_id: ChainId) -> StoreResult<Vec<ContractConfig>>;

    /// A single contract's configuration, if one is registered for
    /// `(chain_id, address)`. Used by the transfer handler to look up
    /// decimals/thresholds for a contract it just observed a log from.
    async fn get_contract_config(
        &self,
        chain_id: ChainId,
        address: EthAddress,
    ) -> StoreResult<Option<ContractConfig>>;
}

/// Read/write access to persisted events and runtime contract facts.
///
/// Identity and idempotency are enforced here: `insert_event` is expected to
/// be safe to call twice for the same log (spec.md §4.6, §8 scenario 2).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert a decoded event, skipping silently if one already exists for
    /// this `(chain_id, transaction_hash, log_index)`.
    ///
    /// Returns `true` if a new row was inserted, `false` if the event was
    /// already present (a duplicate, not an error).
    async fn insert_event(&self, event: &BlockchainEvent) -> StoreResult<bool>;

    /// Fetch the cached runtime facts for a contract, if any have been
    /// recorded yet.
    async fn get_contract_data(
        &self,
        chain_id: ChainId,
        contract_address: EthAddress,
    ) -> StoreResult<Option<ContractData>>;

    /// Create or update the cached runtime facts for a contract.
    ///
    /// Callers are expected to have already merged updates via
    /// `ContractData::observe_block` and the transfer counters; this method
    /// persists the given snapshot as-is.
    async fn upsert_contract_data(&self, data: &ContractData) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn ports_require_send_sync() {
        fn check_config_store<T: ConfigStore>() {
            assert_send_sync::<T>();
        }
        fn check_event_store<T: EventStore>() {
            assert_send_sync::<T>();
        }
    }
}
