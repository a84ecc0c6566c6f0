//! Domain entities for the indexing core.
//!
//! These structs mirror the documents held by the external config store and
//! event store (`crate::ports`); the core treats them as plain data, reading
//! `ChainConfig`/`ContractConfig` and writing `ContractData`/`BlockchainEvent`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ChainType, ListenerStrategy, TransferType};
use super::primitives::{BlockNumber, ChainId, EthAddress, TokenAmount, TopicHash};

// ═══════════════════════════════════════════════════════════════════════════════
// NATIVE CURRENCY
// ═══════════════════════════════════════════════════════════════════════════════

/// Native currency metadata for a chain (e.g. ETH, BNB).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    /// Full name, e.g. "Ether".
    pub name: String,
    /// Ticker symbol, e.g. "ETH".
    pub symbol: String,
    /// Number of decimals (18 for most EVM chains).
    pub decimals: u8,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// Operator-managed configuration for one monitored chain.
///
/// Identity is `chain_id`, unique across the `chain_configs` collection.
/// Created and mutated only via the config store; the core reads it on
/// startup and on each config-reload tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Unique chain identifier.
    pub chain_id: ChainId,
    /// Human-readable name, e.g. "Ethereum Mainnet".
    pub name: String,
    /// Execution environment. Only `Evm` has an implemented adapter.
    pub chain_type: ChainType,
    /// JSON-RPC request/response endpoint.
    pub rpc_url: String,
    /// Optional streaming (WebSocket) endpoint. Required at runtime for
    /// `Push` and `Hybrid` strategies; if absent, those strategies fall back
    /// to `Pull`.
    pub stream_url: Option<String>,
    /// Ingestion strategy to use for this chain.
    pub strategy: ListenerStrategy,
    /// Pull listener tick interval in milliseconds.
    pub scan_interval_ms: u64,
    /// Whether this chain is currently monitored.
    pub enabled: bool,
    /// Native currency metadata.
    pub native_currency: NativeCurrency,
    /// Free-form operator metadata (unparsed by the core).
    pub metadata: serde_json::Value,
}

impl ChainConfig {
    /// Default pull scan interval, matching spec.md §3's default.
    pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 5_000;

    /// The strategy actually usable given configured transports: `Push`/`Hybrid`
    /// without a `stream_url` degrade to `Pull`.
    #[must_use]
    pub fn effective_strategy(&self) -> ListenerStrategy {
        if self.strategy.requires_stream() && self.stream_url.is_none() {
            ListenerStrategy::Pull
        } else {
            self.strategy
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTRACT CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// Operator-managed configuration for one monitored contract on one chain.
///
/// Identity is `(chain_id, address)`; `address` is always normalized to
/// lowercase hex (`EthAddress::to_hex` already does this).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Chain this contract lives on.
    pub chain_id: ChainId,
    /// Normalized (lowercase) contract address.
    pub address: EthAddress,
    /// Human-readable name.
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Contract type, e.g. "erc20", "erc721".
    pub contract_type: String,
    /// Ordered list of event topic-0 hashes to monitor.
    pub events: Vec<TopicHash>,
    /// Ordered list of event signature strings sufficient to decode `events`.
    ///
    /// Invariant: every hash in `events` must correspond to exactly one
    /// signature in `abi`, and `abi` must not contain ambiguous signatures
    /// (two signatures hashing to the same topic-0 is a contradiction the
    /// config store is expected to prevent; the decoder does not re-check it
    /// beyond a single unambiguous lookup).
    pub abi: Vec<String>,
    /// Whether this contract is currently monitored.
    pub enabled: bool,
    /// Decimals, stablecoin flag, priority, and other enrichment metadata.
    pub metadata: ContractMetadata,
}

/// Enrichment metadata nested in `ContractConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractMetadata {
    /// Token decimals, used to scale raw transfer amounts.
    pub decimals: u8,
    /// Whether this token uses the lower (stablecoin) large-transfer threshold.
    #[serde(default)]
    pub is_stablecoin: bool,
    /// Operator-assigned priority; `"high"` escalates transfer handler log level.
    #[serde(default)]
    pub priority: Option<String>,
}

impl ContractConfig {
    /// Stablecoin large-transfer threshold (spec.md §4.4).
    pub const LARGE_TRANSFER_THRESHOLD_STABLE: u64 = 100_000;
    /// Non-stablecoin large-transfer threshold (spec.md §4.4).
    pub const LARGE_TRANSFER_THRESHOLD_DEFAULT: u64 = 1_000_000;

    /// Resolve the event name for a topic-0 hash via this contract's ABI.
    ///
    /// Returns `None` if the topic isn't in `events`, matching the push
    /// listener's "drop if missing" contract for unrecognized logs.
    #[must_use]
    pub fn contains_event(&self, topic: TopicHash) -> bool {
        self.events.contains(&topic)
    }

    /// Whether `amount` (already scaled by `decimals`) meets this contract's
    /// large-transfer threshold.
    #[must_use]
    pub fn is_large_transfer(&self, scaled_amount: &TokenAmount) -> bool {
        let threshold = if self.metadata.is_stablecoin {
            Self::LARGE_TRANSFER_THRESHOLD_STABLE
        } else {
            Self::LARGE_TRANSFER_THRESHOLD_DEFAULT
        };
        *scaled_amount >= TokenAmount::parse(&threshold.to_string()).unwrap_or_default()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTRACT DATA
// ═══════════════════════════════════════════════════════════════════════════════

/// Cached runtime facts about a contract, updated by handlers as events arrive.
///
/// Identity is `(chain_id, contract_address)`, unique. Created on first
/// observed event for that contract; never destroyed, only deactivated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractData {
    /// Chain this contract lives on.
    pub chain_id: ChainId,
    /// Contract address.
    pub contract_address: EthAddress,
    /// Contract type, e.g. "erc20".
    pub contract_type: String,
    /// `"{type}_{chainId}"`, used to group contracts of the same type/chain.
    pub collection_key: String,
    /// Token name.
    pub name: String,
    /// Token symbol.
    pub symbol: String,
    /// Token decimals.
    pub decimals: u8,
    /// Total supply, if known.
    pub total_supply: Option<TokenAmount>,
    /// Contract owner address, if known.
    pub owner: Option<EthAddress>,
    /// Whether this contract is still considered active.
    pub is_active: bool,
    /// Last time this record was updated.
    pub last_updated: DateTime<Utc>,
    /// First block at which an event for this contract was observed.
    pub first_seen_block: Option<BlockNumber>,
    /// Highest block number fully processed for this contract. Monotonically
    /// non-decreasing across any sequence of handler invocations.
    pub last_processed_block: Option<BlockNumber>,
    /// Configured starting block (from `ContractConfig`, if a backfill start
    /// was set). Must be `<= first_seen_block` once both are defined.
    pub start_from_block: Option<BlockNumber>,
    /// Transfer counters and other enrichment stats.
    pub metadata: ContractDataMetadata,
}

/// Enrichment counters nested in `ContractData`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContractDataMetadata {
    /// Total number of transfers observed.
    pub transfer_count: u64,
    /// Number of those transfers classified as large.
    pub large_transfer_count: u64,
    /// Timestamp of the most recent transfer, if any.
    pub last_transfer_timestamp: Option<DateTime<Utc>>,
}

impl ContractData {
    /// Build the `collection_key` for a contract type and chain id.
    #[must_use]
    pub fn collection_key(contract_type: &str, chain_id: ChainId) -> String {
        format!("{contract_type}_{chain_id}")
    }

    /// Fold in a newly observed block, enforcing the monotonic
    /// `last_processed_block` invariant (spec.md §3, §8).
    pub fn observe_block(&mut self, block: BlockNumber) {
        self.first_seen_block.get_or_insert(block);
        self.last_processed_block = Some(match self.last_processed_block {
            Some(current) if current >= block => current,
            _ => block,
        });
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCKCHAIN EVENT
// ═══════════════════════════════════════════════════════════════════════════════

/// A persisted, decoded log.
///
/// Identity is `(chain_id, transaction_hash, log_index)`, enforced by a unique
/// index at the event store. Created on first successful decode; immutable
/// thereafter (handlers never mutate a persisted `BlockchainEvent`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockchainEvent {
    /// Database identifier, assigned on insert.
    pub id: Uuid,
    /// Chain this event occurred on.
    pub chain_id: ChainId,
    /// Transaction hash.
    pub transaction_hash: String,
    /// Index of the log within the transaction.
    pub log_index: u64,
    /// Block number.
    pub block_number: BlockNumber,
    /// Block timestamp in Unix milliseconds (0 if unresolved).
    pub timestamp_ms: i64,
    /// Event category; currently always `"contract_log"`.
    pub event_type: String,
    /// Contract address that emitted this event.
    pub contract_address: EthAddress,
    /// Decoded payload and surrounding log data.
    pub data: BlockchainEventData,
    /// Whether downstream processing of this event has completed.
    pub processed: bool,
    /// When `processed` was set.
    pub processed_at: Option<DateTime<Utc>>,
    /// Free-form result of downstream processing (e.g. classification outcome).
    pub processing_result: Option<serde_json::Value>,
}

/// The `data` payload of a `BlockchainEvent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockchainEventData {
    /// Full topic list (including topic-0), as 0x-hex strings.
    pub topics: Vec<String>,
    /// Raw, undecoded log data as 0x-hex.
    pub raw_data: String,
    /// Index of this log within the transaction.
    pub log_index: u64,
    /// Index of the transaction within the block.
    pub transaction_index: u64,
    /// Gas used by the transaction, if resolved (pull listener fetches it
    /// on the first log of a new transaction).
    pub gas_used: Option<u64>,
    /// Transaction status (`1` success, `0` reverted), if resolved.
    pub tx_status: Option<u8>,
    /// Denormalized contract identity, for query convenience.
    pub contract: ContractIdentity,
    /// Decoded event name, signature, and arguments.
    pub event: EventPayload,
}

/// Denormalized contract identity embedded in a `BlockchainEvent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractIdentity {
    /// Token/contract name at the time of ingestion.
    pub name: String,
    /// Token/contract symbol at the time of ingestion.
    pub symbol: String,
    /// Contract type, e.g. "erc20".
    pub contract_type: String,
}

/// Decoded event name, signature, and argument payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Event name, e.g. "Transfer".
    pub name: String,
    /// Canonical event signature, e.g. "Transfer(address,address,uint256)".
    pub signature: String,
    /// Decoded arguments, as a JSON object.
    pub args: serde_json::Value,
}

/// Processing-result fields the transfer handler attaches to a persisted
/// `Transfer` record (spec.md §4.6's "derived field in the persisted record").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferProcessingResult {
    /// Mint / burn / transfer classification.
    pub transfer_type: TransferType,
    /// `valueFormatted` parsed back to a number (commas stripped).
    pub token_amount: TokenAmount,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
