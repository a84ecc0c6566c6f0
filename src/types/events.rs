//! Decoded event payloads produced by the log decoder.
//!
//! The source dynamically dispatches on string-typed event payloads (see
//! `SPEC_FULL.md` §9); here that becomes a tagged union (`DecodedEvent`) plus a
//! topic-0 -> decoder registry (`crate::decoder`). Every decoded event carries
//! the same `EventMetadata` envelope regardless of which arm it ends up in.

use alloy::primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::primitives::TokenAmount;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT METADATA
// ═══════════════════════════════════════════════════════════════════════════════

/// Metadata attached to every decoded event, independent of which event it is.
///
/// This provides the positional context (`block_number`, `log_index`, …) that
/// `BlockchainEvent`'s identity and ordering invariants are built on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Block number where the event was emitted.
    pub block_number: u64,
    /// Hash of the block containing this event.
    pub block_hash: B256,
    /// Transaction hash that emitted this event.
    pub tx_hash: B256,
    /// Index of the transaction within the block.
    pub tx_index: u64,
    /// Index of the log within the transaction.
    pub log_index: u64,
    /// Timestamp of the block. Defaults to the Unix epoch if unresolved
    /// (spec.md §4.3 step 5: "missing timestamps default to 0").
    pub timestamp: DateTime<Utc>,
    /// Contract address that emitted this event.
    pub contract: Address,
    /// Gas used by the transaction, resolved by the pull listener from the
    /// transaction receipt on the first log of a new transaction within a
    /// tick. Always `None` on the push listener, which never fetches receipts.
    pub gas_used: Option<u64>,
    /// Transaction status (`1` success, `0` reverted) from the same receipt.
    pub tx_status: Option<u8>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECODED EVENT (tagged union, spec.md §9)
// ═══════════════════════════════════════════════════════════════════════════════

/// A log decoded against a contract's configured ABI.
///
/// `Transfer` and `Approval` are the built-in, fully-typed arms (spec.md §4.4).
/// `Raw` is the catch-all for any other configured event: its topics/data are
/// preserved undecoded so a handler with bespoke knowledge of the contract can
/// still consume it, without the decoder needing a typed struct per signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "PascalCase")]
#[non_exhaustive]
pub enum DecodedEvent {
    /// ERC-20 `Transfer(address,address,uint256)`.
    Transfer(TransferArgs),
    /// ERC-20 `Approval(address,address,uint256)`.
    Approval(ApprovalArgs),
    /// Any other configured event, left undecoded beyond topics/data.
    Raw(RawArgs),
}

impl DecodedEvent {
    /// Event type name, used for logging and `BlockchainEvent.data.event.name`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Transfer(_) => "Transfer",
            Self::Approval(_) => "Approval",
            Self::Raw(_) => "Raw",
        }
    }
}

/// Decoded arguments of an ERC-20 `Transfer` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferArgs {
    /// Sender address (the zero address for mints).
    pub from: Address,
    /// Recipient address (the zero address for burns).
    pub to: Address,
    /// Raw (un-scaled) transfer amount.
    pub value_raw: U256,
    /// `valueRaw` scaled by the contract's decimals, capped at 6 fractional
    /// digits (spec.md §4.4's deliberately lossy formula).
    pub value_formatted: TokenAmount,
    /// Whether the scaled amount meets the large-transfer threshold.
    pub is_large_transfer: bool,
}

/// Decoded arguments of an ERC-20 `Approval` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalArgs {
    /// Token owner.
    pub owner: Address,
    /// Approved spender.
    pub spender: Address,
    /// Raw (un-scaled) approved amount.
    pub value_raw: U256,
    /// Scaled approved amount, same formula as `TransferArgs::value_formatted`.
    pub value_formatted: TokenAmount,
}

/// Undecoded event: topics and data preserved verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawArgs {
    /// Full topic list, including topic-0.
    pub topics: Vec<B256>,
    /// Raw log data.
    pub data: Vec<u8>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
