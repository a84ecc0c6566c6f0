//! Validated primitive types for domain entities.
//!
//! These newtypes provide:
//! - Type safety (can't accidentally pass amount as address)
//! - Validation at construction time
//! - Domain semantics in function signatures

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, B256, U256};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ETHEREUM ADDRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// Validated 20-byte Ethereum address.
///
/// This newtype ensures addresses are always exactly 20 bytes and always
/// compared/stored in normalized lowercase-hex form.
/// Use `Address` from `alloy-primitives` for on-chain interaction,
/// but this type for persistence and domain logic.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EthAddress([u8; 20]);

impl EthAddress {
    /// Create from a fixed-size array (infallible).
    #[must_use]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Try to create from a byte slice.
    ///
    /// # Errors
    /// Returns `InvalidAddress::WrongLength` if the slice is not exactly 20 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self, InvalidAddress> {
        let bytes: [u8; 20] = slice
            .try_into()
            .map_err(|_| InvalidAddress::WrongLength(slice.len()))?;
        Ok(Self(bytes))
    }

    /// Parse from hex string (with or without 0x prefix).
    ///
    /// # Errors
    /// Returns `InvalidAddress` if the string is not valid hex or wrong length.
    pub fn from_hex(s: &str) -> Result<Self, InvalidAddress> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 40 {
            return Err(InvalidAddress::WrongLength(s.len() / 2));
        }
        let bytes = hex::decode(s).map_err(|_| InvalidAddress::InvalidHex)?;
        Self::from_slice(&bytes)
    }

    /// Get the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Get as a byte slice.
    #[must_use]
    pub const fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Convert to lowercase hex string with 0x prefix.
    ///
    /// `ContractConfig`'s `address` is normalized to this form at the store
    /// boundary, so this is always the canonical representation.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Check if this is the zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// The zero address (0x0000...0000). Used to classify mint/burn transfers.
    pub const ZERO: Self = Self([0u8; 20]);
}

impl fmt::Debug for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EthAddress({})", self.to_hex())
    }
}

impl fmt::Display for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<EthAddress> for String {
    fn from(addr: EthAddress) -> Self {
        addr.to_hex()
    }
}

impl TryFrom<String> for EthAddress {
    type Error = InvalidAddress;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl TryFrom<&str> for EthAddress {
    type Error = InvalidAddress;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::from_hex(s)
    }
}

impl From<[u8; 20]> for EthAddress {
    fn from(bytes: [u8; 20]) -> Self {
        Self::new(bytes)
    }
}

impl From<Address> for EthAddress {
    fn from(addr: Address) -> Self {
        Self::new(addr.0.0)
    }
}

impl From<EthAddress> for Address {
    fn from(addr: EthAddress) -> Self {
        Self::from(addr.0)
    }
}

/// Error for invalid Ethereum addresses.
#[derive(Debug, Clone, Error)]
pub enum InvalidAddress {
    /// Address has wrong byte length.
    #[error("wrong length: expected 20 bytes, got {0}")]
    WrongLength(usize),
    /// Address contains invalid hex characters.
    #[error("invalid hex encoding")]
    InvalidHex,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN ID
// ═══════════════════════════════════════════════════════════════════════════════

/// 64-bit chain identifier, unique across the `chain_configs` collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(i64);

impl ChainId {
    /// Create a new chain id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the value.
    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for ChainId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for i64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOPIC HASH (event topic-0)
// ═══════════════════════════════════════════════════════════════════════════════

/// 32-byte keccak-256 hash identifying an event's canonical signature.
///
/// This is the first entry of an EVM log's topic list (`topic0`). `ContractConfig`
/// stores an ordered list of these to select which events a listener subscribes
/// to; the ABI's signature strings must decode exactly this set.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TopicHash([u8; 32]);

impl TopicHash {
    /// Create from a fixed-size array (infallible).
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse from hex string (with or without 0x prefix).
    ///
    /// # Errors
    /// Returns `InvalidTopicHash` if the string is not valid hex or wrong length.
    pub fn from_hex(s: &str) -> Result<Self, InvalidTopicHash> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 64 {
            return Err(InvalidTopicHash::WrongLength(s.len() / 2));
        }
        let bytes = hex::decode(s).map_err(|_| InvalidTopicHash::InvalidHex)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| InvalidTopicHash::WrongLength(v.len()))?;
        Ok(Self(arr))
    }

    /// Convert to lowercase hex string with 0x prefix.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Get the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for TopicHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TopicHash({})", self.to_hex())
    }
}

impl fmt::Display for TopicHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<B256> for TopicHash {
    fn from(hash: B256) -> Self {
        Self(hash.0)
    }
}

impl From<TopicHash> for B256 {
    fn from(hash: TopicHash) -> Self {
        Self::from(hash.0)
    }
}

impl From<TopicHash> for String {
    fn from(hash: TopicHash) -> Self {
        hash.to_hex()
    }
}

impl TryFrom<String> for TopicHash {
    type Error = InvalidTopicHash;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

/// Error for invalid topic hashes.
#[derive(Debug, Clone, Error)]
pub enum InvalidTopicHash {
    /// Hash has wrong byte length.
    #[error("wrong length: expected 32 bytes, got {0}")]
    WrongLength(usize),
    /// Hash contains invalid hex characters.
    #[error("invalid hex encoding")]
    InvalidHex,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN AMOUNT
// ═══════════════════════════════════════════════════════════════════════════════

/// Non-negative token amount with arbitrary precision.
///
/// Backed by `BigDecimal` for exact arithmetic. Amounts are always non-negative.
/// Use this type for database persistence and domain logic. For on-chain
/// interaction, convert to/from `U256`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenAmount(BigDecimal);

impl TokenAmount {
    /// Zero amount.
    #[must_use]
    pub fn zero() -> Self {
        Self(BigDecimal::from(0))
    }

    /// Create from `BigDecimal`, validating non-negative.
    ///
    /// # Errors
    /// Returns `InvalidAmount::Negative` if value is negative.
    pub fn new(value: BigDecimal) -> Result<Self, InvalidAmount> {
        if value.sign() == bigdecimal::num_bigint::Sign::Minus {
            return Err(InvalidAmount::Negative);
        }
        Ok(Self(value))
    }

    /// Parse from string representation.
    ///
    /// # Errors
    /// Returns `InvalidAmount` if parsing fails or value is negative.
    pub fn parse(s: &str) -> Result<Self, InvalidAmount> {
        let value = BigDecimal::from_str(s).map_err(|_| InvalidAmount::ParseError)?;
        Self::new(value)
    }

    /// Create from `U256` (wei) with decimals.
    ///
    /// Converts a raw token amount (e.g., wei for 18 decimal tokens)
    /// to a human-readable decimal value.
    #[must_use]
    pub fn from_wei(wei: U256, decimals: u8) -> Self {
        let wei_str = wei.to_string();
        let value = BigDecimal::from_str(&wei_str).unwrap_or_default()
            / BigDecimal::from(10_u64.pow(u32::from(decimals)));
        Self(value)
    }

    /// Get the underlying `BigDecimal`.
    #[must_use]
    pub const fn as_decimal(&self) -> &BigDecimal {
        &self.0
    }

    /// Convert to wei (`U256`) given decimals.
    ///
    /// Converts a human-readable amount to raw token units.
    #[must_use]
    pub fn to_wei(&self, decimals: u8) -> U256 {
        let scaled = &self.0 * BigDecimal::from(10_u64.pow(u32::from(decimals)));
        let int_str = scaled
            .to_string()
            .split('.')
            .next()
            .unwrap_or("0")
            .to_string();
        U256::from_str(&int_str).unwrap_or_default()
    }

    /// Check if zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.sign() == bigdecimal::num_bigint::Sign::NoSign
    }

    /// Saturating addition.
    #[must_use]
    pub fn saturating_add(&self, other: &Self) -> Self {
        Self(&self.0 + &other.0)
    }

    /// Saturating subtraction (floors at zero).
    #[must_use]
    pub fn saturating_sub(&self, other: &Self) -> Self {
        let result = &self.0 - &other.0;
        if result.sign() == bigdecimal::num_bigint::Sign::Minus {
            Self::zero()
        } else {
            Self(result)
        }
    }

    /// Convert to `sqlx::types::BigDecimal` for database storage.
    #[must_use]
    pub fn to_bigdecimal(&self) -> sqlx::types::BigDecimal {
        self.0.to_string().parse().unwrap_or_default()
    }

    /// Create from `sqlx::types::BigDecimal`.
    #[must_use]
    pub fn from_bigdecimal(value: &sqlx::types::BigDecimal) -> Self {
        let s = value.to_string();
        Self::parse(&s).unwrap_or_else(|_| Self::zero())
    }
}

impl fmt::Debug for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenAmount({})", self.0)
    }
}

impl fmt::Display for TokenAmount {
    /// Renders en-US locale style: thousands-grouped integer part, fractional
    /// part clamped to 2-6 digits (spec.md §4.4/§8 — this is the string that
    /// gets persisted as `valueFormatted`, not just a debug aid).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_en_us(&self.0))
    }
}

/// Render `value` with en-US thousands grouping and a fractional part
/// clamped between 2 and 6 digits. The value's own fractional digit count is
/// kept as-is when it already falls in that range (so `format_amount`'s
/// fixed 6-digit scale round-trips untouched); only out-of-range values are
/// padded up to 2 digits or rounded down to 6.
fn format_en_us(value: &BigDecimal) -> String {
    let natural = value.to_string();
    let frac_len = natural.split_once('.').map_or(0, |(_, frac)| frac.len());
    let target_scale = i64::try_from(frac_len.clamp(2, 6)).unwrap_or(2);

    let fixed = value.with_scale(target_scale).to_string();
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    format!("{}.{}", group_thousands(int_part), frac_part)
}

/// Insert en-US thousands separators into a non-negative decimal integer string.
fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

impl From<TokenAmount> for String {
    fn from(amount: TokenAmount) -> Self {
        amount.0.to_string()
    }
}

impl TryFrom<String> for TokenAmount {
    type Error = InvalidAmount;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl Default for TokenAmount {
    fn default() -> Self {
        Self::zero()
    }
}

impl PartialOrd for TokenAmount {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TokenAmount {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

/// Error for invalid token amounts.
#[derive(Debug, Clone, Error)]
pub enum InvalidAmount {
    /// Amount cannot be negative.
    #[error("amount cannot be negative")]
    Negative,
    /// Failed to parse amount string.
    #[error("failed to parse amount")]
    ParseError,
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK NUMBER (for type clarity)
// ═══════════════════════════════════════════════════════════════════════════════

/// Block number newtype for clarity in function signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockNumber(u64);

impl BlockNumber {
    /// Create a new block number.
    #[must_use]
    pub const fn new(n: u64) -> Self {
        Self(n)
    }

    /// Get the value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Alias for `get()` for consistency with other newtypes.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Returns the next block number (saturating at `u64::MAX`).
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Returns the previous block number (saturating at 0).
    #[must_use]
    pub const fn prev(&self) -> Self {
        Self(self.0.saturating_sub(1))
    }
}

impl From<u64> for BlockNumber {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

impl From<BlockNumber> for u64 {
    fn from(b: BlockNumber) -> Self {
        b.0
    }
}

impl From<BlockNumber> for i64 {
    #[allow(clippy::cast_possible_wrap)]
    fn from(b: BlockNumber) -> Self {
        b.0 as Self
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
