//! Domain enumerations for the indexing core.
//!
//! Each enum provides:
//! - Safe conversion from/to numeric or string values
//! - Database serialization via `sqlx::Type`
//! - JSON serialization via `serde`

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN TYPE - execution environment a ChainConfig targets
// ═══════════════════════════════════════════════════════════════════════════════

/// Execution environment of a configured chain.
///
/// Only `Evm` has an implemented adapter. `Solana` and `Sui` are declared so the
/// `chain_configs` schema and the registry stay extensible, but `ChainAdapterFactory`
/// has no constructor for them yet; attempting to build one fails with
/// `StrategyUnavailable` rather than a stub adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "varchar")]
#[non_exhaustive]
pub enum ChainType {
    /// Ethereum-compatible chains (the only implemented transport).
    Evm,
    /// Solana. Declared, not implemented.
    Solana,
    /// Sui. Declared, not implemented.
    Sui,
}

impl ChainType {
    /// Human-readable name for display.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Evm => "evm",
            Self::Solana => "solana",
            Self::Sui => "sui",
        }
    }

    /// Whether this chain type has an implemented adapter.
    #[must_use]
    pub const fn is_implemented(&self) -> bool {
        matches!(self, Self::Evm)
    }
}

impl std::fmt::Display for ChainType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ChainType {
    type Err = InvalidChainType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "evm" => Ok(Self::Evm),
            "solana" => Ok(Self::Solana),
            "sui" => Ok(Self::Sui),
            other => Err(InvalidChainType(other.to_string())),
        }
    }
}

/// Error returned when an unrecognized chain type string is provided.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid chain type: {0}")]
pub struct InvalidChainType(pub String);

// ═══════════════════════════════════════════════════════════════════════════════
// LISTENER STRATEGY - how a chain's logs are ingested
// ═══════════════════════════════════════════════════════════════════════════════

/// Ingestion strategy a chain adapter mints a listener for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "varchar")]
#[non_exhaustive]
pub enum ListenerStrategy {
    /// Subscribe to the chain's streaming endpoint.
    Push,
    /// Periodically scan a bounded block range.
    Pull,
    /// Prefer push when a live streaming transport exists, else fall back to pull.
    Hybrid,
}

impl ListenerStrategy {
    /// Human-readable name for display.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pull => "pull",
            Self::Hybrid => "hybrid",
        }
    }

    /// Whether this strategy requires a streaming transport to be configured
    /// (a non-empty `streamUrl`) to run as requested.
    #[must_use]
    pub const fn requires_stream(&self) -> bool {
        matches!(self, Self::Push | Self::Hybrid)
    }
}

impl std::fmt::Display for ListenerStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ListenerStrategy {
    type Err = InvalidListenerStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(Self::Push),
            "pull" => Ok(Self::Pull),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(InvalidListenerStrategy(other.to_string())),
        }
    }
}

/// Error returned when an unrecognized listener strategy string is provided.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid listener strategy: {0}")]
pub struct InvalidListenerStrategy(pub String);

// ═══════════════════════════════════════════════════════════════════════════════
// LISTENER STATE - lifecycle state machine (spec.md §4.2)
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle state of a running listener.
///
/// Transitions: `Stopped -> Starting -> Running -> Reconnecting -> Running |
/// Stopped | Failed`. `start()` on `Running` and `stop()` on `Stopped` are
/// idempotent no-ops (logged as warnings, not errors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ListenerState {
    /// Not running; `start()` transitions to `Starting`.
    Stopped,
    /// Establishing transport and initial subscriptions.
    Starting,
    /// Actively ingesting.
    Running,
    /// Transport dropped; backoff-and-retry in progress.
    Reconnecting,
    /// Reconnect budget exhausted; stopped permanently until restarted by the supervisor.
    Failed,
}

impl ListenerState {
    /// Human-readable name for display and status snapshots.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }

    /// Whether the listener should be reported as running in a status snapshot.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running | Self::Reconnecting)
    }
}

impl std::fmt::Display for ListenerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSFER TYPE - mint/burn/transfer classification (spec.md §4.6)
// ═══════════════════════════════════════════════════════════════════════════════

/// Classification of an ERC-20 `Transfer` event by zero-address comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "varchar")]
#[non_exhaustive]
pub enum TransferType {
    /// `from` is the zero address: new supply entering circulation.
    Mint,
    /// `to` is the zero address: supply leaving circulation.
    Burn,
    /// Neither side is the zero address.
    Transfer,
}

impl TransferType {
    /// Human-readable name for display and persisted records.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mint => "mint",
            Self::Burn => "burn",
            Self::Transfer => "transfer",
        }
    }
}

impl std::fmt::Display for TransferType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
