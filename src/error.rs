//! Layered error types for the indexing core.
//!
//! - [`IngestError`] - the per-error-kind taxonomy the supervision model
//!   dispatches on (spec.md §7): `ConfigMismatch`, `TransportUnavailable`,
//!   `StrategyUnavailable`, `TransientRpc`, `DecodeFailed`, `DuplicateEvent`,
//!   `HandlerError`, `Exhausted`.
//! - [`InfraError`] - lower-level infrastructure failures (database, RPC
//!   transport, config loading) that get folded into an `IngestError` at the
//!   boundary where enough context exists to classify them.
//! - [`AppError`] - top-level error type for the binary entry point.
//!
//! # Error philosophy
//!
//! Every error kind in spec.md §7 carries an explicit disposition (skip,
//! retry, reconnect, stop listener, warn-and-drop, silent); callers match on
//! `IngestError` variants rather than stringly-typed messages to act on that
//! disposition. Infrastructure errors are logged with full detail; only the
//! classified `IngestError` crosses component boundaries.

use thiserror::Error;

use crate::types::primitives::{ChainId, InvalidAddress, InvalidAmount, InvalidTopicHash};

// ═══════════════════════════════════════════════════════════════════════════════
// INGEST ERRORS (spec.md §7 taxonomy)
// ═══════════════════════════════════════════════════════════════════════════════

/// Error taxonomy for chain adapters, listeners, the decoder, and handlers.
///
/// Each variant corresponds exactly to a row of spec.md §7's error table; the
/// disposition (what the caller does next) is documented per variant rather
/// than encoded in the type, since it depends on which component observed
/// the error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IngestError {
    /// The chain's advertised id doesn't match the configured `ChainId`.
    /// Fatal for that chain: the adapter refuses to connect.
    #[error("chain {configured} reports id {reported} at connect time")]
    ConfigMismatch {
        /// The `ChainId` from `ChainConfig`.
        configured: ChainId,
        /// The id the RPC endpoint actually reported.
        reported: ChainId,
    },

    /// No usable request transport (RPC URL unreachable or unset).
    #[error("chain {chain_id}: transport unavailable: {reason}")]
    TransportUnavailable {
        /// Chain this transport belongs to.
        chain_id: ChainId,
        /// Human-readable cause.
        reason: String,
    },

    /// The requested listener strategy has no usable transport (e.g. `Push`
    /// requested with no `stream_url` and no pull fallback available).
    #[error("chain {chain_id}: strategy unavailable: {reason}")]
    StrategyUnavailable {
        /// Chain this strategy was requested for.
        chain_id: ChainId,
        /// Human-readable cause.
        reason: String,
    },

    /// A transient RPC failure (timeout, 5xx, connection reset). The caller
    /// skips the current slice (pull) or begins reconnect backoff (push).
    #[error("chain {chain_id}: transient RPC error: {source}")]
    TransientRpc {
        /// Chain the request was made against.
        chain_id: ChainId,
        /// Underlying transport error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// ABI decode failed for a log that matched a configured topic-0. Logged
    /// at `warn` and dropped; does not stop the listener.
    #[error("failed to decode log (topic0={topic0}, contract={contract}): {reason}")]
    DecodeFailed {
        /// Topic-0 that matched a configured event.
        topic0: String,
        /// Contract address the log came from.
        contract: String,
        /// Decode failure reason.
        reason: String,
    },

    /// A `(chain_id, transaction_hash, log_index)` already exists in the
    /// event store. Silent skip, not an error from the caller's perspective.
    #[error("duplicate event: chain={chain_id} tx={tx_hash} log_index={log_index}")]
    DuplicateEvent {
        /// Chain the event occurred on.
        chain_id: ChainId,
        /// Transaction hash.
        tx_hash: String,
        /// Log index within the transaction.
        log_index: u64,
    },

    /// A registered handler returned an error while processing an event.
    /// Logged and swallowed; other handlers for the same event still run.
    #[error("handler {handler} failed: {source}")]
    HandlerError {
        /// Name of the handler that failed, for log correlation.
        handler: String,
        /// Underlying cause.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Reconnect attempts for a push listener exceeded the configured budget.
    /// The listener transitions to `Failed` and reports to the supervisor.
    #[error("chain {chain_id}: reconnect budget exhausted after {attempts} attempts")]
    Exhausted {
        /// Chain whose listener gave up.
        chain_id: ChainId,
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// `ChainConfig.chain_type` names a chain type with no implemented
    /// adapter (`Solana`, `Sui`). The registry stays extensible to declare
    /// these, but building an adapter for one fails rather than stubbing a
    /// fake transport (spec.md §9 Open Question).
    #[error("chain {chain_id}: chain type {chain_type} has no implemented adapter")]
    UnsupportedChainType {
        /// Chain the adapter was requested for.
        chain_id: ChainId,
        /// The declared, unimplemented chain type.
        chain_type: &'static str,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// INFRASTRUCTURE ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Lower-level infrastructure failures, folded into `IngestError` or
/// `AppError` once enough context exists to classify them.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InfraError {
    /// Database error from the event/config store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON (de)serialization error, typically on a config-store JSON column.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading/parsing error.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Connection pool exhausted.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Operation timed out.
    #[error("operation timed out: {0}")]
    Timeout(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// APPLICATION ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Top-level error type for the binary entry point and supervisor.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    /// An ingestion-layer error (adapter, listener, decoder, handler).
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// An infrastructure error that couldn't be classified into `IngestError`
    /// (e.g. a store failure at startup, before any chain is involved).
    #[error(transparent)]
    Infra(#[from] InfraError),

    /// Invalid domain value encountered while loading configuration.
    #[error("invalid configuration value: {0}")]
    Config(String),

    /// Startup failed before the supervisor could begin running listeners.
    #[error("initialization error: {0}")]
    Initialization(String),

    /// Graceful shutdown was requested (e.g. SIGINT/SIGTERM) and honored.
    #[error("shutdown requested")]
    ShutdownRequested,
}

/// Type alias for application `Result`s.
pub type Result<T> = std::result::Result<T, AppError>;

// ═══════════════════════════════════════════════════════════════════════════════
// CONVENIENCE CONVERSIONS
// ═══════════════════════════════════════════════════════════════════════════════

impl From<InvalidAddress> for AppError {
    fn from(err: InvalidAddress) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<InvalidAmount> for AppError {
    fn from(err: InvalidAmount) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<InvalidTopicHash> for AppError {
    fn from(err: InvalidTopicHash) -> Self {
        Self::Config(err.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_error_config_mismatch_display() {
        let err = IngestError::ConfigMismatch {
            configured: ChainId::new(1),
            reported: ChainId::new(56),
        };
        assert!(err.to_string().contains('1'));
        assert!(err.to_string().contains("56"));
    }

    #[test]
    fn app_error_from_ingest() {
        let ingest = IngestError::Exhausted {
            chain_id: ChainId::new(1),
            attempts: 5,
        };
        let app: AppError = ingest.into();
        assert!(matches!(
            app,
            AppError::Ingest(IngestError::Exhausted { attempts: 5, .. })
        ));
    }

    #[test]
    fn app_error_from_infra() {
        let infra = InfraError::PoolExhausted;
        let app: AppError = infra.into();
        assert!(matches!(app, AppError::Infra(InfraError::PoolExhausted)));
    }
}
