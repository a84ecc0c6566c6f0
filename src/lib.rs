//! Multi-chain blockchain indexer: ingestion and dispatch core.
//!
//! Continuously ingests smart-contract log events from many EVM-compatible
//! networks, decodes them against per-contract schemas, enriches them with
//! semantic metadata (token value scaling, whale flags, mint/burn
//! classification), and persists exactly-once-per-log records.
//!
//! The HTTP control surface, the seeding of default configuration rows, and
//! metrics/log shipping are explicitly out of scope for this crate; the
//! config store and event store are the external collaborators this core
//! talks to through [`ports`].
//!
//! # Architecture
//!
//! Hexagonal: the core only depends on the [`ports::ConfigStore`] and
//! [`ports::EventStore`] traits, never on `store::PostgresStore` directly.
//!
//! ```text
//! Config store ──▶ ChainAdapter ──▶ Listener (push|pull) ──▶ Dispatcher ──▶ Handlers ──▶ Event store
//!                       ▲                  ▲
//!                       └── Supervisor ────┴── ConfigReloader
//! ```
//!
//! # Modules
//!
//! - [`types`] - domain types (enums, events, entities, primitives)
//! - [`error`] - layered error types
//! - [`config`] - process-wide settings loading
//! - [`abi`] - ABI bindings for the built-in `Transfer`/`Approval` events
//! - [`chain`] - chain adapters, one per (chain, transport) pair
//! - [`listener`] - push and pull ingestion strategies
//! - [`decoder`] - ABI-driven log decoding
//! - [`dispatcher`] - single-worker cooperative event dispatcher
//! - [`handlers`] - event handlers (the built-in transfer handler)
//! - [`supervisor`] - chain/listener lifecycle management
//! - [`config_reloader`] - periodic reconciliation of the managed chain set
//! - [`ports`] - external-system boundaries (config store, event store, clock)
//! - [`store`] - the `Postgres`-backed `ConfigStore`/`EventStore` implementation
//!
//! # Getting Started
//!
//! ```bash
//! cp config/default.toml config/local.toml
//! # Edit config/local.toml with your database and chain configuration
//!
//! sqlx migrate run
//!
//! cargo run -- run
//! ```

pub mod abi;
pub mod chain;
pub mod config;
pub mod config_reloader;
pub mod decoder;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod listener;
pub mod ports;
pub mod store;
pub mod supervisor;
pub mod types;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version string.
#[must_use]
pub const fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
        assert!(version().starts_with("0."));
    }
}
