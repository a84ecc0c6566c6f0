//! Data persistence layer (adapters for the store ports).
//!
//! This module provides the `PostgreSQL`-backed implementation of
//! [`crate::ports::store::ConfigStore`] and [`crate::ports::store::EventStore`].
//! It's the only place in the crate that knows about SQL or table layout; the
//! rest of the core talks to `Arc<dyn ConfigStore>` / `Arc<dyn EventStore>`.
//!
//! # Tables
//!
//! | Table | Identity | Purpose |
//! |-------|----------|---------|
//! | `chain_configs` | `chain_id` | operator-managed chain list |
//! | `contract_configs` | `(chain_id, address)` | operator-managed monitored contracts |
//! | `contract_data` | `(chain_id, contract_address)` | cached runtime facts, updated by handlers |
//! | `blockchain_events` | `(chain_id, transaction_hash, log_index)` unique | persisted decoded logs |
//!
//! # Usage
//!
//! ```ignore
//! use multichain_indexer::store::PostgresStore;
//! use sqlx::postgres::PgPoolOptions;
//!
//! let pool = PgPoolOptions::new()
//!     .max_connections(10)
//!     .connect("postgres://localhost/indexer")
//!     .await?;
//!
//! let store = PostgresStore::new(pool);
//! store.run_migrations().await?;
//! ```
//!
//! # Migrations
//!
//! Migrations live in `migrations/` and run via `sqlx migrate run` or
//! [`PostgresStore::run_migrations`].

mod postgres;

pub use postgres::PostgresStore;

// Re-export commonly used types for convenience
pub use sqlx::postgres::PgPool;
