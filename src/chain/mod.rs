//! Chain adapters: one per (chain, transport) pair (spec.md §4.1).
//!
//! The adapter owns connection lifecycle; the supervisor owns the map of
//! `chain_id -> ChainAdapter` and decides when adapters are created, told to
//! connect, or disconnected.

mod adapter;

pub use adapter::{ChainAdapter, OPERATION_TIMEOUT};
