//! Event handler ports and implementations (spec.md §4.6).
//!
//! `EventHandler` is the single port every handler implements; the
//! dispatcher consults `can_handle` on every queued event and invokes
//! `handle` concurrently across all matching handlers. `TransferHandler` is
//! the only built-in implementation — classification, counters, and
//! persistence for ERC-20 `Transfer` events.

pub mod traits;
mod transfer_handler;

pub use traits::EventHandler;
pub use transfer_handler::TransferHandler;
