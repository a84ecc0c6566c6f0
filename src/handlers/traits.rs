//! The `EventHandler` port consulted by the dispatcher (spec.md §5, §4.6).

use alloy::rpc::types::Log;
use async_trait::async_trait;

use crate::error::Result;
use crate::types::entities::ContractConfig;
use crate::types::events::{DecodedEvent, EventMetadata};

/// A handler registered with `crate::dispatcher::EventDispatcher`.
///
/// `can_handle` is a cheap, synchronous filter checked for every queued
/// event; `handle` does the actual (possibly fallible) work. A handler
/// returning `Err` is logged and otherwise ignored — one handler's failure
/// never blocks another handler or the next queued event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs when this handler's `handle` call fails.
    fn name(&self) -> &'static str;

    /// Whether this handler processes the given event variant.
    fn can_handle(&self, event: &DecodedEvent) -> bool;

    /// Process one decoded event.
    ///
    /// # Errors
    /// Returns any error from the underlying store or downstream dependency;
    /// the dispatcher logs and swallows it rather than propagating it.
    async fn handle(
        &self,
        contract: &ContractConfig,
        meta: &EventMetadata,
        event: &DecodedEvent,
        raw_log: &Log,
    ) -> Result<()>;
}
