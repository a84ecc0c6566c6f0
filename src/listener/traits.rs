//! The `Listener` trait shared by the push and pull listeners (spec.md §4.2, §4.3).

use async_trait::async_trait;

use crate::types::entities::ContractConfig;
use crate::types::enums::ListenerState;

/// A running ingestion strategy for one chain.
///
/// `start`/`stop` drive the lifecycle state machine (`Stopped -> Starting ->
/// Running -> Reconnecting -> Running | Stopped | Failed`). Both are
/// idempotent: calling `start` while already `Running` or `stop` while
/// already `Stopped` logs a warning and returns `Ok(())` rather than erroring.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Begin ingesting. No-op-with-warning if already running.
    async fn start(&self) -> crate::error::Result<()>;

    /// Stop ingesting, releasing the underlying transport. No-op-with-warning
    /// if already stopped.
    async fn stop(&self) -> crate::error::Result<()>;

    /// Current lifecycle state.
    fn state(&self) -> ListenerState;

    /// Highest block number this listener has fully processed, if any.
    fn head_block(&self) -> Option<u64>;

    /// Replace the monitored contract set, used by the config reload loop
    /// (spec.md §2 item 2) to push a freshly-loaded enabled set down to a
    /// running listener without restarting it.
    fn update_contracts(&self, contracts: Vec<ContractConfig>);
}
