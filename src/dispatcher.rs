//! Single-worker cooperative event dispatcher (spec.md §5).
//!
//! Listeners enqueue decoded events; a single background drain loop pops
//! them in FIFO order and runs every registered handler whose `can_handle`
//! matches, concurrently, joining before advancing to the next event. At
//! most one drain loop runs at a time — whichever caller finds the queue
//! idle becomes the drainer, and keeps draining until the queue is empty.
//!
//! The queue is bounded (`DEFAULT_QUEUE_CAPACITY`); once full, the oldest
//! entry is dropped to make room for the new one and a warning is logged.
//! Dropping is chosen over blocking the calling listener, since a listener
//! blocked on a full queue can't advance its own rate-limited scan loop.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use alloy::rpc::types::Log;
use futures::future::join_all;
use parking_lot::Mutex;
use tracing::warn;

use crate::handlers::traits::EventHandler;
use crate::types::entities::ContractConfig;
use crate::types::events::{DecodedEvent, EventMetadata};

/// Default bound on the pending-event queue (spec.md §5 Open Question:
/// unbounded queues risk unbounded memory under a stalled handler, so this
/// picks a generous but finite bound and a drop-oldest policy — see
/// `DESIGN.md`).
pub const DEFAULT_QUEUE_CAPACITY: usize = 100_000;

struct QueueItem {
    contract: ContractConfig,
    meta: EventMetadata,
    event: DecodedEvent,
    raw_log: Log,
}

/// Dispatches decoded events to registered handlers.
pub struct EventDispatcher {
    queue: Mutex<VecDeque<QueueItem>>,
    handlers: Mutex<Vec<Arc<dyn EventHandler>>>,
    capacity: usize,
    draining: AtomicBool,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("queue_size", &self.queue_size())
            .field("handler_count", &self.handler_count())
            .field("draining", &self.draining.load(Ordering::SeqCst))
            .finish()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl EventDispatcher {
    /// Build a dispatcher with the given queue capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            handlers: Mutex::new(Vec::new()),
            capacity,
            draining: AtomicBool::new(false),
        }
    }

    /// Register a handler. Handlers are consulted in registration order.
    pub fn register_handler(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.lock().push(handler);
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Number of events currently queued.
    #[must_use]
    pub fn queue_size(&self) -> usize {
        self.queue.lock().len()
    }

    /// Drop all pending events without processing them.
    pub fn clear_queue(&self) {
        self.queue.lock().clear();
    }

    /// Enqueue a decoded event for dispatch and, if no drain loop is
    /// currently running, spawn one.
    pub fn dispatch_event(
        self: &Arc<Self>,
        contract: ContractConfig,
        meta: EventMetadata,
        event: DecodedEvent,
        raw_log: Log,
    ) {
        {
            let mut queue = self.queue.lock();
            if queue.len() >= self.capacity {
                queue.pop_front();
                warn!(
                    capacity = self.capacity,
                    "event queue at capacity, dropping oldest entry"
                );
            }
            queue.push_back(QueueItem {
                contract,
                meta,
                event,
                raw_log,
            });
        }
        self.ensure_draining();
    }

    fn ensure_draining(self: &Arc<Self>) {
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.drain_loop().await });
        }
    }

    async fn drain_loop(self: Arc<Self>) {
        loop {
            let item = { self.queue.lock().pop_front() };
            let Some(item) = item else {
                self.draining.store(false, Ordering::SeqCst);
                // A concurrent dispatch_event may have enqueued between the
                // pop above and clearing the flag; if so, take over draining
                // rather than leaving the item stranded.
                if !self.queue.lock().is_empty() {
                    self.ensure_draining();
                }
                return;
            };

            let handlers: Vec<_> = self
                .handlers
                .lock()
                .iter()
                .filter(|h| h.can_handle(&item.event))
                .cloned()
                .collect();

            let invocations = handlers.iter().map(|handler| {
                let contract = &item.contract;
                let meta = &item.meta;
                let event = &item.event;
                let raw_log = &item.raw_log;
                async move {
                    if let Err(err) = handler.handle(contract, meta, event, raw_log).await {
                        warn!(
                            handler = handler.name(),
                            error = %err,
                            event = event.name(),
                            "handler failed, swallowing error"
                        );
                    }
                }
            });
            join_all(invocations).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use alloy::primitives::{Address, B256, Bytes, Log as PrimitiveLog};
    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::types::entities::ContractMetadata;
    use crate::types::events::{RawArgs, TransferArgs};
    use crate::types::primitives::{ChainId, EthAddress, TokenAmount};

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn can_handle(&self, event: &DecodedEvent) -> bool {
            matches!(event, DecodedEvent::Transfer(_))
        }

        async fn handle(
            &self,
            _contract: &ContractConfig,
            _meta: &EventMetadata,
            _event: &DecodedEvent,
            _raw_log: &Log,
        ) -> crate::error::Result<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn sample_contract() -> ContractConfig {
        ContractConfig {
            chain_id: ChainId::new(1),
            address: EthAddress::ZERO,
            name: "Test".to_string(),
            symbol: "TST".to_string(),
            contract_type: "erc20".to_string(),
            events: vec![],
            abi: vec![],
            enabled: true,
            metadata: ContractMetadata {
                decimals: 18,
                is_stablecoin: false,
                priority: None,
            },
        }
    }

    fn sample_meta() -> EventMetadata {
        EventMetadata {
            block_number: 1,
            block_hash: B256::ZERO,
            tx_hash: B256::ZERO,
            tx_index: 0,
            log_index: 0,
            timestamp: Utc::now(),
            contract: Address::ZERO,
            gas_used: None,
            tx_status: None,
        }
    }

    fn sample_log() -> Log {
        Log {
            inner: PrimitiveLog {
                address: Address::ZERO,
                data: alloy::primitives::LogData::new_unchecked(vec![], Bytes::new()),
            },
            block_hash: Some(B256::ZERO),
            block_number: Some(1),
            block_timestamp: None,
            transaction_hash: Some(B256::ZERO),
            transaction_index: Some(0),
            log_index: Some(0),
            removed: false,
        }
    }

    #[tokio::test]
    async fn dispatched_transfer_reaches_matching_handler_only() {
        let dispatcher = Arc::new(EventDispatcher::default());
        let count = Arc::new(AtomicUsize::new(0));
        dispatcher.register_handler(Arc::new(CountingHandler {
            count: Arc::clone(&count),
        }));

        let transfer = DecodedEvent::Transfer(TransferArgs {
            from: Address::ZERO,
            to: Address::repeat_byte(1),
            value_raw: alloy::primitives::U256::from(1),
            value_formatted: TokenAmount::zero(),
            is_large_transfer: false,
        });
        let raw = DecodedEvent::Raw(RawArgs {
            topics: vec![],
            data: vec![],
        });

        dispatcher.dispatch_event(sample_contract(), sample_meta(), transfer, sample_log());
        dispatcher.dispatch_event(sample_contract(), sample_meta(), raw, sample_log());

        // Give the spawned drain loop a chance to run.
        for _ in 0..50 {
            if count.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn queue_drops_oldest_when_full() {
        let dispatcher = Arc::new(EventDispatcher::new(1));
        // Block the drain loop from running by never awaiting: push directly
        // into the queue to test capacity enforcement in isolation.
        {
            let mut queue = dispatcher.queue.lock();
            queue.push_back(QueueItem {
                contract: sample_contract(),
                meta: sample_meta(),
                event: DecodedEvent::Raw(RawArgs {
                    topics: vec![],
                    data: vec![],
                }),
                raw_log: sample_log(),
            });
        }
        assert_eq!(dispatcher.queue_size(), 1);
        dispatcher.clear_queue();
        assert_eq!(dispatcher.queue_size(), 0);
    }
}
