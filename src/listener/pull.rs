//! Pull listener: periodic bounded block-range scanning (spec.md §4.3).
//!
//! Each tick fetches the chain's latest block, bounds the range to scan at
//! `blocks_per_scan`, then walks configured contracts in nested batches
//! (contracts → events → block ranges), sleeping between each batch layer.
//! Logs are decoded and handed to the dispatcher; the scan cursor only
//! advances once the *entire* tick's range has been drained — an error or
//! cancellation partway through a tick leaves the cursor where it was, so the
//! next tick retries the same range.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{Address, TxHash};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::{Filter, Log, TransactionReceipt};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::config::ScanSettings;
use crate::decoder;
use crate::dispatcher::EventDispatcher;
use crate::error::{IngestError, Result};
use crate::listener::traits::Listener;
use crate::types::entities::ContractConfig;
use crate::types::enums::ListenerState;
use crate::types::events::EventMetadata;
use crate::types::primitives::ChainId;

struct Inner {
    chain_id: ChainId,
    provider: DynProvider,
    contracts: RwLock<Vec<ContractConfig>>,
    dispatcher: Arc<EventDispatcher>,
    scan_interval: Duration,
    scan: ScanSettings,
    cursor: AtomicU64,
    state: Mutex<ListenerState>,
    rate_limit_calls: AtomicU64,
}

/// Periodically scans a bounded block range for configured contract events.
///
/// Cheaply `Clone`: internally an `Arc<Inner>`, so the supervisor and its
/// background scan task share the same listener state.
#[derive(Clone)]
pub struct PullListener {
    inner: Arc<Inner>,
    cancel: Arc<Mutex<Option<CancellationToken>>>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl std::fmt::Debug for PullListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PullListener")
            .field("chain_id", &self.inner.chain_id)
            .field("state", &*self.inner.state.lock())
            .field("cursor", &self.inner.cursor.load(Ordering::SeqCst))
            .finish()
    }
}

impl PullListener {
    /// Build a new pull listener starting its scan cursor at `start_block`.
    #[must_use]
    pub fn new(
        chain_id: ChainId,
        provider: DynProvider,
        contracts: Vec<ContractConfig>,
        dispatcher: Arc<EventDispatcher>,
        scan: ScanSettings,
        scan_interval_ms: u64,
        start_block: u64,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                chain_id,
                provider,
                contracts: RwLock::new(contracts),
                dispatcher,
                scan_interval: Duration::from_millis(scan_interval_ms),
                scan,
                cursor: AtomicU64::new(start_block),
                state: Mutex::new(ListenerState::Stopped),
                rate_limit_calls: AtomicU64::new(0),
            }),
            cancel: Arc::new(Mutex::new(None)),
            task: Arc::new(Mutex::new(None)),
        }
    }

    /// Swap the monitored contract set, used by the config reload loop.
    pub fn replace_contracts(&self, contracts: Vec<ContractConfig>) {
        *self.inner.contracts.write() = contracts;
    }

    fn set_state(&self, state: ListenerState) {
        *self.inner.state.lock() = state;
    }
}

impl Inner {
    /// Run one scan tick. Returns the number of logs dispatched.
    ///
    /// The cursor only advances after this method returns `Ok`; any
    /// transient failure partway through leaves it untouched so the next
    /// tick retries the same range.
    #[instrument(skip(self), fields(chain_id = %self.chain_id))]
    async fn tick(&self) -> Result<usize> {
        let from = self.cursor.load(Ordering::SeqCst);

        self.rate_limit_calls.fetch_add(1, Ordering::Relaxed);
        let latest = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| IngestError::TransientRpc {
                chain_id: self.chain_id,
                source: Box::new(e),
            })?;

        if from > latest {
            return Ok(0);
        }
        let to = latest.min(from.saturating_add(self.scan.blocks_per_scan.saturating_sub(1)));

        let contracts = self.contracts.read().clone();
        if contracts.is_empty() {
            self.cursor.store(to.saturating_add(1), Ordering::SeqCst);
            return Ok(0);
        }

        let mut all_logs: Vec<(Log, Address)> = Vec::new();

        for contract_batch in contracts.chunks(self.scan.contract_batch_size.max(1)) {
            for contract in contract_batch {
                let address: Address = contract.address.into();
                for event_batch in contract.events.chunks(self.scan.event_batch_size.max(1)) {
                    let topics: Vec<_> = event_batch.iter().map(|t| (*t).into()).collect();

                    let mut block_cursor = from;
                    while block_cursor <= to {
                        let block_end = to.min(
                            block_cursor.saturating_add(self.scan.block_batch_size.max(1) - 1),
                        );

                        let filter = Filter::new()
                            .address(address)
                            .event_signature(topics.clone())
                            .from_block(BlockNumberOrTag::Number(block_cursor))
                            .to_block(BlockNumberOrTag::Number(block_end));

                        self.rate_limit_calls.fetch_add(1, Ordering::Relaxed);
                        let logs =
                            self.provider
                                .get_logs(&filter)
                                .await
                                .map_err(|e| IngestError::TransientRpc {
                                    chain_id: self.chain_id,
                                    source: Box::new(e),
                                })?;
                        for log in logs {
                            all_logs.push((log, address));
                        }

                        block_cursor = block_end + 1;
                        if self.scan.block_batch_delay_ms > 0 && block_cursor <= to {
                            tokio::time::sleep(Duration::from_millis(
                                self.scan.block_batch_delay_ms,
                            ))
                            .await;
                        }
                    }
                    if self.scan.event_batch_delay_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(self.scan.event_batch_delay_ms))
                            .await;
                    }
                }
            }
            if self.scan.contract_batch_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.scan.contract_batch_delay_ms)).await;
            }
        }

        all_logs.sort_by_key(|(log, _)| {
            (
                log.block_number.unwrap_or_default(),
                log.log_index.unwrap_or_default(),
            )
        });

        let mut block_timestamps: HashMap<u64, DateTime<Utc>> = HashMap::new();
        let mut receipts: HashMap<TxHash, TransactionReceipt> = HashMap::new();
        let mut dispatched = 0usize;

        for (log, address) in &all_logs {
            let Some(contract) = contracts.iter().find(|c| {
                let contract_addr: Address = c.address.into();
                contract_addr == *address
            }) else {
                continue;
            };

            let block_number = log.block_number.unwrap_or(from);
            let timestamp = if let Some(ts) = block_timestamps.get(&block_number) {
                *ts
            } else {
                let ts = self.fetch_block_timestamp(block_number).await;
                block_timestamps.insert(block_number, ts);
                ts
            };

            let tx_hash = log.transaction_hash.unwrap_or_default();
            if !receipts.contains_key(&tx_hash)
                && let Ok(Some(receipt)) = self.fetch_receipt(tx_hash).await
            {
                receipts.insert(tx_hash, receipt);
            }
            let receipt = receipts.get(&tx_hash);
            let gas_used = receipt.map(|r| r.gas_used);
            let tx_status = receipt.map(|r| u8::from(r.status()));

            let meta = EventMetadata {
                block_number,
                block_hash: log.block_hash.unwrap_or_default(),
                tx_hash,
                tx_index: log.transaction_index.unwrap_or_default(),
                log_index: log.log_index.unwrap_or_default(),
                timestamp,
                contract: *address,
                gas_used,
                tx_status,
            };

            match decoder::decode_log(log, contract, &meta) {
                Ok(Some(decoded)) => {
                    self.dispatcher
                        .dispatch_event(contract.clone(), meta, decoded, log.clone());
                    dispatched += 1;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "dropping log that failed to decode");
                }
            }
        }

        self.cursor.store(to.saturating_add(1), Ordering::SeqCst);
        Ok(dispatched)
    }

    async fn fetch_block_timestamp(&self, block_number: u64) -> DateTime<Utc> {
        self.rate_limit_calls.fetch_add(1, Ordering::Relaxed);
        match self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(block_number))
            .await
        {
            Ok(Some(block)) => {
                DateTime::from_timestamp(i64::try_from(block.header.timestamp).unwrap_or(0), 0)
                    .unwrap_or_default()
            }
            _ => DateTime::from_timestamp(0, 0).unwrap_or_default(),
        }
    }

    async fn fetch_receipt(
        &self,
        tx_hash: TxHash,
    ) -> std::result::Result<Option<TransactionReceipt>, IngestError> {
        self.rate_limit_calls.fetch_add(1, Ordering::Relaxed);
        self.provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| IngestError::TransientRpc {
                chain_id: self.chain_id,
                source: Box::new(e),
            })
    }
}

#[async_trait]
impl Listener for PullListener {
    async fn start(&self) -> Result<()> {
        if matches!(
            *self.inner.state.lock(),
            ListenerState::Running | ListenerState::Starting
        ) {
            warn!(chain_id = %self.inner.chain_id, "start() called on already-running pull listener");
            return Ok(());
        }
        self.set_state(ListenerState::Starting);
        let cancel = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            *inner.state.lock() = ListenerState::Running;
            let mut rate_limit_interval = tokio::time::interval(Duration::from_secs(
                inner.scan.rate_limit_report_interval_secs.max(1),
            ));
            let mut scan_interval = tokio::time::interval(inner.scan_interval);
            loop {
                tokio::select! {
                    () = task_cancel.cancelled() => break,
                    _ = scan_interval.tick() => {
                        if let Err(err) = inner.tick().await {
                            warn!(chain_id = %inner.chain_id, error = %err, "pull tick failed, will retry next interval");
                        }
                    }
                    _ = rate_limit_interval.tick() => {
                        let calls = inner.rate_limit_calls.swap(0, Ordering::Relaxed);
                        metrics::counter!("indexer_rpc_calls_total", "chain_id" => inner.chain_id.to_string()).increment(calls);
                        debug!(chain_id = %inner.chain_id, calls, "rate-limit window");
                    }
                }
            }
            *inner.state.lock() = ListenerState::Stopped;
        });

        *self.cancel.lock() = Some(cancel);
        *self.task.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let cancel = self.cancel.lock().take();
        match cancel {
            Some(token) => {
                token.cancel();
                let handle = self.task.lock().take();
                if let Some(handle) = handle {
                    let _ = handle.await;
                }
                self.set_state(ListenerState::Stopped);
                Ok(())
            }
            None => {
                warn!(chain_id = %self.inner.chain_id, "stop() called on already-stopped pull listener");
                Ok(())
            }
        }
    }

    fn state(&self) -> ListenerState {
        *self.inner.state.lock()
    }

    fn head_block(&self) -> Option<u64> {
        let cursor = self.inner.cursor.load(Ordering::SeqCst);
        cursor.checked_sub(1)
    }

    fn update_contracts(&self, contracts: Vec<ContractConfig>) {
        self.replace_contracts(contracts);
    }
}
