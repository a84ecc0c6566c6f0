//! Configuration reload loop (spec.md §2 item 2, §4 "Config reloader").
//!
//! Runs on its own timer, independent of any single listener's internal
//! refresh (push listeners also refresh their own contract set per spec.md
//! §4.2 step 3; this loop additionally picks up chains added, removed, or
//! disabled at the config store, and pushes refreshed contract sets down to
//! every managed chain — including pull listeners, which have no refresh
//! timer of their own).
//!
//! A failed tick is logged and retried on the next interval; it never tears
//! down an already-running chain.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use crate::ports::store::ConfigStore;
use crate::supervisor::Supervisor;
use crate::types::entities::ChainConfig;
use crate::types::primitives::ChainId;

/// Compute which configured chains need starting and which managed chains
/// need stopping, given the config store's current desired set and the
/// supervisor's currently-managed set.
///
/// Pure and side-effect-free so it's testable without a running supervisor.
fn diff_chains(managed: &[ChainId], desired: &[ChainConfig]) -> (Vec<ChainConfig>, Vec<ChainId>) {
    let to_add: Vec<ChainConfig> = desired
        .iter()
        .filter(|c| c.enabled && !managed.contains(&c.chain_id))
        .cloned()
        .collect();

    let desired_enabled: Vec<ChainId> = desired
        .iter()
        .filter(|c| c.enabled)
        .map(|c| c.chain_id)
        .collect();
    let to_remove: Vec<ChainId> = managed
        .iter()
        .filter(|id| !desired_enabled.contains(id))
        .copied()
        .collect();

    (to_add, to_remove)
}

/// Periodically reconciles the supervisor's managed chain set against the
/// config store, and refreshes every managed chain's contract set.
pub struct ConfigReloader {
    supervisor: Arc<Supervisor>,
    config_store: Arc<dyn ConfigStore>,
    interval: Duration,
    cancel: Mutex<Option<CancellationToken>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConfigReloader {
    /// Build a reloader ticking every `interval_ms`.
    #[must_use]
    pub fn new(supervisor: Arc<Supervisor>, config_store: Arc<dyn ConfigStore>, interval_ms: u64) -> Self {
        Self {
            supervisor,
            config_store,
            interval: Duration::from_millis(interval_ms),
            cancel: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    /// Start the background reload loop. Idempotent: calling `start` while
    /// already running logs a warning and is a no-op.
    pub fn start(self: &Arc<Self>) {
        if self.cancel.lock().is_some() {
            warn!("config reloader start() called while already running");
            return;
        }
        let cancel = CancellationToken::new();
        let this = Arc::clone(self);
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(this.interval);
            loop {
                tokio::select! {
                    () = task_cancel.cancelled() => break,
                    _ = interval.tick() => {
                        this.tick().await;
                    }
                }
            }
        });

        *self.cancel.lock() = Some(cancel);
        *self.task.lock() = Some(handle);
    }

    /// Stop the background reload loop, if running.
    pub async fn stop(&self) {
        let cancel = self.cancel.lock().take();
        if let Some(cancel) = cancel {
            cancel.cancel();
            let handle = self.task.lock().take();
            if let Some(handle) = handle {
                let _ = handle.await;
            }
        }
    }

    #[instrument(skip(self))]
    async fn tick(&self) {
        let desired = match self.config_store.get_chain_configs().await {
            Ok(configs) => configs,
            Err(err) => {
                warn!(error = %err, "config reload: failed to load chain configs, retrying next tick");
                return;
            }
        };

        let managed = self.supervisor.managed_chain_ids();
        let (to_add, to_remove) = diff_chains(&managed, &desired);

        for config in to_add {
            let chain_id = config.chain_id;
            if let Err(err) = self.supervisor.add_chain(config).await {
                warn!(%chain_id, error = %err, "config reload: failed to start newly-enabled chain");
            }
        }
        for chain_id in to_remove {
            self.supervisor.remove_chain(chain_id).await;
        }

        for chain_id in self.supervisor.managed_chain_ids() {
            match self.config_store.get_contract_configs(chain_id).await {
                Ok(contracts) => {
                    let enabled: Vec<_> = contracts.into_iter().filter(|c| c.enabled).collect();
                    self.supervisor.update_contracts(chain_id, enabled);
                }
                Err(err) => {
                    warn!(%chain_id, error = %err, "config reload: failed to refresh contracts, retrying next tick");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::entities::NativeCurrency;
    use crate::types::enums::{ChainType, ListenerStrategy};

    fn sample(chain_id: i64, enabled: bool) -> ChainConfig {
        ChainConfig {
            chain_id: ChainId::new(chain_id),
            name: format!("Chain {chain_id}"),
            chain_type: ChainType::Evm,
            rpc_url: "https://rpc.example".to_string(),
            stream_url: None,
            strategy: ListenerStrategy::Pull,
            scan_interval_ms: ChainConfig::DEFAULT_SCAN_INTERVAL_MS,
            enabled,
            native_currency: NativeCurrency {
                name: "Ether".to_string(),
                symbol: "ETH".to_string(),
                decimals: 18,
            },
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn newly_enabled_chain_is_added() {
        let (to_add, to_remove) = diff_chains(&[], &[sample(1, true)]);
        assert_eq!(to_add.len(), 1);
        assert!(to_remove.is_empty());
    }

    #[test]
    fn disabled_chain_is_removed() {
        let managed = vec![ChainId::new(1)];
        let (to_add, to_remove) = diff_chains(&managed, &[sample(1, false)]);
        assert!(to_add.is_empty());
        assert_eq!(to_remove, vec![ChainId::new(1)]);
    }

    #[test]
    fn removed_from_store_entirely_is_also_removed() {
        let managed = vec![ChainId::new(1)];
        let (to_add, to_remove) = diff_chains(&managed, &[]);
        assert!(to_add.is_empty());
        assert_eq!(to_remove, vec![ChainId::new(1)]);
    }

    #[test]
    fn already_managed_enabled_chain_is_left_alone() {
        let managed = vec![ChainId::new(1)];
        let (to_add, to_remove) = diff_chains(&managed, &[sample(1, true)]);
        assert!(to_add.is_empty());
        assert!(to_remove.is_empty());
    }
}
