//! Supervisor: owns the chain-adapter/listener pool lifecycle (spec.md §4.7).
//!
//! The supervisor is the only thing that constructs a `ChainAdapter`. It
//! starts one adapter + listener pair per enabled `ChainConfig`, isolates
//! per-chain failures so one chain misbehaving never affects another, and
//! drives orderly shutdown: stop every listener first, then disconnect every
//! adapter, bounded by a grace period.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::chain::ChainAdapter;
use crate::config::ScanSettings;
use crate::dispatcher::EventDispatcher;
use crate::error::{AppError, IngestError, Result};
use crate::listener::Listener;
use crate::ports::store::ConfigStore;
use crate::types::entities::ChainConfig;
use crate::types::enums::ListenerStrategy;
use crate::types::primitives::ChainId;

/// Grace period for orderly shutdown (spec.md §5: "default 30s").
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

struct ChainEntry {
    config: ChainConfig,
    adapter: Arc<ChainAdapter>,
    listener: Arc<dyn Listener>,
}

/// Per-chain status, part of a `SupervisorStatus` snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ChainStatus {
    /// Chain identifier.
    pub chain_id: ChainId,
    /// Configured display name.
    pub name: String,
    /// Configured (not necessarily effective) strategy.
    pub strategy: ListenerStrategy,
    /// Whether the listener reports a running state (`Running`/`Reconnecting`).
    pub is_running: bool,
    /// Highest fully-processed block, if any.
    pub head_block: Option<u64>,
    /// Listener lifecycle state name, for diagnostics (e.g. surfacing `failed`
    /// distinctly from `stopped` per spec.md §7's status surface).
    pub state: &'static str,
}

/// Supervisor-wide status snapshot (spec.md §4.7, mirrored by `GET
/// /blockchain/status` at the HTTP boundary this crate doesn't implement).
#[derive(Debug, Clone, Serialize)]
pub struct SupervisorStatus {
    /// Number of chains currently enabled and managed.
    pub enabled_chains: usize,
    /// Per-chain status, one entry per managed chain.
    pub chains: Vec<ChainStatus>,
    /// Dispatcher queue depth at snapshot time.
    pub queue_size: usize,
    /// Number of registered event handlers.
    pub handler_count: usize,
}

/// Owns the chain adapter/listener pool and their lifecycle.
pub struct Supervisor {
    config_store: Arc<dyn ConfigStore>,
    dispatcher: Arc<EventDispatcher>,
    scan: ScanSettings,
    chains: RwLock<HashMap<ChainId, ChainEntry>>,
}

impl Supervisor {
    /// Build a supervisor. Does not start anything; call `start_all`.
    #[must_use]
    pub fn new(config_store: Arc<dyn ConfigStore>, dispatcher: Arc<EventDispatcher>, scan: ScanSettings) -> Self {
        Self {
            config_store,
            dispatcher,
            scan,
            chains: RwLock::new(HashMap::new()),
        }
    }

    /// Load every chain config and start the enabled ones.
    ///
    /// A chain that fails to build or connect is logged and skipped, not
    /// fatal to the others (spec.md §4 item 4, "per-chain isolation of
    /// failures"); only a config-store read failure at startup is fatal.
    ///
    /// # Errors
    /// Returns `AppError::Initialization` if the config store cannot be read.
    #[instrument(skip(self))]
    pub async fn start_all(&self) -> Result<()> {
        let configs = self
            .config_store
            .get_chain_configs()
            .await
            .map_err(|e| AppError::Initialization(format!("failed to load chain configs: {e}")))?;

        for config in configs.into_iter().filter(|c| c.enabled) {
            let chain_id = config.chain_id;
            if let Err(err) = self.start_chain(config).await {
                warn!(%chain_id, error = %err, "failed to start chain, skipping");
            }
        }
        Ok(())
    }

    /// Build, connect, and start a listener for one chain config.
    async fn start_chain(&self, config: ChainConfig) -> Result<()> {
        let chain_id = config.chain_id;
        let adapter = Arc::new(ChainAdapter::new(&config)?);
        adapter.connect().await?;

        let contracts = self
            .config_store
            .get_contract_configs(chain_id)
            .await
            .map_err(|e| IngestError::TransportUnavailable {
                chain_id,
                reason: format!("contract config load failed: {e}"),
            })?
            .into_iter()
            .filter(|c| c.enabled)
            .collect::<Vec<_>>();

        let start_block = adapter.latest_block().await.unwrap_or(0);
        let listener = adapter.make_listener(
            config.effective_strategy(),
            contracts,
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.config_store),
            self.scan,
            config.scan_interval_ms,
            start_block,
        )?;
        listener.start().await?;

        info!(%chain_id, strategy = %config.effective_strategy(), start_block, "chain started");
        self.chains.write().insert(
            chain_id,
            ChainEntry {
                config,
                adapter,
                listener,
            },
        );
        Ok(())
    }

    /// Stop and remove one chain's listener and adapter.
    async fn stop_chain(&self, chain_id: ChainId) -> Result<()> {
        let entry = self.chains.write().remove(&chain_id);
        let Some(entry) = entry else {
            return Ok(());
        };
        if let Err(err) = entry.listener.stop().await {
            warn!(%chain_id, error = %err, "listener stop failed during teardown");
        }
        if let Err(err) = entry.adapter.disconnect().await {
            warn!(%chain_id, error = %err, "adapter disconnect failed during teardown");
        }
        Ok(())
    }

    /// Restart a single chain's listener from its current config-store
    /// definition (stop, reload config, start fresh).
    ///
    /// # Errors
    /// Returns an error if the chain isn't found or fails to restart.
    pub async fn restart_listener(&self, chain_id: ChainId) -> Result<()> {
        self.stop_chain(chain_id).await?;
        let configs = self
            .config_store
            .get_chain_configs()
            .await
            .map_err(|e| IngestError::TransportUnavailable {
                chain_id,
                reason: format!("chain config reload failed: {e}"),
            })?;
        let config = configs
            .into_iter()
            .find(|c| c.chain_id == chain_id && c.enabled)
            .ok_or_else(|| IngestError::TransportUnavailable {
                chain_id,
                reason: "chain not found or disabled".to_string(),
            })?;
        self.start_chain(config).await
    }

    /// Switch a running chain's listener strategy without losing or
    /// duplicating events (spec.md §8 scenario 5): the new listener's
    /// starting cursor is the chain's head block at the moment of the switch.
    ///
    /// # Errors
    /// Returns an error if the chain isn't currently managed, or if the new
    /// strategy has no usable transport.
    pub async fn switch_strategy(&self, chain_id: ChainId, strategy: ListenerStrategy) -> Result<()> {
        let (mut config, adapter, old_listener) = {
            let mut chains = self.chains.write();
            let entry = chains
                .remove(&chain_id)
                .ok_or_else(|| IngestError::TransportUnavailable {
                    chain_id,
                    reason: "chain not currently managed".to_string(),
                })?;
            (entry.config, entry.adapter, entry.listener)
        };
        old_listener.stop().await?;

        config.strategy = strategy;
        let head_at_switch = adapter.latest_block().await.unwrap_or(0);
        let contracts = self
            .config_store
            .get_contract_configs(chain_id)
            .await
            .map_err(|e| IngestError::TransportUnavailable {
                chain_id,
                reason: format!("contract config load failed: {e}"),
            })?
            .into_iter()
            .filter(|c| c.enabled)
            .collect::<Vec<_>>();

        let listener = adapter.make_listener(
            config.effective_strategy(),
            contracts,
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.config_store),
            self.scan,
            config.scan_interval_ms,
            head_at_switch,
        )?;
        listener.start().await?;

        info!(%chain_id, new_strategy = %strategy, head_at_switch, "strategy switched");
        self.chains.write().insert(
            chain_id,
            ChainEntry {
                config,
                adapter,
                listener,
            },
        );
        Ok(())
    }

    /// Push a freshly-loaded contract set down to a chain's running
    /// listener, without restarting it. Used by `config_reloader`.
    pub fn update_contracts(&self, chain_id: ChainId, contracts: Vec<crate::types::entities::ContractConfig>) {
        if let Some(entry) = self.chains.read().get(&chain_id) {
            entry.listener.update_contracts(contracts);
        }
    }

    /// Chain ids currently managed (started), for the config reload loop to
    /// diff against the config store's enabled set.
    #[must_use]
    pub fn managed_chain_ids(&self) -> Vec<ChainId> {
        self.chains.read().keys().copied().collect()
    }

    /// Start a newly-enabled chain discovered by the config reload loop.
    ///
    /// # Errors
    /// Returns an error if the chain fails to connect or mint a listener.
    pub async fn add_chain(&self, config: ChainConfig) -> Result<()> {
        self.start_chain(config).await
    }

    /// Stop a chain that was disabled or removed, discovered by the config
    /// reload loop.
    pub async fn remove_chain(&self, chain_id: ChainId) {
        if let Err(err) = self.stop_chain(chain_id).await {
            warn!(%chain_id, error = %err, "failed to stop removed chain");
        }
    }

    /// A point-in-time status snapshot.
    #[must_use]
    pub fn status(&self) -> SupervisorStatus {
        let chains = self.chains.read();
        let chain_statuses: Vec<ChainStatus> = chains
            .values()
            .map(|entry| ChainStatus {
                chain_id: entry.config.chain_id,
                name: entry.config.name.clone(),
                strategy: entry.config.strategy,
                is_running: entry.listener.state().is_running(),
                head_block: entry.listener.head_block(),
                state: entry.listener.state().name(),
            })
            .collect();

        SupervisorStatus {
            enabled_chains: chain_statuses.len(),
            chains: chain_statuses,
            queue_size: self.dispatcher.queue_size(),
            handler_count: self.dispatcher.handler_count(),
        }
    }

    /// Orderly shutdown: stop every listener (bounded by `SHUTDOWN_GRACE`),
    /// then disconnect every adapter. Per-component errors are logged and
    /// never block the rest of shutdown (spec.md §4.7).
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let entries: Vec<_> = self.chains.write().drain().collect();

        let stops = entries.iter().map(|(chain_id, entry)| {
            let chain_id = *chain_id;
            async move {
                match timeout(SHUTDOWN_GRACE, entry.listener.stop()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => warn!(%chain_id, error = %err, "listener stop failed"),
                    Err(_) => warn!(%chain_id, "listener stop exceeded shutdown grace period, abandoning"),
                }
            }
        });
        join_all(stops).await;

        let disconnects = entries.iter().map(|(chain_id, entry)| {
            let chain_id = *chain_id;
            async move {
                if let Err(err) = entry.adapter.disconnect().await {
                    warn!(%chain_id, error = %err, "adapter disconnect failed");
                }
            }
        });
        join_all(disconnects).await;

        info!("supervisor shutdown complete");
    }
}
