//! Chain adapter: owns one chain's RPC/streaming transports (spec.md §4.1).
//!
//! A `ChainAdapter` is the only thing in the core that holds a live
//! connection. Listeners never dial a transport themselves; they're minted
//! by `make_listener`, which hands them a clone of whichever `DynProvider`
//! the requested strategy needs. `connect`/`disconnect` are idempotent and
//! cheap to call repeatedly — the supervisor calls `disconnect` on every
//! chain during shutdown regardless of whether `connect` ever succeeded.

use std::sync::Arc;
use std::time::Duration;

use alloy::providers::{DynProvider, Provider, ProviderBuilder, WsConnect};
use parking_lot::RwLock;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::config::ScanSettings;
use crate::dispatcher::EventDispatcher;
use crate::error::{IngestError, Result};
use crate::listener::traits::Listener;
use crate::listener::{PullListener, PushListener};
use crate::ports::store::ConfigStore;
use crate::types::entities::{ChainConfig, ContractConfig};
use crate::types::enums::{ChainType, ListenerStrategy};
use crate::types::primitives::ChainId;

/// Timeout applied to every adapter operation that touches the network
/// (spec.md §5: "must expose a timeout, default 10s").
pub const OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns the request/response transport and, if configured, the streaming
/// transport for one chain.
///
/// Holds `RwLock`-guarded, cheaply-cloneable `DynProvider`s, so a single
/// adapter instance is shared between the supervisor (which calls
/// `connect`/`disconnect`) and any on-demand caller needing a receipt or
/// block lookup outside a listener's own tick.
pub struct ChainAdapter {
    chain_id: ChainId,
    #[allow(dead_code)] // retained for future multi-type registry lookups
    chain_type: ChainType,
    rpc_url: String,
    stream_url: Option<String>,
    http: RwLock<Option<DynProvider>>,
    ws: RwLock<Option<DynProvider>>,
}

impl std::fmt::Debug for ChainAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainAdapter")
            .field("chain_id", &self.chain_id)
            .field("rpc_url", &self.rpc_url)
            .field("has_stream", &self.stream_url.is_some())
            .field("connected", &self.http.read().is_some())
            .field("streaming", &self.ws.read().is_some())
            .finish()
    }
}

impl ChainAdapter {
    /// Build an adapter for the given chain configuration. Does not connect.
    ///
    /// # Errors
    /// Returns `IngestError::UnsupportedChainType` if `config.chain_type` has
    /// no implemented transport (only `Evm` does, spec.md §9).
    pub fn new(config: &ChainConfig) -> Result<Self> {
        if !config.chain_type.is_implemented() {
            return Err(IngestError::UnsupportedChainType {
                chain_id: config.chain_id,
                chain_type: config.chain_type.name(),
            }
            .into());
        }
        Ok(Self {
            chain_id: config.chain_id,
            chain_type: config.chain_type,
            rpc_url: config.rpc_url.clone(),
            stream_url: config.stream_url.clone(),
            http: RwLock::new(None),
            ws: RwLock::new(None),
        })
    }

    /// This adapter's chain id.
    #[must_use]
    pub const fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// Establish the request/response transport, and the streaming transport
    /// if one is configured. Verifies the connected endpoint reports the
    /// configured `chain_id`.
    ///
    /// # Errors
    /// Returns `IngestError::ConfigMismatch` if the endpoint reports a
    /// different chain id, or `IngestError::TransportUnavailable` if the RPC
    /// endpoint can't be reached within `OPERATION_TIMEOUT`. A streaming
    /// endpoint that fails to connect is *not* fatal: it's logged and the
    /// adapter simply has no live `ws` transport (`Hybrid`/`Push` listeners
    /// fall back to pull, per `ChainConfig::effective_strategy`).
    #[instrument(skip(self), fields(chain_id = %self.chain_id))]
    pub async fn connect(&self) -> Result<()> {
        let url = self
            .rpc_url
            .parse()
            .map_err(|e| IngestError::TransportUnavailable {
                chain_id: self.chain_id,
                reason: format!("invalid rpc_url: {e}"),
            })?;
        let http = ProviderBuilder::new().connect_http(url);

        let reported = timeout(OPERATION_TIMEOUT, http.get_chain_id())
            .await
            .map_err(|_| IngestError::TransportUnavailable {
                chain_id: self.chain_id,
                reason: "timed out waiting for eth_chainId".to_string(),
            })?
            .map_err(|e| IngestError::TransientRpc {
                chain_id: self.chain_id,
                source: Box::new(e),
            })?;

        if ChainId::from(reported) != self.chain_id {
            return Err(IngestError::ConfigMismatch {
                configured: self.chain_id,
                reported: ChainId::from(reported),
            }
            .into());
        }

        *self.http.write() = Some(DynProvider::new(http));
        info!("connected request transport");

        if let Some(stream_url) = &self.stream_url {
            match timeout(
                OPERATION_TIMEOUT,
                ProviderBuilder::new().connect_ws(WsConnect::new(stream_url)),
            )
            .await
            {
                Ok(Ok(ws)) => {
                    *self.ws.write() = Some(DynProvider::new(ws));
                    info!("connected streaming transport");
                }
                Ok(Err(err)) => {
                    warn!(error = %err, "streaming transport unavailable, push/hybrid strategies will fall back to pull");
                }
                Err(_) => {
                    warn!(
                        "streaming transport connection timed out, push/hybrid strategies will fall back to pull"
                    );
                }
            }
        }

        Ok(())
    }

    /// Tear down both transports. In-flight requests on shared
    /// `DynProvider` clones are given a chance to drain (a single scheduler
    /// yield, bounded by `OPERATION_TIMEOUT`) before the handles are dropped;
    /// any call still outstanding past that point simply observes a closed
    /// connection rather than blocking `disconnect` forever.
    #[instrument(skip(self), fields(chain_id = %self.chain_id))]
    pub async fn disconnect(&self) -> Result<()> {
        let http = self.http.write().take();
        let ws = self.ws.write().take();
        drop(http);
        drop(ws);
        let _ = timeout(OPERATION_TIMEOUT, tokio::task::yield_now()).await;
        info!("disconnected");
        Ok(())
    }

    /// Current head block number.
    ///
    /// # Errors
    /// Returns `IngestError::TransportUnavailable` if `connect` hasn't
    /// succeeded yet or the call times out, or `IngestError::TransientRpc` if
    /// the underlying request fails.
    pub async fn latest_block(&self) -> Result<u64> {
        let provider =
            self.http
                .read()
                .clone()
                .ok_or_else(|| IngestError::TransportUnavailable {
                    chain_id: self.chain_id,
                    reason: "not connected".to_string(),
                })?;
        let block = timeout(OPERATION_TIMEOUT, provider.get_block_number())
            .await
            .map_err(|_| IngestError::TransportUnavailable {
                chain_id: self.chain_id,
                reason: "timed out waiting for eth_blockNumber".to_string(),
            })?
            .map_err(|e| IngestError::TransientRpc {
                chain_id: self.chain_id,
                source: Box::new(e),
            })?;
        Ok(block)
    }

    /// Whether a live streaming transport is currently connected.
    #[must_use]
    pub fn has_live_stream(&self) -> bool {
        self.ws.read().is_some()
    }

    /// Mint a listener of the requested strategy.
    ///
    /// `Hybrid` resolves to `Push` if a streaming transport is live,
    /// otherwise `Pull`.
    ///
    /// # Errors
    /// Returns `IngestError::StrategyUnavailable` if the resolved strategy
    /// needs a transport this adapter doesn't have (e.g. `Pull` requested
    /// before `connect()`, or `Push` requested with no live stream).
    #[allow(clippy::too_many_arguments)]
    pub fn make_listener(
        &self,
        strategy: ListenerStrategy,
        contracts: Vec<ContractConfig>,
        dispatcher: Arc<EventDispatcher>,
        config_store: Arc<dyn ConfigStore>,
        scan: ScanSettings,
        scan_interval_ms: u64,
        start_block: u64,
    ) -> Result<Arc<dyn Listener>> {
        let resolved = match strategy {
            ListenerStrategy::Hybrid => {
                if self.has_live_stream() {
                    ListenerStrategy::Push
                } else {
                    ListenerStrategy::Pull
                }
            }
            other => other,
        };

        match resolved {
            ListenerStrategy::Pull => {
                let provider =
                    self.http
                        .read()
                        .clone()
                        .ok_or_else(|| IngestError::StrategyUnavailable {
                            chain_id: self.chain_id,
                            reason: "pull requires a connected request transport".to_string(),
                        })?;
                Ok(Arc::new(PullListener::new(
                    self.chain_id,
                    provider,
                    contracts,
                    dispatcher,
                    scan,
                    scan_interval_ms,
                    start_block,
                )))
            }
            ListenerStrategy::Push => {
                let provider =
                    self.ws
                        .read()
                        .clone()
                        .ok_or_else(|| IngestError::StrategyUnavailable {
                            chain_id: self.chain_id,
                            reason: "push requires a live streaming transport".to_string(),
                        })?;
                Ok(Arc::new(PushListener::new(
                    self.chain_id,
                    provider,
                    config_store,
                    contracts,
                    dispatcher,
                    scan.websocket_reconnect_attempts,
                    scan.contract_refresh_interval_ms,
                    scan.rate_limit_report_interval_secs,
                )))
            }
            ListenerStrategy::Hybrid => unreachable!("resolved above"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::types::entities::NativeCurrency;
    use crate::types::enums::{ChainType, ListenerStrategy};

    use super::*;

    fn sample_config(chain_type: ChainType) -> ChainConfig {
        ChainConfig {
            chain_id: ChainId::new(1),
            name: "Test".to_string(),
            chain_type,
            rpc_url: "https://rpc.example".to_string(),
            stream_url: None,
            strategy: ListenerStrategy::Pull,
            scan_interval_ms: ChainConfig::DEFAULT_SCAN_INTERVAL_MS,
            enabled: true,
            native_currency: NativeCurrency {
                name: "Ether".to_string(),
                symbol: "ETH".to_string(),
                decimals: 18,
            },
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn evm_adapter_constructs() {
        assert!(ChainAdapter::new(&sample_config(ChainType::Evm)).is_ok());
    }

    #[test]
    fn solana_adapter_is_rejected_not_stubbed() {
        let err = ChainAdapter::new(&sample_config(ChainType::Solana)).unwrap_err();
        assert!(err.to_string().contains("solana"));
    }

    #[test]
    fn sui_adapter_is_rejected_not_stubbed() {
        assert!(ChainAdapter::new(&sample_config(ChainType::Sui)).is_err());
    }

    #[test]
    fn fresh_adapter_has_no_live_stream() {
        let adapter = ChainAdapter::new(&sample_config(ChainType::Evm)).unwrap();
        assert!(!adapter.has_live_stream());
    }
}
