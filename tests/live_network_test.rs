//! Live network smoke test for `ChainAdapter`.
//!
//! Ignored by default: it dials a real EVM RPC endpoint and therefore needs
//! network access and a reachable node. Point it at any EVM-compatible chain
//! via `LIVE_RPC_URL`/`LIVE_CHAIN_ID` (and optionally `LIVE_WS_URL` for the
//! streaming-transport check).
//!
//! ```bash
//! LIVE_RPC_URL=https://eth.llamarpc.com LIVE_CHAIN_ID=1 \
//!     cargo test --test live_network_test -- --ignored --nocapture
//! ```

use std::env;

use multichain_indexer::chain::ChainAdapter;
use multichain_indexer::types::entities::{ChainConfig, NativeCurrency};
use multichain_indexer::types::enums::{ChainType, ListenerStrategy};
use multichain_indexer::types::primitives::ChainId;

fn live_chain_config() -> Option<ChainConfig> {
    let rpc_url = env::var("LIVE_RPC_URL").ok()?;
    let chain_id: i64 = env::var("LIVE_CHAIN_ID").ok()?.parse().ok()?;
    let stream_url = env::var("LIVE_WS_URL").ok();

    Some(ChainConfig {
        chain_id: ChainId::new(chain_id),
        name: "live smoke test chain".to_string(),
        chain_type: ChainType::Evm,
        rpc_url,
        stream_url,
        strategy: ListenerStrategy::Pull,
        scan_interval_ms: ChainConfig::DEFAULT_SCAN_INTERVAL_MS,
        enabled: true,
        native_currency: NativeCurrency {
            name: "Ether".to_string(),
            symbol: "ETH".to_string(),
            decimals: 18,
        },
        metadata: serde_json::Value::Null,
    })
}

/// Connects to a real RPC endpoint, verifies the reported chain id matches,
/// and fetches the current block number.
///
/// Skips (rather than fails) if `LIVE_RPC_URL`/`LIVE_CHAIN_ID` aren't set, so
/// this is safe to leave in the normal `--ignored` sweep without requiring
/// every environment to have live network access configured.
#[tokio::test]
#[ignore = "requires network access to a live EVM RPC endpoint"]
async fn connects_and_fetches_latest_block() {
    let Some(config) = live_chain_config() else {
        eprintln!("skipping: set LIVE_RPC_URL and LIVE_CHAIN_ID to run this test");
        return;
    };

    let adapter = ChainAdapter::new(&config).expect("chain type must be supported");
    adapter.connect().await.expect("connect must succeed against a reachable endpoint");

    let latest = adapter
        .latest_block()
        .await
        .expect("latest_block must succeed once connected");
    assert!(latest > 0, "a live chain must report a nonzero block number");

    if config.stream_url.is_some() {
        assert!(
            adapter.has_live_stream(),
            "a configured stream_url that connects should report a live stream"
        );
    }

    adapter.disconnect().await.expect("disconnect must be idempotent and infallible");
}

/// A chain id mismatch between configuration and the live endpoint must be
/// rejected rather than silently accepted — run this against any reachable
/// endpoint by deliberately setting `LIVE_CHAIN_ID` to the wrong value.
#[tokio::test]
#[ignore = "requires network access to a live EVM RPC endpoint"]
async fn rejects_a_misconfigured_chain_id() {
    let Some(mut config) = live_chain_config() else {
        eprintln!("skipping: set LIVE_RPC_URL and LIVE_CHAIN_ID to run this test");
        return;
    };
    config.chain_id = ChainId::new(config.chain_id.get().wrapping_add(999_999));

    let adapter = ChainAdapter::new(&config).expect("chain type must be supported");
    let result = adapter.connect().await;
    assert!(
        result.is_err(),
        "connecting with a deliberately wrong chain id must fail"
    );
}
