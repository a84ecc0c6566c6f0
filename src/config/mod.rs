//! Configuration loading and validation for the indexing core.
//!
//! Configuration is loaded from multiple sources in order of precedence:
//! 1. Environment variables (highest, `INDEXER_` prefix)
//! 2. Environment-specific file (e.g., `production.toml`)
//! 3. Default file (`default.toml`)
//!
//! Per-chain settings (`rpc_url`, `stream_url`, `strategy`, ...) are not part
//! of this module: they live on `ChainConfig`/`ContractConfig`, read from the
//! config store at startup and on each reload tick.

mod settings;

pub use settings::{DatabaseSettings, LoggingSettings, MetricsSettings, ScanSettings, Settings};
