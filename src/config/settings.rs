//! Settings structs and loading logic.
//!
//! All settings have sensible defaults and can be overridden via
//! environment variables or configuration files.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure.
///
/// Per-chain RPC/stream URLs are NOT part of this struct: they live on
/// `ChainConfig` and are read from the config store at runtime. This struct
/// only covers process-wide settings the binary needs before it can even
/// reach the config store.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Event/config store database configuration.
    pub database: DatabaseSettings,
    /// Default scan/batching knobs, used unless a `ChainConfig` overrides
    /// `scan_interval_ms` itself.
    pub scan: ScanSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Metrics configuration.
    pub metrics: MetricsSettings,
}

impl Settings {
    /// Load settings from configuration files and environment variables.
    ///
    /// Files are loaded in this order (later overrides earlier):
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (if it exists)
    /// 3. Environment variables with the `INDEXER_` prefix
    ///
    /// # Errors
    /// Returns `ConfigError` if configuration is invalid or cannot be loaded.
    pub fn load(environment: &str) -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".into());

        let builder = Config::builder()
            .set_default("database.url", "postgres://localhost/indexer")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout_ms", 5000)?
            .set_default("scan.scan_interval_ms", 5_000)?
            .set_default("scan.blocks_per_scan", 50)?
            .set_default("scan.contract_batch_size", 3)?
            .set_default("scan.contract_batch_delay_ms", 500)?
            .set_default("scan.event_batch_size", 2)?
            .set_default("scan.event_batch_delay_ms", 300)?
            .set_default("scan.block_batch_size", 5)?
            .set_default("scan.block_batch_delay_ms", 200)?
            .set_default("scan.websocket_reconnect_attempts", 5)?
            .set_default("scan.contract_refresh_interval_ms", 30_000)?
            .set_default("scan.rate_limit_report_interval_secs", 10)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("logging.file_path", Option::<String>::None)?
            .set_default("metrics.enabled", true)?
            .add_source(File::with_name(&format!("{config_dir}/default")).required(false))
            .add_source(
                File::with_name(&format!("{config_dir}/{environment}")).required(false),
            )
            .add_source(
                Environment::with_prefix("INDEXER")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DATABASE
// ═══════════════════════════════════════════════════════════════════════════════

/// Connection settings for the Postgres-backed config/event store.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Postgres connection string.
    pub url: String,
    /// Maximum pool connections.
    pub max_connections: u32,
    /// Minimum idle pool connections.
    pub min_connections: u32,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCAN / BATCHING (spec.md §4.3, §6)
// ═══════════════════════════════════════════════════════════════════════════════

/// Default pull-listener scan and batching knobs.
///
/// A `ChainConfig.scan_interval_ms` always takes precedence over
/// `scan_interval_ms` here; the rest apply uniformly to every pull listener,
/// since per-chain batch tuning isn't part of the config store's schema.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScanSettings {
    /// Default pull tick interval, in milliseconds.
    pub scan_interval_ms: u64,
    /// Maximum number of blocks scanned in a single tick.
    pub blocks_per_scan: u64,
    /// Contracts processed per batch within one tick.
    pub contract_batch_size: usize,
    /// Delay after each contract batch, in milliseconds.
    pub contract_batch_delay_ms: u64,
    /// Events processed per batch within one contract's scan.
    pub event_batch_size: usize,
    /// Delay after each event batch, in milliseconds.
    pub event_batch_delay_ms: u64,
    /// Blocks processed per `eth_getLogs` batch within one tick.
    pub block_batch_size: u64,
    /// Delay after each block batch, in milliseconds.
    pub block_batch_delay_ms: u64,
    /// Maximum push-listener reconnect attempts before transitioning to `Failed`.
    pub websocket_reconnect_attempts: u32,
    /// Interval between config-reload ticks, in milliseconds.
    pub contract_refresh_interval_ms: u64,
    /// How often (seconds) each listener reports and resets its rate-limit
    /// call counter (spec.md §4.3: "every 10s the counter is reported and
    /// reset").
    pub rate_limit_report_interval_secs: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOGGING
// ═══════════════════════════════════════════════════════════════════════════════

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Minimum log level, e.g. "info", "debug".
    pub level: String,
    /// Output format: "json" or "pretty".
    pub format: String,
    /// Optional file path for a non-blocking file appender.
    pub file_path: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// METRICS
// ═══════════════════════════════════════════════════════════════════════════════

/// Metrics configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MetricsSettings {
    /// Whether per-listener rate-limit counters are emitted via the `metrics` crate.
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_settings_defaults_are_sane() {
        // Exercised indirectly via Settings::load in integration tests; this
        // just pins the literal defaults so a future edit doesn't silently
        // change them.
        let defaults = ScanSettings {
            scan_interval_ms: 5_000,
            blocks_per_scan: 50,
            contract_batch_size: 3,
            contract_batch_delay_ms: 500,
            event_batch_size: 2,
            event_batch_delay_ms: 300,
            block_batch_size: 5,
            block_batch_delay_ms: 200,
            websocket_reconnect_attempts: 5,
            contract_refresh_interval_ms: 30_000,
            rate_limit_report_interval_secs: 10,
        };
        assert_eq!(defaults.scan_interval_ms, 5_000);
        assert_eq!(defaults.blocks_per_scan, 50);
        assert_eq!(defaults.websocket_reconnect_attempts, 5);
    }
}
