//! Engine configuration: CLI/env flags layered over an optional
//! `config.toml`, with built-in defaults at the bottom.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::error;

const DEFAULT_DATABASE: &str = "quark.db";
const DEFAULT_SLOW_QUERY_MS: u64 = 100;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to the SQLite database file.
    pub database: PathBuf,
    /// Log filter directive ("info", "quark_engine=debug", ...).
    pub log: String,
    /// Log output format: "pretty" (default) | "json".
    pub log_format: String,
    /// Log SQLite queries that exceed this threshold (milliseconds).
    /// 0 disables slow query logging.
    pub slow_query_threshold_ms: u64,
}

/// Shape of `config.toml`. Every field optional; missing fields fall
/// through to the next layer.
#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    database: Option<PathBuf>,
    log: Option<String>,
    log_format: Option<String>,
    slow_query_threshold_ms: Option<u64>,
}

fn load_toml(path: &Path) -> Option<TomlConfig> {
    let contents = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

impl EngineConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `config_path`
    ///   3. Built-in defaults
    pub fn new(
        config_path: Option<&Path>,
        database: Option<PathBuf>,
        log: Option<String>,
        log_format: Option<String>,
    ) -> Self {
        let toml = config_path.and_then(load_toml).unwrap_or_default();

        Self {
            database: database
                .or(toml.database)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE)),
            log: log.or(toml.log).unwrap_or_else(|| "info".to_string()),
            log_format: log_format
                .or(toml.log_format)
                .unwrap_or_else(|| "pretty".to_string()),
            slow_query_threshold_ms: toml
                .slow_query_threshold_ms
                .unwrap_or(DEFAULT_SLOW_QUERY_MS),
        }
    }
}
