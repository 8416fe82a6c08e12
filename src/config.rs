//! Runtime configuration: cache, batcher, and store tuning plus logging
//! setup. Mirrors the defaults enumerated for the configuration surface —
//! environment variables follow the pattern `AUTHZ_<SECTION>_<KEY>`.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use store::{BatchConfig, CacheConfig, StoreConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub cache: CacheSettings,
    pub batch: BatchSettings,
    pub store: StoreSettings,
    pub logging: LoggingConfig,
}

/// Serializable mirror of [`store::CacheConfig`]; `moka::future::Cache`
/// configuration isn't itself `Serialize`, so this is converted at the
/// boundary via [`CacheSettings::to_cache_config`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    pub max_size: u64,
    pub ttl_after_write_secs: Option<u64>,
    pub ttl_after_access_secs: Option<u64>,
    pub cache_negatives: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSettings {
    pub window_ms: u64,
    pub max_batch_size: usize,
    pub max_concurrent: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    pub max_parent_chain_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Valid values: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Valid values: "pretty", "json", "compact".
    pub format: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            batch: BatchSettings::default(),
            store: StoreSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            ttl_after_write_secs: Some(300),
            ttl_after_access_secs: None,
            cache_negatives: false,
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            window_ms: 5,
            max_batch_size: 100,
            max_concurrent: 4,
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { max_parent_chain_depth: 32 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl CacheSettings {
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_size: self.max_size,
            ttl_after_write: self.ttl_after_write_secs.map(Duration::from_secs),
            ttl_after_access: self.ttl_after_access_secs.map(Duration::from_secs),
            cache_negatives: self.cache_negatives,
        }
    }
}

impl BatchSettings {
    pub fn to_batch_config(&self) -> BatchConfig {
        BatchConfig {
            window: Duration::from_millis(self.window_ms),
            max_batch_size: self.max_batch_size,
            max_concurrent: self.max_concurrent,
        }
    }
}

impl StoreSettings {
    pub fn to_store_config(&self) -> StoreConfig {
        StoreConfig { max_parent_chain_depth: self.max_parent_chain_depth }
    }
}

impl RuntimeConfig {
    /// Loads configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    ///
    /// - `AUTHZ_CACHE_MAX_SIZE`
    /// - `AUTHZ_CACHE_TTL_AFTER_WRITE_SECS`
    /// - `AUTHZ_CACHE_CACHE_NEGATIVES`
    /// - `AUTHZ_BATCH_WINDOW_MS`
    /// - `AUTHZ_BATCH_MAX_BATCH_SIZE`
    /// - `AUTHZ_BATCH_MAX_CONCURRENT`
    /// - `AUTHZ_STORE_MAX_PARENT_CHAIN_DEPTH`
    /// - `AUTHZ_LOGGING_LEVEL`
    /// - `AUTHZ_LOGGING_FORMAT`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = env::var("AUTHZ_CACHE_MAX_SIZE") {
            if let Ok(v) = v.parse() {
                config.cache.max_size = v;
            }
        }
        if let Ok(v) = env::var("AUTHZ_CACHE_TTL_AFTER_WRITE_SECS") {
            config.cache.ttl_after_write_secs = v.parse().ok();
        }
        if let Ok(v) = env::var("AUTHZ_CACHE_CACHE_NEGATIVES") {
            config.cache.cache_negatives = v.to_lowercase() == "true" || v == "1";
        }
        if let Ok(v) = env::var("AUTHZ_BATCH_WINDOW_MS") {
            if let Ok(v) = v.parse() {
                config.batch.window_ms = v;
            }
        }
        if let Ok(v) = env::var("AUTHZ_BATCH_MAX_BATCH_SIZE") {
            if let Ok(v) = v.parse() {
                config.batch.max_batch_size = v;
            }
        }
        if let Ok(v) = env::var("AUTHZ_BATCH_MAX_CONCURRENT") {
            if let Ok(v) = v.parse() {
                config.batch.max_concurrent = v;
            }
        }
        if let Ok(v) = env::var("AUTHZ_STORE_MAX_PARENT_CHAIN_DEPTH") {
            if let Ok(v) = v.parse() {
                config.store.max_parent_chain_depth = v;
            }
        }
        if let Ok(v) = env::var("AUTHZ_LOGGING_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = env::var("AUTHZ_LOGGING_FORMAT") {
            config.logging.format = v;
        }

        config
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.cache.max_size == 0 {
            return Err("cache max_size cannot be 0".to_string());
        }
        if self.batch.max_batch_size == 0 {
            return Err("batch max_batch_size cannot be 0".to_string());
        }
        if self.batch.max_concurrent == 0 {
            return Err("batch max_concurrent cannot be 0".to_string());
        }
        if self.store.max_parent_chain_depth == 0 {
            return Err("store max_parent_chain_depth cannot be 0".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "invalid log level '{}'. Valid values: {}",
                self.logging.level,
                valid_levels.join(", ")
            ));
        }

        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(format!(
                "invalid log format '{}'. Valid values: {}",
                self.logging.format,
                valid_formats.join(", ")
            ));
        }

        Ok(())
    }
}
