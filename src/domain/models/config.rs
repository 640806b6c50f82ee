//! Configuration tree loaded by the infrastructure config loader.

use serde::{Deserialize, Serialize};

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database settings
    pub database: DatabaseConfig,
    /// In-memory store settings
    pub memory_store: MemoryStoreConfig,
    /// Object storage settings
    pub object_storage: ObjectStorageConfig,
    /// Logging settings
    pub logging: LoggingConfig,
    /// Scheduler tuning
    pub scheduler: SchedulerConfig,
    /// Base URL agents use to reach this server
    pub base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            memory_store: MemoryStoreConfig::default(),
            object_storage: ObjectStorageConfig::default(),
            logging: LoggingConfig::default(),
            scheduler: SchedulerConfig::default(),
            base_url: "http://localhost:8080".to_string(),
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub path: String,
    /// Pool size
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: ".cipherswarm/cipherswarm.db".to_string(),
            max_connections: 5,
        }
    }
}

/// In-memory store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStoreConfig {
    /// Redis URL; empty selects the in-process store
    pub redis_url: String,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            redis_url: String::new(),
        }
    }
}

/// Object storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStorageConfig {
    /// HTTP endpoint of the blob store; empty selects the local directory store
    pub endpoint: String,
    /// Directory for the local store
    pub local_path: String,
    /// Per-probe timeout in seconds
    pub probe_timeout_secs: u64,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            local_path: ".cipherswarm/objects".to_string(),
            probe_timeout_secs: 5,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Output format: json or pretty
    pub format: String,
    /// Optional directory for rolling file output
    pub log_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            log_dir: None,
        }
    }
}

/// Scheduler tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between heartbeat-loss sweeps
    pub monitor_interval_secs: u64,
    /// Seconds an ETA result stays cached
    pub eta_cache_secs: u64,
    /// Seconds a health snapshot stays cached
    pub health_cache_secs: u64,
    /// TTL of the health-check named lock
    pub health_lock_ttl_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            monitor_interval_secs: 30,
            eta_cache_secs: 60,
            health_cache_secs: 30,
            health_lock_ttl_secs: 30,
        }
    }
}
