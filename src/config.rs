// src/config.rs

//! Manages gateway configuration: loading, defaults, and validation.

use crate::core::translation::protocol::ModelType;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// Throttle and eviction settings for the presence tracker.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PresenceConfig {
    /// Minimum interval between persisted "last active" updates per identity.
    #[serde(with = "humantime_serde", default = "default_activity_throttle")]
    pub activity_throttle: Duration,
    /// Minimum interval between persisted connection-event updates per identity.
    /// Must be strictly greater than `activity_throttle`.
    #[serde(with = "humantime_serde", default = "default_connection_throttle")]
    pub connection_throttle: Duration,
    /// How often the background sweeper runs.
    #[serde(with = "humantime_serde", default = "default_presence_sweep_interval")]
    pub sweep_interval: Duration,
    /// Entries idle longer than this are evicted from the in-memory cache.
    #[serde(with = "humantime_serde", default = "default_presence_max_idle")]
    pub max_idle: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            activity_throttle: default_activity_throttle(),
            connection_throttle: default_connection_throttle(),
            sweep_interval: default_presence_sweep_interval(),
            max_idle: default_presence_max_idle(),
        }
    }
}

fn default_activity_throttle() -> Duration {
    Duration::from_secs(5)
}
fn default_connection_throttle() -> Duration {
    Duration::from_secs(60)
}
fn default_presence_sweep_interval() -> Duration {
    Duration::from_secs(60)
}
fn default_presence_max_idle() -> Duration {
    Duration::from_secs(30 * 60)
}

/// Settings for the per-conversation target-language cache.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LanguageCacheConfig {
    /// Entries older than this are treated as absent.
    #[serde(with = "humantime_serde", default = "default_language_cache_ttl")]
    pub ttl: Duration,
    /// Maximum number of cached conversations. Inserting beyond this evicts
    /// the oldest entry by insertion order.
    #[serde(default = "default_language_cache_max_entries")]
    pub max_entries: usize,
    /// How often the background purger drops expired entries proactively.
    #[serde(with = "humantime_serde", default = "default_language_cache_purge_interval")]
    pub purge_interval: Duration,
}

impl Default for LanguageCacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_language_cache_ttl(),
            max_entries: default_language_cache_max_entries(),
            purge_interval: default_language_cache_purge_interval(),
        }
    }
}

fn default_language_cache_ttl() -> Duration {
    Duration::from_secs(10 * 60)
}
fn default_language_cache_max_entries() -> usize {
    1000
}
fn default_language_cache_purge_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

/// Settings for the in-process room fan-out bus.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RoomsConfig {
    /// How often empty rooms and personal channels are purged.
    #[serde(with = "humantime_serde", default = "default_room_purge_interval")]
    pub purge_interval: Duration,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            purge_interval: default_room_purge_interval(),
        }
    }
}

fn default_room_purge_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

/// Transport used to reach the translation worker pool.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkerMode {
    /// JSON-lines over two TCP sockets (request push + result events).
    #[default]
    Tcp,
    /// In-process echo worker. Intended for local development only.
    Echo,
}

/// Configuration for the translation worker RPC channel.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WorkerConfig {
    #[serde(default)]
    pub mode: WorkerMode,
    /// Address the gateway pushes translation requests to.
    #[serde(default = "default_worker_request_addr")]
    pub request_addr: String,
    /// Address the gateway receives completion/error events from.
    #[serde(default = "default_worker_events_addr")]
    pub events_addr: String,
    /// A dispatched request with no matching event within this window is
    /// considered lost.
    #[serde(with = "humantime_serde", default = "default_task_timeout")]
    pub task_timeout: Duration,
    /// Bounded wait for the synchronous `translate_direct` path before the
    /// deterministic fallback result is returned.
    #[serde(with = "humantime_serde", default = "default_direct_timeout")]
    pub direct_timeout: Duration,
    /// Model tier requested when the caller does not specify one.
    #[serde(default)]
    pub default_model: ModelType,
    /// Messages longer than this are persisted but never sent for translation.
    #[serde(default = "default_max_translation_length")]
    pub max_translation_length: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            mode: WorkerMode::default(),
            request_addr: default_worker_request_addr(),
            events_addr: default_worker_events_addr(),
            task_timeout: default_task_timeout(),
            direct_timeout: default_direct_timeout(),
            default_model: ModelType::default(),
            max_translation_length: default_max_translation_length(),
        }
    }
}

fn default_worker_request_addr() -> String {
    "127.0.0.1:5555".to_string()
}
fn default_worker_events_addr() -> String {
    "127.0.0.1:5558".to_string()
}
fn default_task_timeout() -> Duration {
    Duration::from_secs(30)
}
fn default_direct_timeout() -> Duration {
    Duration::from_secs(5)
}
fn default_max_translation_length() -> usize {
    10_000
}

/// Message validation limits, aligned with what clients enforce.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LimitsConfig {
    /// Maximum message length in characters, validated at send time.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_length: default_max_message_length(),
        }
    }
}

fn default_max_message_length() -> usize {
    2000
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    /// The port for the Prometheus metrics server.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    9600
}

/// A raw representation of the config file before validation.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    limits: LimitsConfig,
    #[serde(default)]
    presence: PresenceConfig,
    #[serde(default)]
    language_cache: LanguageCacheConfig,
    #[serde(default)]
    rooms: RoomsConfig,
    #[serde(default)]
    worker: WorkerConfig,
    #[serde(default)]
    metrics: MetricsConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// The validated gateway configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub limits: LimitsConfig,
    pub presence: PresenceConfig,
    pub language_cache: LanguageCacheConfig,
    pub rooms: RoomsConfig,
    pub worker: WorkerConfig,
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            limits: LimitsConfig::default(),
            presence: PresenceConfig::default(),
            language_cache: LanguageCacheConfig::default(),
            rooms: RoomsConfig::default(),
            worker: WorkerConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Loads and validates the configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow!("could not read config file '{path}': {e}"))?;
        let raw: RawConfig = toml::from_str(&contents)
            .map_err(|e| anyhow!("could not parse config file '{path}': {e}"))?;

        let config = Self {
            log_level: raw.log_level,
            limits: raw.limits,
            presence: raw.presence,
            language_cache: raw.language_cache,
            rooms: raw.rooms,
            worker: raw.worker,
            metrics: raw.metrics,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that would violate the gateway's invariants.
    pub fn validate(&self) -> Result<()> {
        if self.presence.connection_throttle <= self.presence.activity_throttle {
            return Err(anyhow!(
                "presence.connection_throttle ({:?}) must be greater than presence.activity_throttle ({:?})",
                self.presence.connection_throttle,
                self.presence.activity_throttle
            ));
        }
        if self.language_cache.max_entries == 0 {
            return Err(anyhow!("language_cache.max_entries must be at least 1"));
        }
        if self.limits.max_message_length == 0 {
            return Err(anyhow!("limits.max_message_length must be at least 1"));
        }
        if self.worker.direct_timeout.is_zero() || self.worker.task_timeout.is_zero() {
            return Err(anyhow!("worker timeouts must be non-zero"));
        }
        Ok(())
    }
}
