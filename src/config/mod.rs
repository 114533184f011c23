//! Configuration types and loading for the DNS proxy.

use crate::dns::cache::CacheConfig;
use crate::dns::resolver::StatsHandle;
use crate::dns::server::{ClientTimeout, ServerConfig, TcpConfig, UdpConfig};
use crate::dns::upstream::UpstreamConfig;
use crate::error::InvalidReorderingMode;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::time::Duration;

/// Default config.yaml embedded at compile time
pub const DEFAULT_CONFIG_YAML: &str = include_str!("../../config.yaml");

/// Main configuration struct for the proxy
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// UDP listen address; omit to disable the UDP server.
    #[serde(default)]
    pub listen_udp: Option<String>,
    /// TCP listen address; omit to disable the TCP server.
    #[serde(default)]
    pub listen_tcp: Option<String>,
    /// Upstream DNS servers, tried in order.
    #[serde(default)]
    pub upstreams: Vec<String>,
    /// Static name-to-IPv4 answers served before asking upstreams.
    #[serde(default)]
    pub hosts: HashMap<String, String>,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub upstream: UpstreamSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ============== Cache ==============

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSection {
    /// One of "none", "random", "rotation".
    #[serde(default = "default_reordering")]
    pub reordering: String,
    #[serde(default)]
    pub enable_negative_caching: bool,
    /// Maximum seconds any record stays cached. 0 selects the default.
    #[serde(default = "default_cache_max_ttl")]
    pub max_ttl: u32,
    /// Maximum number of cached responses. 0 means unbounded.
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,
}

fn default_reordering() -> String {
    "none".to_string()
}

fn default_cache_max_ttl() -> u32 {
    3600
}

fn default_cache_max_size() -> usize {
    10000
}

impl Default for CacheSection {
    fn default() -> Self {
        CacheSection {
            reordering: default_reordering(),
            enable_negative_caching: false,
            max_ttl: default_cache_max_ttl(),
            max_size: default_cache_max_size(),
        }
    }
}

impl CacheSection {
    /// Builds the cache configuration, validating the reordering mode.
    pub fn to_cache_config(&self, stats: StatsHandle) -> Result<CacheConfig, InvalidReorderingMode> {
        Ok(CacheConfig {
            reordering: self.reordering.parse()?,
            enable_negative_caching: self.enable_negative_caching,
            max_ttl: self.max_ttl,
            max_size: self.max_size,
            stats,
            clock: None,
            rng: None,
        })
    }
}

// ============== Server ==============

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// TCP client timeout in milliseconds. 0 selects the RFC 1035 default of
    /// two minutes; a negative value disables the timeout.
    #[serde(default)]
    pub tcp_client_timeout_ms: i64,
    /// Per-request resolver timeout in milliseconds. 0 disables it.
    #[serde(default = "default_resolver_timeout_ms")]
    pub resolver_timeout_ms: u64,
    /// Handle UDP requests inline instead of one task per packet.
    #[serde(default)]
    pub udp_disable_concurrency: bool,
}

fn default_resolver_timeout_ms() -> u64 {
    2000
}

impl Default for ServerSection {
    fn default() -> Self {
        ServerSection {
            tcp_client_timeout_ms: 0,
            resolver_timeout_ms: default_resolver_timeout_ms(),
            udp_disable_concurrency: false,
        }
    }
}

impl ServerSection {
    pub fn to_server_config(&self) -> ServerConfig {
        let client_timeout = match self.tcp_client_timeout_ms {
            0 => ClientTimeout::Standard,
            ms if ms < 0 => ClientTimeout::Disabled,
            ms => ClientTimeout::Custom(Duration::from_millis(ms as u64)),
        };
        let resolver_timeout = match self.resolver_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        ServerConfig {
            tcp: TcpConfig {
                client_timeout,
                resolver_timeout,
            },
            udp: UdpConfig {
                disable_concurrency: self.udp_disable_concurrency,
                resolver_timeout,
            },
        }
    }
}

// ============== Upstream ==============

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamSection {
    /// Timeout per upstream attempt, in milliseconds.
    #[serde(default = "default_upstream_timeout_ms")]
    pub timeout_ms: u64,
    /// Extra passes over the upstream list after the first.
    #[serde(default = "default_upstream_max_retries")]
    pub max_retries: u32,
}

fn default_upstream_timeout_ms() -> u64 {
    2000
}

fn default_upstream_max_retries() -> u32 {
    1
}

impl Default for UpstreamSection {
    fn default() -> Self {
        UpstreamSection {
            timeout_ms: default_upstream_timeout_ms(),
            max_retries: default_upstream_max_retries(),
        }
    }
}

impl UpstreamSection {
    pub fn to_upstream_config(&self) -> UpstreamConfig {
        UpstreamConfig {
            timeout: Duration::from_millis(self.timeout_ms),
            max_retries: self.max_retries,
        }
    }
}

// ============== Logging ==============

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_requests")]
    pub log_requests: bool,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub file: Option<FileLoggingConfig>,
}

fn default_log_requests() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_requests: true,
            format: LogFormat::Text,
            file: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FileLoggingConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    #[serde(default)]
    pub rotation: LogRotation,
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_file_prefix() -> String {
    "burrow.log".to_string()
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        FileLoggingConfig {
            log_dir: default_log_dir(),
            file_prefix: default_file_prefix(),
            rotation: LogRotation::Daily,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Daily,
    Hourly,
    Never,
}

/// Loads the configuration from `path`, or the embedded default config when
/// no path is given.
pub fn load_config(path: Option<&str>) -> Result<Config, Box<dyn std::error::Error + Send + Sync>> {
    match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            let config: Config = serde_yaml_ng::from_str(&content)?;
            Ok(config)
        }
        None => Ok(serde_yaml_ng::from_str(DEFAULT_CONFIG_YAML)?),
    }
}
