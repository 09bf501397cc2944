//! dio.toml configuration.
//!
//! Settings are layered: built-in defaults, then the TOML file (if any),
//! then command-line flags. Every layer is a [`ConfigLayer`] of optional
//! raw values; [`DaemonConfig::resolve`] validates the merged result.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// One layer of raw settings. Unset fields fall through to the layer below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub listen_addr: Option<String>,
    pub registry_path: Option<PathBuf>,
    pub health_interval: Option<String>,
    pub probe_timeout: Option<String>,
    pub eviction_threshold: Option<u32>,
    pub autoscale_interval: Option<String>,
    pub autoscale_threshold: Option<usize>,
    pub worker_image: Option<String>,
    pub spawn_timeout: Option<String>,
    pub dispatch_timeout: Option<String>,
    pub container_runtime: Option<String>,
    pub worker_network: Option<String>,
    pub manager_addr: Option<String>,
}

impl ConfigLayer {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Overlay `other` on top of `self`.
    pub fn merge(self, other: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            listen_addr: other.listen_addr.or(self.listen_addr),
            registry_path: other.registry_path.or(self.registry_path),
            health_interval: other.health_interval.or(self.health_interval),
            probe_timeout: other.probe_timeout.or(self.probe_timeout),
            eviction_threshold: other.eviction_threshold.or(self.eviction_threshold),
            autoscale_interval: other.autoscale_interval.or(self.autoscale_interval),
            autoscale_threshold: other.autoscale_threshold.or(self.autoscale_threshold),
            worker_image: other.worker_image.or(self.worker_image),
            spawn_timeout: other.spawn_timeout.or(self.spawn_timeout),
            dispatch_timeout: other.dispatch_timeout.or(self.dispatch_timeout),
            container_runtime: other.container_runtime.or(self.container_runtime),
            worker_network: other.worker_network.or(self.worker_network),
            manager_addr: other.manager_addr.or(self.manager_addr),
        }
    }
}

/// Fully resolved daemon settings.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub listen_addr: SocketAddr,
    pub registry_path: PathBuf,
    pub health_interval: Duration,
    pub probe_timeout: Duration,
    /// Consecutive failed probes before a worker is evicted. 0 disables.
    pub eviction_threshold: u32,
    pub autoscale_interval: Duration,
    /// Minimum number of live workers.
    pub autoscale_threshold: usize,
    pub worker_image: String,
    /// How long a requested spawn counts toward the live total.
    pub spawn_timeout: Duration,
    pub dispatch_timeout: Duration,
    pub container_runtime: String,
    pub worker_network: Option<String>,
    /// Address spawned workers use to register, passed as `DIO_MANAGER_ADDR`.
    pub manager_addr: Option<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 50051)),
            registry_path: PathBuf::from("dio_registry.redb"),
            health_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(2),
            eviction_threshold: 3,
            autoscale_interval: Duration::from_secs(15),
            autoscale_threshold: 1,
            worker_image: "dio-python-worker:latest".to_string(),
            spawn_timeout: Duration::from_secs(120),
            dispatch_timeout: Duration::from_secs(30),
            container_runtime: "docker".to_string(),
            worker_network: None,
            manager_addr: None,
        }
    }
}

impl DaemonConfig {
    /// Apply a merged layer on top of the defaults, validating each value.
    pub fn resolve(layer: ConfigLayer) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(addr) = layer.listen_addr {
            config.listen_addr = addr.parse().map_err(|e| ConfigError::Invalid {
                key: "listen_addr",
                reason: format!("{addr:?}: {e}"),
            })?;
        }
        if let Some(path) = layer.registry_path {
            config.registry_path = path;
        }
        if let Some(s) = layer.health_interval {
            config.health_interval = positive_duration("health_interval", &s)?;
        }
        if let Some(s) = layer.probe_timeout {
            config.probe_timeout = positive_duration("probe_timeout", &s)?;
        }
        if let Some(n) = layer.eviction_threshold {
            config.eviction_threshold = n;
        }
        if let Some(s) = layer.autoscale_interval {
            config.autoscale_interval = positive_duration("autoscale_interval", &s)?;
        }
        if let Some(n) = layer.autoscale_threshold {
            config.autoscale_threshold = n;
        }
        if let Some(image) = layer.worker_image {
            if image.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    key: "worker_image",
                    reason: "must not be empty".to_string(),
                });
            }
            config.worker_image = image;
        }
        if let Some(s) = layer.spawn_timeout {
            config.spawn_timeout = positive_duration("spawn_timeout", &s)?;
        }
        if let Some(s) = layer.dispatch_timeout {
            config.dispatch_timeout = positive_duration("dispatch_timeout", &s)?;
        }
        if let Some(runtime) = layer.container_runtime {
            config.container_runtime = runtime;
        }
        config.worker_network = layer.worker_network.or(config.worker_network);
        config.manager_addr = layer.manager_addr.or(config.manager_addr);

        Ok(config)
    }
}

fn positive_duration(key: &'static str, s: &str) -> ConfigResult<Duration> {
    match parse_duration(s) {
        Some(d) if !d.is_zero() => Ok(d),
        Some(_) => Err(ConfigError::Invalid {
            key,
            reason: "must be greater than zero".to_string(),
        }),
        None => Err(ConfigError::Invalid {
            key,
            reason: format!("{s:?} is not a duration (expected e.g. 500ms, 30s, 2m)"),
        }),
    }
}

/// Parse a duration string like "5s", "500ms", "2m". A bare number is seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
