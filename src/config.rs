//! Sampler configuration.
//!
//! Supplied once at construction by the hosting agent and immutable
//! afterwards. The core performs no config loading of its own.

use serde::{Deserialize, Serialize};

/// A filesystem path monitored for disk usage, reported under `alias`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct MountSpec {
    /// Stable name used as the metric key prefix instead of the raw path.
    pub alias: String,
    /// Filesystem path to measure.
    pub path: String,
}

impl MountSpec {
    pub fn new(alias: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            path: path.into(),
        }
    }
}

/// Configuration for a [`HealthSampler`](crate::sampler::HealthSampler).
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct SamplerConfig {
    /// Network interface monitored for utilization. When unset, or when the
    /// interface is absent from the snapshot, the network signal is empty
    /// and the use rate is driven by CPU alone.
    pub interface: Option<String>,
    /// Nominal interface speed in bits per second. Required when
    /// `interface` is set.
    pub interface_speed_bits: u64,
    /// Available-memory floor, in bytes, below which the host is unhealthy.
    pub oom_threshold_bytes: u64,
    /// Sampling interval in seconds. Only used as the time base of the
    /// network utilization formula; scheduling belongs to the caller.
    pub interval_secs: u64,
    /// Utilization percent above which CPU and network alerts are logged.
    pub load_threshold_percent: f64,
    /// Mount points monitored for disk usage.
    pub mounts: Vec<MountSpec>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interface: None,
            interface_speed_bits: 0,
            oom_threshold_bytes: 1_000_000_000,
            interval_secs: 5,
            load_threshold_percent: 10.0,
            mounts: Vec::new(),
        }
    }
}

impl SamplerConfig {
    /// Checks cross-field requirements.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interface.is_some() && self.interface_speed_bits == 0 {
            return Err(ConfigError::MissingInterfaceSpeed);
        }
        if self.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}

/// Configuration validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An interface is monitored but no link speed was given.
    MissingInterfaceSpeed,
    /// The sampling interval must be positive.
    ZeroInterval,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingInterfaceSpeed => {
                write!(f, "interface_speed_bits is required when interface is set")
            }
            ConfigError::ZeroInterval => write!(f, "interval_secs must be positive"),
        }
    }
}

impl std::error::Error for ConfigError {}
