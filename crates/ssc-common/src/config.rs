//! Configuration structures for the PWM-SSC signal generator.
//!
//! Supports TOML deserialization with defaults matching a 24 kHz bit clock
//! and a 64-bit frame.

use crate::error::SscError;
use crate::signal::SignalSet;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SscConfig {
    /// Clock, sync and stamp channel parameters.
    pub signals: SignalSet,

    /// Simulated PWM controller parameters.
    pub simulation: SimulationConfig,

    /// Daemon behaviour.
    pub daemon: DaemonConfig,
}

/// Simulated PWM controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of channels the controller exposes.
    pub channel_count: u32,

    /// Number of alignment pulses that fail before the controller recovers.
    pub sync_failures: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            channel_count: 4,
            sync_failures: 0,
        }
    }
}

/// Daemon behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Interval between status log lines.
    #[serde(with = "humantime_serde")]
    pub status_interval: Duration,

    /// Extra `enable()` attempts after a failed alignment pulse.
    pub enable_retries: u32,

    /// Pause between `enable()` attempts.
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            status_interval: Duration::from_secs(1),
            enable_retries: 3,
            retry_delay: Duration::from_millis(10),
        }
    }
}

impl SscConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check the configuration for values the hardware would reject.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for bad waveform parameters, channels
    /// shared between roles, or a role outside the simulated controller.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.signals.validate()?;
        for role in crate::signal::SignalRole::ALL {
            let channel = self.signals.get(role).channel;
            if channel >= self.simulation.channel_count {
                return Err(ConfigError::Invalid(SscError::ChannelUnavailable {
                    channel,
                    reason: format!(
                        "{role} channel outside controller ({} channels)",
                        self.simulation.channel_count
                    ),
                }));
            }
        }
        Ok(())
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Parsed but unusable values.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] SscError),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
