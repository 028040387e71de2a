//! Monitor configuration: thresholds and link parameters, loaded from JSON

use crate::core::{
    PostureThresholds, BACKOFF_INTERVAL_MS, CONNECT_TIMEOUT_MS, DISCOVERY_TIMEOUT_MS,
    NOTIFICATION_CHANNEL, POLL_INTERVAL_MS, TARGET_DEVICE_ADDRESS,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Top-level monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Posture classification limits
    pub thresholds: PostureThresholds,
    /// Weight sensor link parameters
    pub link: LinkConfig,
}

/// Wireless link parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Address of the weight sensor (six colon-separated hex octets)
    pub target_address: String,
    /// UUID of the notification characteristic
    pub notification_channel: String,
    /// Upper bound for one discovery scan (milliseconds)
    pub discovery_timeout_ms: u64,
    /// Upper bound for one connection attempt (milliseconds)
    pub connect_timeout_ms: u64,
    /// Wait before scanning again after a miss or a failure (milliseconds)
    pub backoff_ms: u64,
    /// Connectivity check cadence while connected (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            target_address: TARGET_DEVICE_ADDRESS.to_string(),
            notification_channel: NOTIFICATION_CHANNEL.to_string(),
            discovery_timeout_ms: DISCOVERY_TIMEOUT_MS,
            connect_timeout_ms: CONNECT_TIMEOUT_MS,
            backoff_ms: BACKOFF_INTERVAL_MS,
            poll_interval_ms: POLL_INTERVAL_MS,
        }
    }
}

impl LinkConfig {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            thresholds: PostureThresholds::default(),
            link: LinkConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Invalid parameter value
    #[error("invalid {parameter} = {value}: {reason}")]
    InvalidParameter { parameter: String, value: String, reason: String },
    /// Configuration file I/O error
    #[error("configuration I/O error: {message}")]
    Io { message: String },
    /// JSON serialization/deserialization error
    #[error("configuration format error: {message}")]
    Serialization { message: String },
}

fn invalid(parameter: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl MonitorConfig {
    /// Load and validate a JSON configuration file. Missing fields take
    /// their default values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            message: format!("{}: {}", path.as_ref().display(), e),
        })?;
        let config = Self::from_json(&content)?;
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = serde_json::from_str(content).map_err(|e| ConfigError::Serialization {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialization {
            message: e.to_string(),
        })
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        self.validate()?;
        let content = self.to_json()?;
        fs::write(path.as_ref(), content).map_err(|e| ConfigError::Io {
            message: format!("{}: {}", path.as_ref().display(), e),
        })
    }

    /// Check every parameter against its allowed range
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (parameter, value) in [
            ("thresholds.neck_angle_deg", self.thresholds.neck_angle_deg),
            ("thresholds.shoulder_tilt_deg", self.thresholds.shoulder_tilt_deg),
        ] {
            if !value.is_finite() || value <= 0.0 || value > 90.0 {
                return Err(invalid(parameter, value, "must be within (0, 90] degrees"));
            }
        }

        let link = &self.link;
        if !is_device_address(&link.target_address) {
            return Err(invalid(
                "link.target_address",
                &link.target_address,
                "expected six colon-separated hex octets",
            ));
        }
        if !is_uuid(&link.notification_channel) {
            return Err(invalid(
                "link.notification_channel",
                &link.notification_channel,
                "expected a hyphenated 128-bit UUID",
            ));
        }

        for (parameter, value) in [
            ("link.discovery_timeout_ms", link.discovery_timeout_ms),
            ("link.connect_timeout_ms", link.connect_timeout_ms),
            ("link.backoff_ms", link.backoff_ms),
            ("link.poll_interval_ms", link.poll_interval_ms),
        ] {
            if value == 0 {
                return Err(invalid(parameter, value, "must be greater than zero"));
            }
        }

        Ok(())
    }
}

fn is_device_address(address: &str) -> bool {
    let octets: Vec<&str> = address.split(':').collect();
    octets.len() == 6
        && octets
            .iter()
            .all(|octet| octet.len() == 2 && octet.chars().all(|c| c.is_ascii_hexdigit()))
}

fn is_uuid(value: &str) -> bool {
    const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];
    let groups: Vec<&str> = value.split('-').collect();
    groups.len() == GROUPS.len()
        && groups
            .iter()
            .zip(GROUPS)
            .all(|(group, len)| group.len() == len && group.chars().all(|c| c.is_ascii_hexdigit()))
}
