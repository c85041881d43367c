//! Configuration types for podcatcher

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Main configuration for the refresh engine
///
/// Every field has a default, so a partial JSON/TOML document (or
/// `Config::default()`) is a valid configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Durable subscription state file (default: "./podcatcher.json")
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Storage root for retrieved episode payloads (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// How often every subscription is refreshed (default: 30 minutes)
    #[serde(default = "default_refresh_interval", with = "duration_serde")]
    pub refresh_interval: Duration,

    /// HTTP timeout for fetching feed documents (default: 30 seconds)
    ///
    /// Payload retrieval is not bounded by this timeout.
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    pub fetch_timeout: Duration,

    /// Feed documents fetched in parallel during one refresh cycle (default: 1)
    ///
    /// Merging stays serialized in the engine loop regardless of this value.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Capacity of the request queue feeding the engine loop (default: 64)
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            download_dir: default_download_dir(),
            refresh_interval: default_refresh_interval(),
            fetch_timeout: default_fetch_timeout(),
            fetch_concurrency: default_fetch_concurrency(),
            user_agent: default_user_agent(),
            command_buffer: default_command_buffer(),
        }
    }
}

impl Config {
    /// Config with the given state file and refresh interval, defaults elsewhere
    pub fn new(state_path: impl Into<PathBuf>, refresh_interval: Duration) -> Self {
        Self {
            state_path: state_path.into(),
            refresh_interval,
            ..Default::default()
        }
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval.is_zero() {
            return Err(Error::config(
                "refresh_interval",
                "refresh interval must be greater than zero",
            ));
        }
        if self.fetch_concurrency == 0 {
            return Err(Error::config(
                "fetch_concurrency",
                "fetch concurrency must be at least 1",
            ));
        }
        if self.command_buffer == 0 {
            return Err(Error::config(
                "command_buffer",
                "command buffer must be at least 1",
            ));
        }
        Ok(())
    }
}

// Default value functions
fn default_state_path() -> PathBuf {
    PathBuf::from("podcatcher.json")
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(30 * 60) // 30 minutes
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_fetch_concurrency() -> usize {
    1
}

fn default_user_agent() -> String {
    format!("podcatcher/{}", env!("CARGO_PKG_VERSION"))
}

fn default_command_buffer() -> usize {
    64
}

// Duration serialization helper
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
