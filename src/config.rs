use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{RelayFetcherError, Result};

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 3;
pub const DEFAULT_EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Tor for `.onion` relays, direct HTTP otherwise.
    #[default]
    Auto,
    Direct,
    Tor,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub connect_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub transport: TransportMode,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FetchConfig {
    pub restricted: Option<bool>,
    pub poll_interval_seconds: Option<u64>,
    pub serialize_runs: Option<bool>,
    pub event_buffer: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub relay: RelayConfig,
    pub fetch: Option<FetchConfig>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| RelayFetcherError::Config(e.to_string()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| RelayFetcherError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.relay.base_url()?;
        if self.relay.timeout_seconds() == 0 {
            return Err(RelayFetcherError::Config(
                "relay.timeout_seconds must be at least 1".to_string(),
            ));
        }
        if self.relay.connect_timeout_seconds() == 0 {
            return Err(RelayFetcherError::Config(
                "relay.connect_timeout_seconds must be at least 1".to_string(),
            ));
        }
        if self.fetch().poll_interval_seconds == Some(0) {
            return Err(RelayFetcherError::Config(
                "fetch.poll_interval_seconds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn fetch(&self) -> FetchConfig {
        self.fetch.clone().unwrap_or_default()
    }

    /// Fill in the relay password when the file leaves it out.
    pub fn with_password(mut self, password: Option<String>) -> Self {
        if self.relay.password.is_none() {
            self.relay.password = password.filter(|p| !p.is_empty());
        }
        self
    }
}

impl RelayConfig {
    pub fn base_url(&self) -> Result<&str> {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| RelayFetcherError::Config("relay.base_url is required".to_string()))
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)
    }

    pub fn connect_timeout_seconds(&self) -> u64 {
        self.connect_timeout_seconds
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECONDS)
    }
}

impl FetchConfig {
    pub fn restricted(&self) -> bool {
        self.restricted.unwrap_or(true)
    }

    pub fn serialize_runs(&self) -> bool {
        self.serialize_runs.unwrap_or(false)
    }

    pub fn event_buffer(&self) -> usize {
        self.event_buffer.unwrap_or(DEFAULT_EVENT_BUFFER).max(1)
    }
}
