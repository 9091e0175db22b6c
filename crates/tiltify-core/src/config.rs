//! Configuration types for the Tiltify bridge
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Tiltify REST API base URL
pub const DEFAULT_API_BASE_URL: &str = "https://tiltify.com/api/v3/";

/// Main bridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TiltifyConfig {
    /// Connection (credential + campaign) configuration
    pub connection: ConnectionConfig,

    /// State store configuration
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl TiltifyConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.connection.validate()?;
        self.state_store.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Per-connection settings: which campaign to poll, with which credential
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the credential.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Opaque bearer token for the Tiltify API
    /// ⚠️ NEVER log this value
    #[serde(default)]
    pub credential: String,

    /// Campaign to fetch donations for
    #[serde(default)]
    pub campaign_id: String,

    /// How often to poll for new donations (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Base URL of the Tiltify REST API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("credential", &"<REDACTED>")
            .field("campaign_id", &self.campaign_id)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

impl ConnectionConfig {
    /// Create a connection configuration with the default interval and API URL
    pub fn new(credential: impl Into<String>, campaign_id: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
            campaign_id: campaign_id.into(),
            poll_interval_secs: default_poll_interval_secs(),
            api_base_url: default_api_base_url(),
        }
    }

    /// Set the poll interval (in seconds)
    pub fn with_poll_interval_secs(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    /// Set the API base URL
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Validate the connection configuration
    ///
    /// Checks presence only; no network calls are made here.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.credential.trim().is_empty() {
            return Err(crate::Error::config("Tiltify access token cannot be empty"));
        }
        if self.campaign_id.trim().is_empty() {
            return Err(crate::Error::config("Campaign ID cannot be empty"));
        }
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(crate::Error::config("API base URL cannot be empty"));
        }
        Ok(())
    }

    /// The poll interval as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_secs.saturating_mul(1000))
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(String::new(), String::new())
    }
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

/// State store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based state store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory state store (not persistent)
    #[default]
    Memory,
}

impl StateStoreConfig {
    /// Validate the state store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StateStoreConfig::File { path } if path.trim().is_empty() => {
                Err(crate::Error::config("State file path cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the state store type name
    pub fn type_name(&self) -> &'static str {
        match self {
            StateStoreConfig::File { .. } => "file",
            StateStoreConfig::Memory => "memory",
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound for each call to the donation source (in seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Size of the delivered-id recency window per campaign
    ///
    /// The window only needs to cover the overlap the server-side "after"
    /// filter can produce; `lastId` remains the resume cursor.
    ///
    /// Set to 0 to keep every delivered id.
    #[serde(default = "default_max_tracked_ids")]
    pub max_tracked_ids: usize,

    /// Capacity of the donation event channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Capacity of the connection signal channel
    ///
    /// When full, new connect/disconnect signals are dropped (with a warning log).
    #[serde(default = "default_connection_event_capacity")]
    pub connection_event_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    ///
    /// A zero request timeout would fail every upstream call.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.request_timeout_secs == 0 {
            return Err(crate::Error::config("Request timeout must be > 0"));
        }
        Ok(())
    }

    /// The request timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            max_tracked_ids: default_max_tracked_ids(),
            event_channel_capacity: default_event_channel_capacity(),
            connection_event_capacity: default_connection_event_capacity(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_tracked_ids() -> usize {
    10_000
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_connection_event_capacity() -> usize {
    64
}
