//! Run configuration.
//!
//! Loaded from a file (TOML, YAML or JSON, picked by extension) layered with
//! `JMXEVAL__*` environment variables, e.g. `JMXEVAL__QUERY__VAR`.
//!
//! ```toml
//! state_file = "/var/lib/jmxeval/state.properties"
//!
//! [connection]
//! url = "http://localhost:8778/jolokia"
//!
//! [query]
//! var = "RequestsPerMinute"
//! object_name = "com.example:type=Server"
//! attribute = "RequestCount"
//! ```

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

use crate::query::QueryDefinition;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "JMXEVAL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid [connection] section: {0}")]
    InvalidConnection(String),
}

/// Everything one invocation needs.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Where rate samples persist between runs.
    pub state_file: PathBuf,
    /// How to reach the agent; absent means no session.
    #[serde(default)]
    pub connection: Option<ConnectionSettings>,
    pub query: QueryDefinition,
}

/// Where attribute values come from.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionSettings {
    /// Jolokia agent endpoint.
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Request timeout, seconds.
    pub timeout_secs: Option<u64>,
    /// JSON file of pre-recorded attribute values.
    pub snapshot: Option<PathBuf>,
}

/// The kind of connection a [`ConnectionSettings`] asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget<'a> {
    Jolokia(&'a str),
    Snapshot(&'a Path),
}

impl ConnectionSettings {
    /// Exactly one of `url` and `snapshot` must be set.
    pub fn target(&self) -> Result<ConnectionTarget<'_>, ConfigError> {
        match (self.url.as_deref(), self.snapshot.as_deref()) {
            (Some(url), None) => Ok(ConnectionTarget::Jolokia(url)),
            (None, Some(path)) => Ok(ConnectionTarget::Snapshot(path)),
            (Some(_), Some(_)) => Err(ConfigError::InvalidConnection(
                "set either url or snapshot, not both".to_string(),
            )),
            (None, None) => Err(ConfigError::InvalidConnection(
                "one of url or snapshot is required".to_string(),
            )),
        }
    }
}

impl Settings {
    /// Load settings from `path` and the environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Self::from_config(config)
    }

    /// Deserialize and validate already-built configuration.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let settings: Settings = config.try_deserialize()?;
        if let Some(connection) = &settings.connection {
            connection.target()?;
        }
        Ok(settings)
    }
}
