use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::deploy::INIT_ACTOR;
use crate::invoke::CONFIRMATIONS;
use crate::workflow::{CallOptions, SetupFields};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Client settings, usually read from a TOML file.
///
/// ```toml
/// rpc_url = "http://127.0.0.1:1234/rpc/v0"
/// rpc_token = "..."
/// actor = "t01003"
/// confirmations = 1
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rpc_url: Option<String>,
    pub rpc_token: Option<String>,
    pub actor: Option<String>,
    pub init_actor: String,
    pub confirmations: u64,
    pub grace_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: None,
            rpc_token: None,
            actor: None,
            init_actor: INIT_ACTOR.to_owned(),
            confirmations: CONFIRMATIONS,
            grace_ms: 300,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn call_options(&self) -> CallOptions {
        CallOptions {
            confirmations: self.confirmations,
            grace: Duration::from_millis(self.grace_ms),
        }
    }

    /// Setup fields prefilled from this config; missing values stay empty.
    pub fn setup_fields(&self) -> SetupFields {
        SetupFields {
            actor: self.actor.clone().unwrap_or_default(),
            rpc_url: self.rpc_url.clone().unwrap_or_default(),
            rpc_token: self.rpc_token.clone().unwrap_or_default(),
        }
    }
}
