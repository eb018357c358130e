//! Client configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `WSUPGRADE__*` environment variables.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::headers::{HeaderError, HttpHeaders};

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "WSUPGRADE";

/// Default handshake timeout in milliseconds.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Time allowed for the upgrade handshake. Zero disables the timeout.
    pub handshake_timeout_ms: u64,
    /// Sent as `User-Agent` unless a request sets its own.
    pub user_agent: Option<String>,
    /// Headers added to every request that does not already carry them.
    pub default_headers: BTreeMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            user_agent: None,
            default_headers: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    /// Load the configuration, reading `path` if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("handshake_timeout_ms", DEFAULT_HANDSHAKE_TIMEOUT_MS as i64)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let built = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("building client configuration")?;

        let config: Self = built
            .try_deserialize()
            .context("deserializing client configuration")?;
        config.headers().context("invalid default headers")?;
        Ok(config)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Default headers, including the user agent.
    pub fn headers(&self) -> Result<HttpHeaders, HeaderError> {
        let mut headers = HttpHeaders::try_from_pairs(&self.default_headers)?;
        if let Some(user_agent) = &self.user_agent {
            headers.set(http::header::USER_AGENT.as_str(), user_agent)?;
        }
        Ok(headers)
    }
}
