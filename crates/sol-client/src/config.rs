//! Client configuration: a TOML file plus environment overrides.
//!
//! ```toml
//! rpc_url = "https://api.devnet.solana.com"
//! commitment = "confirmed"
//! confirm_timeout_secs = 60
//!
//! [log]
//! level = "debug"
//! format = "json"
//! ```
//!
//! Any key can be overridden with `SOLCLIENT__<KEY>`, nested tables joined
//! by a double underscore: `SOLCLIENT__RPC_URL`, `SOLCLIENT__LOG__LEVEL`.

use std::time::Duration;

use serde::Deserialize;
use sol_rpc::{Commitment, HttpTransport, RpcClient};

use crate::clock::SystemClock;
use crate::dispatcher::Dispatcher;
use crate::error::ClientError;
use crate::logging::LogConfig;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "SOLCLIENT";

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub rpc_url: String,
    /// No default: callers choose between `confirmed` and `finalized`.
    pub commitment: Commitment,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_confirm_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl ClientConfig {
    pub fn new(rpc_url: impl Into<String>, commitment: Commitment) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            commitment,
            request_timeout_secs: default_request_timeout_secs(),
            confirm_timeout_secs: default_confirm_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            log: LogConfig::default(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if !(self.rpc_url.starts_with("http://") || self.rpc_url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "rpc_url must be an http(s) URL, got '{}'",
                self.rpc_url
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(ClientError::Config("poll_interval_ms must be > 0".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ClientError::Config(
                "request_timeout_secs must be > 0".into(),
            ));
        }
        if self.confirm_timeout_secs == 0 {
            return Err(ClientError::Config(
                "confirm_timeout_secs must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Chain reader over HTTP for the configured endpoint.
    pub fn build_client(&self) -> Result<RpcClient<HttpTransport>, ClientError> {
        self.validate()?;
        Ok(RpcClient::new_with_timeout(
            self.rpc_url.clone(),
            self.commitment,
            self.request_timeout(),
        )?)
    }

    /// Dispatcher over HTTP using the configured confirmation timing.
    pub fn build_dispatcher(&self) -> Result<Dispatcher<HttpTransport, SystemClock>, ClientError> {
        Ok(Dispatcher::new(self.build_client()?, SystemClock)
            .with_confirm_timeout(self.confirm_timeout())
            .with_poll_interval(self.poll_interval()))
    }
}

/// Load configuration from a TOML file with `SOLCLIENT__` overrides.
pub fn load_config(path: &str) -> Result<ClientConfig, ClientError> {
    load_config_with_prefix(path, ENV_PREFIX)
}

/// [`load_config`] with a custom environment prefix.
pub fn load_config_with_prefix(path: &str, env_prefix: &str) -> Result<ClientConfig, ClientError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path))
        .add_source(config::Environment::with_prefix(env_prefix).separator("__"));

    let settings: ClientConfig = builder
        .build()
        .map_err(|e| ClientError::Config(format!("failed to build configuration from '{path}': {e}")))?
        .try_deserialize()
        .map_err(|e| ClientError::Config(format!("failed to deserialize configuration: {e}")))?;

    settings.validate()?;
    Ok(settings)
}
