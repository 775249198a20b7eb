use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::net::IpAddr;
use std::path::Path;

mod error;
pub mod watcher;

use crate::command::server::auth::{AuthConfig, ResourceConfig};
use crate::session_store;
pub use error::Error;

#[derive(Clone, Debug, Deserialize)]
pub struct Configuration {
    pub server: ServerConfig,
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub session_store: session_store::Config,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub resource: HashMap<String, ResourceConfig>, // hashmap of resource name <-> resource config
    #[serde(default)]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
    #[serde(default = "ServerConfig::default_query_timeout")]
    pub query_timeout: u64,
    #[serde(default = "ServerConfig::default_query_timeout_grace_period")]
    pub query_timeout_grace_period: u64,
    /// Trust `X-Forwarded-*` / `X-Original-*` headers set by a fronting proxy
    #[serde(default)]
    pub forwarded_headers: bool,
    #[serde(default = "ServerConfig::default_max_body_size")]
    pub max_body_size: usize,
}

impl ServerConfig {
    fn default_port() -> u16 {
        8000
    }

    fn default_query_timeout() -> u64 {
        3600
    }

    fn default_query_timeout_grace_period() -> u64 {
        60
    }

    fn default_max_body_size() -> usize {
        64 * 1024
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct GlobalConfig {
    #[serde(default = "GlobalConfig::default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        GlobalConfig {
            max_concurrent_requests: GlobalConfig::default_max_concurrent_requests(),
        }
    }
}

impl GlobalConfig {
    fn default_max_concurrent_requests() -> usize {
        4
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub tracing: Option<TracingConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TracingConfig {
    pub endpoint: String,
    pub sampling_rate: f64,
}

impl Configuration {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let config_str = fs::read_to_string(path)?;
        Self::load_from_str(&config_str)
    }

    pub fn load_from_str(slice: &str) -> Result<Self, Error> {
        let config: Configuration = toml::from_str(slice)?;

        if config.global.max_concurrent_requests == 0 {
            return Err(Error::ConfigurationFileFormat(
                "global.max_concurrent_requests must be at least 1".to_string(),
            ));
        }

        for (name, resource) in &config.resource {
            if resource.path.is_empty() {
                return Err(Error::InvalidAuthenticator(format!(
                    "resource '{name}' has an empty path"
                )));
            }
        }

        Ok(config)
    }
}
