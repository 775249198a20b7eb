use serde::Deserialize;

use super::rights::{self, RightsPolicy, RightsRequest};
use super::{AccessMethod, Authenticator, AuthenticatorFactory, AuthenticatorKind, RequestContext};
use crate::configuration::Error as ConfigError;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Identifier used when the origin address of the request is unknown
    #[serde(default = "Config::default_fallback")]
    pub fallback: String,
    #[serde(default)]
    pub rights: rights::Config,
}

impl Config {
    fn default_fallback() -> String {
        "anonymous".to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fallback: Config::default_fallback(),
            rights: rights::Config::default(),
        }
    }
}

/// Identifies every request by its origin address.
pub struct AnonymousAuth {
    fallback: String,
    rights: RightsPolicy,
}

impl AnonymousAuth {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        if config.fallback.is_empty() {
            return Err(ConfigError::InvalidAuthenticator(
                "anonymous fallback identifier must not be empty".to_string(),
            ));
        }

        Ok(Self {
            fallback: config.fallback.clone(),
            rights: RightsPolicy::new(&config.rights)?,
        })
    }
}

impl AuthenticatorFactory for AnonymousAuth {
    fn kind(&self) -> AuthenticatorKind {
        AuthenticatorKind::Anonymous
    }

    fn instantiate<'r>(&'r self, request: &'r RequestContext) -> Box<dyn Authenticator + 'r> {
        let identifier = request
            .remote_address()
            .map_or_else(|| self.fallback.clone(), |address| address.to_string());

        Box::new(AnonymousAuthenticator {
            config: self,
            identifier,
        })
    }
}

pub struct AnonymousAuthenticator<'r> {
    config: &'r AnonymousAuth,
    identifier: String,
}

impl Authenticator for AnonymousAuthenticator<'_> {
    fn name(&self) -> &'static str {
        AuthenticatorKind::Anonymous.as_str()
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn test_rights(&self, model: &str, method: AccessMethod) -> bool {
        self.config.rights.permits(&RightsRequest {
            identifier: &self.identifier,
            authenticator: self.name(),
            model,
            method,
        })
    }
}
