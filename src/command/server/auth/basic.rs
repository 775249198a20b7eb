use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::rights::{self, RightsPolicy, RightsRequest};
use super::{
    AccessMethod, Authenticator, AuthenticatorFactory, AuthenticatorKind, CredentialValidator,
    RequestContext,
};
use crate::command::server::request_ext::HeaderExt;
use crate::configuration::Error as ConfigError;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rights: rights::Config,
}

/// HTTP Basic credentials carried by the `Authorization` header.
pub struct BasicAuth {
    credentials: Arc<dyn CredentialValidator>,
    rights: RightsPolicy,
}

impl BasicAuth {
    pub fn new(
        config: &Config,
        credentials: Arc<dyn CredentialValidator>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            credentials,
            rights: RightsPolicy::new(&config.rights)?,
        })
    }
}

impl AuthenticatorFactory for BasicAuth {
    fn kind(&self) -> AuthenticatorKind {
        AuthenticatorKind::Basic
    }

    fn instantiate<'r>(&'r self, request: &'r RequestContext) -> Box<dyn Authenticator + 'r> {
        Box::new(BasicAuthenticator {
            config: self,
            request,
            identifier: String::new(),
        })
    }
}

pub struct BasicAuthenticator<'r> {
    config: &'r BasicAuth,
    request: &'r RequestContext,
    identifier: String,
}

impl Authenticator for BasicAuthenticator<'_> {
    fn name(&self) -> &'static str {
        AuthenticatorKind::Basic.as_str()
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn authenticate(&mut self) -> Option<String> {
        let (username, password) = self.request.headers().basic_auth()?;

        let Some(principal) = self.config.credentials.validate(&username, &password) else {
            debug!("Invalid credentials for '{username}'");
            return None;
        };

        if !principal.active {
            debug!("User '{username}' is inactive");
            return None;
        }

        self.identifier = principal.username.clone();
        self.request.attach_principal(principal);
        Some(self.identifier.clone())
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
