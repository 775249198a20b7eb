use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::rights::{self, RightsPolicy, RightsRequest};
use super::{
    AccessMethod, AntiForgeryValidator, Authenticator, AuthenticatorFactory, AuthenticatorKind,
    RequestContext,
};
use crate::configuration::Error as ConfigError;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_session_cookie")]
    pub session_cookie: String,
    /// Sessions are refreshed for this many seconds on every use when set
    #[serde(default)]
    pub session_ttl: Option<u64>,
    #[serde(default = "Config::default_csrf_cookie")]
    pub csrf_cookie: String,
    #[serde(default = "Config::default_csrf_header")]
    pub csrf_header: String,
    #[serde(default = "Config::default_csrf_field")]
    pub csrf_field: String,
    #[serde(default)]
    pub rights: rights::Config,
}

impl Config {
    fn default_session_cookie() -> String {
        "sessionid".to_string()
    }

    fn default_csrf_cookie() -> String {
        "csrftoken".to_string()
    }

    fn default_csrf_header() -> String {
        "x-csrftoken".to_string()
    }

    fn default_csrf_field() -> String {
        "csrfmiddlewaretoken".to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_cookie: Config::default_session_cookie(),
            session_ttl: None,
            csrf_cookie: Config::default_csrf_cookie(),
            csrf_header: Config::default_csrf_header(),
            csrf_field: Config::default_csrf_field(),
            rights: rights::Config::default(),
        }
    }
}

/// Accepts requests whose principal was resolved from a session before the gate ran.
pub struct SessionAuth {
    anti_forgery: Arc<dyn AntiForgeryValidator>,
    rights: RightsPolicy,
}

impl SessionAuth {
    pub fn new(
        config: &Config,
        anti_forgery: Arc<dyn AntiForgeryValidator>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            anti_forgery,
            rights: RightsPolicy::new(&config.rights)?,
        })
    }
}

impl AuthenticatorFactory for SessionAuth {
    fn kind(&self) -> AuthenticatorKind {
        AuthenticatorKind::Session
    }

    fn instantiate<'r>(&'r self, request: &'r RequestContext) -> Box<dyn Authenticator + 'r> {
        Box::new(SessionAuthenticator {
            config: self,
            request,
            identifier: String::new(),
        })
    }
}

pub struct SessionAuthenticator<'r> {
    config: &'r SessionAuth,
    request: &'r RequestContext,
    identifier: String,
}

impl Authenticator for SessionAuthenticator<'_> {
    fn name(&self) -> &'static str {
        AuthenticatorKind::Session.as_str()
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn authenticate(&mut self) -> Option<String> {
        let Some(principal) = self.request.session().cloned() else {
            debug!("No session on request");
            return None;
        };

        if !principal.active {
            debug!("Session principal '{}' is inactive", principal.username);
            return None;
        }

        if !self.config.anti_forgery.check(self.request) {
            debug!("Anti-forgery check failed for '{}'", principal.username);
            return None;
        }

        self.identifier.clone_from(&principal.username);
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

#[cfg(test)]
mod tests {
    use hyper::{HeaderMap, Method};

    use super::*;
    use crate::command::server::auth::{MockAntiForgeryValidator, Principal};

    fn session_auth(anti_forgery_result: bool, expected_calls: usize) -> SessionAuth {
        let mut anti_forgery = MockAntiForgeryValidator::new();
        anti_forgery
            .expect_check()
            .times(expected_calls)
            .return_const(anti_forgery_result);

        SessionAuth::new(&Config::default(), Arc::new(anti_forgery)).unwrap()
    }

    fn request(principal: Option<Principal>) -> RequestContext {
        RequestContext::new(Method::POST, HeaderMap::new(), None).with_session(principal)
    }

    #[test]
    fn test_config_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.session_cookie, "sessionid");
        assert_eq!(config.session_ttl, None);
        assert_eq!(config.csrf_cookie, "csrftoken");
        assert_eq!(config.csrf_header, "x-csrftoken");
        assert_eq!(config.csrf_field, "csrfmiddlewaretoken");
        assert!(config.rights.default_allow);
    }

    #[test]
    fn test_authenticates_session_principal() {
        let auth = session_auth(true, 1);
        let request = request(Some(Principal::new("id_1", "alice", true)));

        let mut authenticator = auth.instantiate(&request);
        assert_eq!(authenticator.identifier(), "");
        assert_eq!(authenticator.authenticate(), Some("alice".to_string()));
        assert_eq!(authenticator.identifier(), "alice");
        assert_eq!(authenticator.name(), "session");
        assert_eq!(
            request.principal(),
            Some(Principal::new("id_1", "alice", true))
        );
    }

    #[test]
    fn test_without_principal() {
        let auth = session_auth(true, 0);
        let request = request(None);

        let mut authenticator = auth.instantiate(&request);
        assert_eq!(authenticator.authenticate(), None);
        assert_eq!(authenticator.identifier(), "");
    }

    #[test]
    fn test_inactive_principal() {
        let auth = session_auth(true, 0);
        let request = request(Some(Principal::new("id_1", "alice", false)));

        let mut authenticator = auth.instantiate(&request);
        assert_eq!(authenticator.authenticate(), None);
    }

    #[test]
    fn test_anti_forgery_failure() {
        let auth = session_auth(false, 1);
        let request = request(Some(Principal::new("id_1", "alice", true)));

        let mut authenticator = auth.instantiate(&request);
        assert_eq!(authenticator.authenticate(), None);
        assert_eq!(authenticator.identifier(), "");
        assert_eq!(request.principal(), None);
    }

    #[test]
    fn test_rights_use_session_identifier() {
        let config: Config = toml::from_str(
            r#"
            [rights]
            rules = ["identifier == 'alice' && model == 'invoice'"]
            "#,
        )
        .unwrap();
        let mut anti_forgery = MockAntiForgeryValidator::new();
        anti_forgery.expect_check().return_const(true);
        let auth = SessionAuth::new(&config, Arc::new(anti_forgery)).unwrap();
        let request = request(Some(Principal::new("id_1", "alice", true)));

        let mut authenticator = auth.instantiate(&request);
        authenticator.authenticate();

        assert!(!authenticator.test_rights("invoice", AccessMethod::Read));
        assert!(authenticator.test_rights("customer", AccessMethod::Read));
    }
}
