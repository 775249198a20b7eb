use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::rights::{self, RightsPolicy, RightsRequest};
use super::{
    AccessMethod, Authenticator, AuthenticatorFactory, AuthenticatorKind, CredentialValidator,
    RequestContext,
};
use crate::configuration::Error as ConfigError;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_username_field")]
    pub username_field: String,
    #[serde(default = "Config::default_password_field")]
    pub password_field: String,
    #[serde(default)]
    pub rights: rights::Config,
}

impl Config {
    fn default_username_field() -> String {
        "username".to_string()
    }

    fn default_password_field() -> String {
        "password".to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username_field: Config::default_username_field(),
            password_field: Config::default_password_field(),
            rights: rights::Config::default(),
        }
    }
}

/// Credentials passed as request parameters, in the query string or a form body.
pub struct ParameterAuth {
    username_field: String,
    password_field: String,
    credentials: Arc<dyn CredentialValidator>,
    rights: RightsPolicy,
}

impl ParameterAuth {
    pub fn new(
        config: &Config,
        credentials: Arc<dyn CredentialValidator>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            username_field: config.username_field.clone(),
            password_field: config.password_field.clone(),
            credentials,
            rights: RightsPolicy::new(&config.rights)?,
        })
    }
}

impl AuthenticatorFactory for ParameterAuth {
    fn kind(&self) -> AuthenticatorKind {
        AuthenticatorKind::Parameter
    }

    fn instantiate<'r>(&'r self, request: &'r RequestContext) -> Box<dyn Authenticator + 'r> {
        Box::new(ParameterAuthenticator {
            config: self,
            request,
            identifier: String::new(),
        })
    }
}

pub struct ParameterAuthenticator<'r> {
    config: &'r ParameterAuth,
    request: &'r RequestContext,
    identifier: String,
}

impl Authenticator for ParameterAuthenticator<'_> {
    fn name(&self) -> &'static str {
        AuthenticatorKind::Parameter.as_str()
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn authenticate(&mut self) -> Option<String> {
        let username = self.request.parameter(&self.config.username_field)?;
        let password = self.request.parameter(&self.config.password_field)?;

        let Some(principal) = self.config.credentials.validate(username, password) else {
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

#[cfg(test)]
mod tests {
    use hyper::{HeaderMap, Method};
    use mockall::predicate::eq;

    use super::*;
    use crate::command::server::auth::{MockCredentialValidator, Principal};

    fn request(query: Option<&str>, form: &[u8]) -> RequestContext {
        RequestContext::new(Method::POST, HeaderMap::new(), None)
            .with_query(query)
            .with_form(form)
    }

    fn validator_returning(principal: Option<Principal>) -> MockCredentialValidator {
        let mut validator = MockCredentialValidator::new();
        validator
            .expect_validate()
            .with(eq("alice"), eq("secret"))
            .times(1)
            .return_const(principal);
        validator
    }

    #[test]
    fn test_query_credentials() {
        let validator = validator_returning(Some(Principal::new("id_1", "alice", true)));
        let auth = ParameterAuth::new(&Config::default(), Arc::new(validator)).unwrap();
        let request = request(Some("username=alice&password=secret"), b"");

        let mut authenticator = auth.instantiate(&request);
        assert_eq!(authenticator.authenticate(), Some("alice".to_string()));
        assert_eq!(authenticator.identifier(), "alice");
        assert_eq!(authenticator.name(), "parameter");
        assert!(request.principal().is_some());
    }

    #[test]
    fn test_form_credentials_take_precedence() {
        let validator = validator_returning(Some(Principal::new("id_1", "alice", true)));
        let auth = ParameterAuth::new(&Config::default(), Arc::new(validator)).unwrap();
        let request = request(
            Some("username=mallory&password=guess"),
            b"username=alice&password=secret",
        );

        let mut authenticator = auth.instantiate(&request);
        assert_eq!(authenticator.authenticate(), Some("alice".to_string()));
    }

    #[test]
    fn test_custom_field_names() {
        let config: Config = toml::from_str(
            r#"
            username_field = "login"
            password_field = "pass"
            "#,
        )
        .unwrap();
        let validator = validator_returning(Some(Principal::new("id_1", "alice", true)));
        let auth = ParameterAuth::new(&config, Arc::new(validator)).unwrap();
        let request = request(Some("login=alice&pass=secret"), b"");

        let mut authenticator = auth.instantiate(&request);
        assert_eq!(authenticator.authenticate(), Some("alice".to_string()));
    }

    #[test]
    fn test_missing_parameters() {
        let mut validator = MockCredentialValidator::new();
        validator.expect_validate().times(0);
        let auth = ParameterAuth::new(&Config::default(), Arc::new(validator)).unwrap();

        for query in [None, Some("username=alice"), Some("password=secret")] {
            let request = request(query, b"");
            let mut authenticator = auth.instantiate(&request);
            assert_eq!(authenticator.authenticate(), None);
        }
    }

    #[test]
    fn test_invalid_credentials() {
        let validator = validator_returning(None);
        let auth = ParameterAuth::new(&Config::default(), Arc::new(validator)).unwrap();
        let request = request(Some("username=alice&password=secret"), b"");

        let mut authenticator = auth.instantiate(&request);
        assert_eq!(authenticator.authenticate(), None);
        assert_eq!(request.principal(), None);
    }

    #[test]
    fn test_inactive_user() {
        let validator = validator_returning(Some(Principal::new("id_1", "alice", false)));
        let auth = ParameterAuth::new(&Config::default(), Arc::new(validator)).unwrap();
        let request = request(Some("username=alice&password=secret"), b"");

        let mut authenticator = auth.instantiate(&request);
        assert_eq!(authenticator.authenticate(), None);
        assert_eq!(authenticator.identifier(), "");
    }
}
