use std::sync::Arc;

use hyper::header::AUTHORIZATION;
use serde::Deserialize;
use tracing::debug;

use super::rights::{self, RightsPolicy, RightsRequest};
use super::{
    AccessMethod, Authenticator, AuthenticatorFactory, AuthenticatorKind, RequestContext,
    TokenStore,
};
use crate::command::server::request_ext::HeaderExt;
use crate::configuration::Error as ConfigError;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Request parameter carrying the token when no `Authorization` header is sent
    #[serde(default = "Config::default_parameter")]
    pub parameter: String,
    #[serde(default)]
    pub rights: rights::Config,
}

impl Config {
    fn default_parameter() -> String {
        "key".to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parameter: Config::default_parameter(),
            rights: rights::Config::default(),
        }
    }
}

/// Access keys sent as a bearer token, a bare `Authorization` value or a request parameter.
pub struct TokenAuth {
    parameter: String,
    tokens: Arc<dyn TokenStore>,
    rights: RightsPolicy,
}

impl TokenAuth {
    pub fn new(config: &Config, tokens: Arc<dyn TokenStore>) -> Result<Self, ConfigError> {
        Ok(Self {
            parameter: config.parameter.clone(),
            tokens,
            rights: RightsPolicy::new(&config.rights)?,
        })
    }
}

impl AuthenticatorFactory for TokenAuth {
    fn kind(&self) -> AuthenticatorKind {
        AuthenticatorKind::Token
    }

    fn instantiate<'r>(&'r self, request: &'r RequestContext) -> Box<dyn Authenticator + 'r> {
        Box::new(TokenAuthenticator {
            config: self,
            request,
            identifier: String::new(),
        })
    }
}

pub struct TokenAuthenticator<'r> {
    config: &'r TokenAuth,
    request: &'r RequestContext,
    identifier: String,
}

impl TokenAuthenticator<'_> {
    fn token(&self) -> Option<String> {
        let headers = self.request.headers();
        if let Some(token) = headers.bearer_token() {
            return Some(token);
        }

        let bare = headers
            .get_header(AUTHORIZATION)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty() && !value.contains(char::is_whitespace));
        if bare.is_some() {
            return bare;
        }

        self.request
            .parameter(&self.config.parameter)
            .filter(|token| !token.is_empty())
            .map(ToString::to_string)
    }
}

impl Authenticator for TokenAuthenticator<'_> {
    fn name(&self) -> &'static str {
        AuthenticatorKind::Token.as_str()
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn authenticate(&mut self) -> Option<String> {
        let token = self.token()?;

        let Some(principal) = self.config.tokens.lookup(&token) else {
            debug!("Unknown access token");
            return None;
        };

        if !principal.active {
            debug!("Token owner '{}' is inactive", principal.username);
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
    use hyper::header::HeaderValue;
    use hyper::{HeaderMap, Method};
    use mockall::predicate::eq;

    use super::*;
    use crate::command::server::auth::{MockTokenStore, Principal};

    fn request(authorization: Option<&'static str>, query: Option<&str>) -> RequestContext {
        let mut headers = HeaderMap::new();
        if let Some(authorization) = authorization {
            headers.insert(AUTHORIZATION, HeaderValue::from_static(authorization));
        }
        RequestContext::new(Method::GET, headers, None).with_query(query)
    }

    fn store_expecting(token: &'static str, principal: Option<Principal>) -> MockTokenStore {
        let mut store = MockTokenStore::new();
        store
            .expect_lookup()
            .with(eq(token))
            .times(1)
            .return_const(principal);
        store
    }

    fn token_auth(store: MockTokenStore) -> TokenAuth {
        TokenAuth::new(&Config::default(), Arc::new(store)).unwrap()
    }

    #[test]
    fn test_bearer_token() {
        let auth = token_auth(store_expecting(
            "abc123",
            Some(Principal::new("id_1", "ci", true)),
        ));
        let request = request(Some("Bearer abc123"), None);

        let mut authenticator = auth.instantiate(&request);
        assert_eq!(authenticator.authenticate(), Some("ci".to_string()));
        assert_eq!(authenticator.identifier(), "ci");
        assert_eq!(authenticator.name(), "token");
        assert_eq!(request.principal(), Some(Principal::new("id_1", "ci", true)));
    }

    #[test]
    fn test_bare_authorization_value() {
        let auth = token_auth(store_expecting(
            "abc123",
            Some(Principal::new("id_1", "ci", true)),
        ));
        let request = request(Some("abc123"), None);

        let mut authenticator = auth.instantiate(&request);
        assert_eq!(authenticator.authenticate(), Some("ci".to_string()));
    }

    #[test]
    fn test_parameter_token() {
        let auth = token_auth(store_expecting(
            "abc123",
            Some(Principal::new("id_1", "ci", true)),
        ));
        let request = request(None, Some("key=abc123"));

        let mut authenticator = auth.instantiate(&request);
        assert_eq!(authenticator.authenticate(), Some("ci".to_string()));
    }

    #[test]
    fn test_basic_header_falls_back_to_parameter() {
        let auth = token_auth(store_expecting(
            "abc123",
            Some(Principal::new("id_1", "ci", true)),
        ));
        let request = request(Some("Basic YWxpY2U6c2VjcmV0"), Some("key=abc123"));

        let mut authenticator = auth.instantiate(&request);
        assert_eq!(authenticator.authenticate(), Some("ci".to_string()));
    }

    #[test]
    fn test_unknown_token() {
        let auth = token_auth(store_expecting("nope", None));
        let request = request(Some("Bearer nope"), None);

        let mut authenticator = auth.instantiate(&request);
        assert_eq!(authenticator.authenticate(), None);
        assert_eq!(request.principal(), None);
    }

    #[test]
    fn test_inactive_owner() {
        let auth = token_auth(store_expecting(
            "abc123",
            Some(Principal::new("id_1", "ci", false)),
        ));
        let request = request(Some("Bearer abc123"), None);

        let mut authenticator = auth.instantiate(&request);
        assert_eq!(authenticator.authenticate(), None);
        assert_eq!(authenticator.identifier(), "");
    }

    #[test]
    fn test_no_token() {
        let mut store = MockTokenStore::new();
        store.expect_lookup().times(0);
        let auth = token_auth(store);
        let request = request(None, Some("key="));

        let mut authenticator = auth.instantiate(&request);
        assert_eq!(authenticator.authenticate(), None);
    }
}
