pub mod access_keys;
pub mod anonymous;
pub mod anti_forgery;
pub mod basic;
pub mod credentials;
mod error;
pub mod gate;
pub mod guard;
pub mod parameter;
mod principal;
pub mod request;
pub mod resource;
pub mod rights;
pub mod session;
pub mod token;

use std::collections::HashMap;
use std::fmt;

use hyper::Method;
use serde::{Deserialize, Serialize};

pub use error::Error;
pub use gate::AuthGate;
pub use guard::AuthGuard;
pub use principal::Principal;
pub use request::RequestContext;
pub use resource::{canonical_path, Resource, ResourceConfig};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub identity: HashMap<String, credentials::Config>,
    #[serde(default)]
    pub access_key: HashMap<String, access_keys::Config>,
    #[serde(default)]
    pub anonymous: anonymous::Config,
    #[serde(default)]
    pub basic: basic::Config,
    #[serde(default)]
    pub parameter: parameter::Config,
    #[serde(default)]
    pub session: session::Config,
    #[serde(default)]
    pub token: token::Config,
}

/// The authentication methods a resource can list in its chain.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticatorKind {
    Anonymous,
    Basic,
    Parameter,
    Session,
    Token,
}

impl AuthenticatorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthenticatorKind::Anonymous => "anonymous",
            AuthenticatorKind::Basic => "basic",
            AuthenticatorKind::Parameter => "parameter",
            AuthenticatorKind::Session => "session",
            AuthenticatorKind::Token => "token",
        }
    }
}

impl fmt::Display for AuthenticatorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operation verbs rights are evaluated against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMethod {
    Read,
    Create,
    Update,
    Delete,
}

impl AccessMethod {
    pub fn from_http(method: &Method) -> Option<Self> {
        match *method {
            Method::GET | Method::HEAD | Method::OPTIONS => Some(AccessMethod::Read),
            Method::POST => Some(AccessMethod::Create),
            Method::PUT | Method::PATCH => Some(AccessMethod::Update),
            Method::DELETE => Some(AccessMethod::Delete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccessMethod::Read => "read",
            AccessMethod::Create => "create",
            AccessMethod::Update => "update",
            AccessMethod::Delete => "delete",
        }
    }
}

impl fmt::Display for AccessMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single authentication attempt, bound to one request.
///
/// Instances are created fresh for every request by an [`AuthenticatorFactory`] and are
/// never reused. An empty identifier means the method did not authenticate the request.
pub trait Authenticator {
    /// Name of the authentication method, used in logs and rights rules
    fn name(&self) -> &'static str;

    /// The identifier established so far, empty until authentication succeeds
    fn identifier(&self) -> &str;

    /// Attempt to authenticate the bound request
    ///
    /// Returns the identifier on success, `None` otherwise. Failures of any kind are
    /// reported the same way.
    fn authenticate(&mut self) -> Option<String> {
        let identifier = self.identifier();
        (!identifier.is_empty()).then(|| identifier.to_string())
    }

    /// Whether the authenticated principal may perform `method` on `model`
    fn test_rights(&self, _model: &str, _method: AccessMethod) -> bool {
        true
    }
}

/// A configured authentication method, able to produce per-request authenticators.
pub trait AuthenticatorFactory: Send + Sync {
    fn kind(&self) -> AuthenticatorKind;

    fn instantiate<'r>(&'r self, request: &'r RequestContext) -> Box<dyn Authenticator + 'r>;
}

/// Checks a username and password pair.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialValidator: Send + Sync {
    fn validate(&self, username: &str, password: &str) -> Option<Principal>;
}

/// Checks the anti-forgery token of a request carrying a session.
#[cfg_attr(test, mockall::automock)]
pub trait AntiForgeryValidator: Send + Sync {
    fn check(&self, request: &RequestContext) -> bool;
}

/// Resolves access tokens to the principal they were issued for.
#[cfg_attr(test, mockall::automock)]
pub trait TokenStore: Send + Sync {
    fn lookup(&self, token: &str) -> Option<Principal>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Preset(&'static str);

    impl Authenticator for Preset {
        fn name(&self) -> &'static str {
            "preset"
        }

        fn identifier(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn test_default_authenticate_returns_identifier() {
        let mut authenticator = Preset("alice");
        assert_eq!(authenticator.authenticate(), Some("alice".to_string()));
    }

    #[test]
    fn test_default_authenticate_empty_identifier_fails() {
        let mut authenticator = Preset("");
        assert_eq!(authenticator.authenticate(), None);
    }

    #[test]
    fn test_default_rights_permit_everything() {
        let authenticator = Preset("alice");
        assert!(authenticator.test_rights("invoice", AccessMethod::Delete));
        assert!(authenticator.test_rights("customer", AccessMethod::Read));
    }

    #[test]
    fn test_access_method_from_http() {
        assert_eq!(AccessMethod::from_http(&Method::GET), Some(AccessMethod::Read));
        assert_eq!(AccessMethod::from_http(&Method::HEAD), Some(AccessMethod::Read));
        assert_eq!(
            AccessMethod::from_http(&Method::OPTIONS),
            Some(AccessMethod::Read)
        );
        assert_eq!(
            AccessMethod::from_http(&Method::POST),
            Some(AccessMethod::Create)
        );
        assert_eq!(
            AccessMethod::from_http(&Method::PUT),
            Some(AccessMethod::Update)
        );
        assert_eq!(
            AccessMethod::from_http(&Method::PATCH),
            Some(AccessMethod::Update)
        );
        assert_eq!(
            AccessMethod::from_http(&Method::DELETE),
            Some(AccessMethod::Delete)
        );
        assert_eq!(AccessMethod::from_http(&Method::TRACE), None);
        assert_eq!(AccessMethod::from_http(&Method::CONNECT), None);
    }

    #[test]
    fn test_authenticator_kind_deserialize() {
        #[derive(Deserialize)]
        struct Chain {
            authenticators: Vec<AuthenticatorKind>,
        }

        let chain: Chain = toml::from_str(
            r#"authenticators = ["session", "basic", "parameter", "token", "anonymous"]"#,
        )
        .unwrap();

        assert_eq!(
            chain.authenticators,
            vec![
                AuthenticatorKind::Session,
                AuthenticatorKind::Basic,
                AuthenticatorKind::Parameter,
                AuthenticatorKind::Token,
                AuthenticatorKind::Anonymous,
            ]
        );
    }

    #[test]
    fn test_authenticator_kind_rejects_unknown() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Chain {
            authenticators: Vec<AuthenticatorKind>,
        }

        let result: Result<Chain, _> = toml::from_str(r#"authenticators = ["kerberos"]"#);
        assert!(result.is_err());
    }
}
