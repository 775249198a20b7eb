use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{info, instrument};

use super::access_keys::AccessKeyStore;
use super::anonymous::AnonymousAuth;
use super::anti_forgery::CsrfValidator;
use super::basic::BasicAuth;
use super::credentials::CredentialStore;
use super::parameter::ParameterAuth;
use super::resource::{self, Resource, ResourceConfig};
use super::session::SessionAuth;
use super::token::TokenAuth;
use super::{
    AccessMethod, AuthConfig, AuthGuard, AuthenticatorFactory, AuthenticatorKind, Error,
    RequestContext,
};
use crate::configuration::Error as ConfigError;

/// Configured resources and the authenticators their chains are built from.
pub struct AuthGate {
    credentials: Arc<CredentialStore>,
    resources: Vec<Resource>,
}

type Factories = HashMap<AuthenticatorKind, Arc<dyn AuthenticatorFactory>>;

impl AuthGate {
    pub fn new(
        auth: &AuthConfig,
        resources: &HashMap<String, ResourceConfig>,
    ) -> Result<Self, ConfigError> {
        let credentials = Arc::new(CredentialStore::new(&auth.identity));
        let factories = Self::build_factories(auth, &credentials)?;

        let mut names: Vec<&String> = resources.keys().collect();
        names.sort();

        let mut built = Vec::with_capacity(names.len());
        for name in names {
            let config = &resources[name];
            let chain = Self::build_chain(name, &config.authenticators, &factories)?;
            let resource = Resource::new(name.as_str(), &config.path, chain, config.models.clone());
            info!(
                "Resource '{name}' on '{}' uses [{}]",
                resource.prefix(),
                resource
                    .chain
                    .iter()
                    .map(|factory| factory.kind().as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            built.push(resource);
        }

        Ok(Self {
            credentials,
            resources: built,
        })
    }

    fn build_factories(
        auth: &AuthConfig,
        credentials: &Arc<CredentialStore>,
    ) -> Result<Factories, ConfigError> {
        let mut factories: Factories = HashMap::new();

        factories.insert(
            AuthenticatorKind::Anonymous,
            Arc::new(AnonymousAuth::new(&auth.anonymous)?),
        );
        factories.insert(
            AuthenticatorKind::Basic,
            Arc::new(BasicAuth::new(&auth.basic, credentials.clone())?),
        );
        factories.insert(
            AuthenticatorKind::Parameter,
            Arc::new(ParameterAuth::new(&auth.parameter, credentials.clone())?),
        );
        factories.insert(
            AuthenticatorKind::Session,
            Arc::new(SessionAuth::new(
                &auth.session,
                Arc::new(CsrfValidator::new(&auth.session)),
            )?),
        );

        let access_keys = AccessKeyStore::new(&auth.access_key, credentials.clone());
        if access_keys.is_empty() {
            info!("No access keys configured, token authentication unavailable");
        } else {
            factories.insert(
                AuthenticatorKind::Token,
                Arc::new(TokenAuth::new(&auth.token, Arc::new(access_keys))?),
            );
        }

        Ok(factories)
    }

    fn build_chain(
        name: &str,
        kinds: &[AuthenticatorKind],
        factories: &Factories,
    ) -> Result<Vec<Arc<dyn AuthenticatorFactory>>, ConfigError> {
        let default_kinds = ResourceConfig::default_authenticators();
        let kinds = if kinds.is_empty() {
            default_kinds.as_slice()
        } else {
            kinds
        };

        let mut seen = HashSet::new();
        let mut chain = Vec::with_capacity(kinds.len());

        for kind in kinds {
            if !seen.insert(*kind) {
                return Err(ConfigError::InvalidAuthenticator(format!(
                    "resource '{name}' lists authenticator '{kind}' more than once"
                )));
            }

            let Some(factory) = factories.get(kind) else {
                return Err(ConfigError::InvalidAuthenticator(format!(
                    "resource '{name}' uses authenticator '{kind}' which is not available"
                )));
            };

            chain.push(factory.clone());
        }

        Ok(chain)
    }

    pub fn resolve(&self, path: &str) -> Option<&Resource> {
        resource::resolve(&self.resources, path)
    }

    pub fn credentials(&self) -> Arc<CredentialStore> {
        self.credentials.clone()
    }

    /// Authenticates `request` against the chain of `resource` and checks `method` on the
    /// implicated models the resource owns.
    #[instrument(skip(self, resource, request, implicated), fields(resource = %resource.name))]
    pub fn authorize(
        &self,
        resource: &Resource,
        request: &RequestContext,
        implicated: &HashSet<String>,
        method: AccessMethod,
    ) -> Result<String, Error> {
        let mut guard = AuthGuard::new(request);
        let identifier = guard.authenticate(&resource.chain)?;
        guard.check_rights(&resource.models, implicated, method)?;
        Ok(identifier)
    }
}
