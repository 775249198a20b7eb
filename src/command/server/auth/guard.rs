use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::{AccessMethod, Authenticator, AuthenticatorFactory, Error, RequestContext};
use crate::metrics_provider::{AUTH_ATTEMPTS, RIGHTS_CHECKS};

/// Per-request authentication state.
///
/// Holds the authenticator that succeeded for the request, if any. The guard borrows the
/// request and the configured chain; it lives no longer than the request it was built for.
pub struct AuthGuard<'r> {
    request: &'r RequestContext,
    active: Option<Box<dyn Authenticator + 'r>>,
}

impl<'r> AuthGuard<'r> {
    pub fn new(request: &'r RequestContext) -> Self {
        Self {
            request,
            active: None,
        }
    }

    /// Tries each authenticator of `chain` in order, stopping at the first one that
    /// identifies the request.
    #[instrument(skip(self, chain), fields(auth_method = tracing::field::Empty))]
    pub fn authenticate(
        &mut self,
        chain: &'r [Arc<dyn AuthenticatorFactory>],
    ) -> Result<String, Error> {
        for factory in chain {
            let mut authenticator = factory.instantiate(self.request);
            let name = authenticator.name();

            match authenticator.authenticate().filter(|id| !id.is_empty()) {
                Some(identifier) => {
                    debug!("Request authenticated by '{name}' as '{identifier}'");
                    AUTH_ATTEMPTS.with_label_values(&[name, "success"]).inc();
                    tracing::Span::current().record("auth_method", name);

                    self.active = Some(authenticator);
                    return Ok(identifier);
                }
                None => {
                    debug!("Authenticator '{name}' did not identify the request");
                    AUTH_ATTEMPTS.with_label_values(&[name, "failed"]).inc();
                }
            }
        }

        warn!("No authenticator identified the request");
        Err(Error::authentication_required())
    }

    /// The authenticator that succeeded, once `authenticate` returned an identifier
    pub fn active(&self) -> Option<&(dyn Authenticator + 'r)> {
        self.active.as_deref()
    }

    /// Checks `method` on every model of `relevant` that is also `implicated`, in the
    /// order of `relevant`. The first denial ends the check.
    pub fn check_rights(
        &self,
        relevant: &[String],
        implicated: &HashSet<String>,
        method: AccessMethod,
    ) -> Result<(), Error> {
        let Some(authenticator) = self.active() else {
            debug!("Rights check without an authenticated request");
            RIGHTS_CHECKS.with_label_values(&["denied"]).inc();
            return Err(Error::forbidden());
        };

        for model in relevant.iter().filter(|model| implicated.contains(*model)) {
            if !authenticator.test_rights(model, method) {
                debug!(
                    "'{}' may not {method} '{model}' ({})",
                    authenticator.identifier(),
                    authenticator.name()
                );
                RIGHTS_CHECKS.with_label_values(&["denied"]).inc();
                return Err(Error::forbidden());
            }
        }

        RIGHTS_CHECKS.with_label_values(&["allowed"]).inc();
        Ok(())
    }
}
