use std::sync::Arc;

use hyper::HeaderMap;
use tracing::{debug, instrument, warn};

use crate::command::server::auth::credentials::CredentialStore;
use crate::command::server::auth::{session, Principal};
use crate::command::server::request_ext::HeaderExt;
use crate::session_store::SessionStore;

/// Resolves the session cookie of a request to a principal before the gate runs.
///
/// Store failures and unknown sessions are logged and treated as "no session".
pub struct SessionResolver {
    store: Arc<dyn SessionStore>,
    credentials: Arc<CredentialStore>,
    cookie: String,
    ttl: Option<u64>,
}

impl SessionResolver {
    pub fn new(
        config: &session::Config,
        store: Arc<dyn SessionStore>,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        Self {
            store,
            credentials,
            cookie: config.session_cookie.clone(),
            ttl: config.session_ttl,
        }
    }

    #[instrument(skip(self, headers))]
    pub async fn resolve(&self, headers: &HeaderMap) -> Option<Principal> {
        let session_id = headers
            .cookie(&self.cookie)
            .filter(|session_id| !session_id.is_empty())?;

        let username = match self.store.lookup_session(&session_id).await {
            Ok(Some(username)) => username,
            Ok(None) => {
                debug!("Unknown or expired session");
                return None;
            }
            Err(error) => {
                warn!("Session lookup failed: {error}");
                return None;
            }
        };

        let Some(principal) = self.credentials.principal(&username) else {
            debug!("Session refers to unknown user '{username}'");
            return None;
        };

        if let Some(ttl) = self.ttl {
            if let Err(error) = self.store.store_session(&session_id, &username, ttl).await {
                warn!("Failed to refresh session: {error}");
            }
        }

        Some(principal)
    }
}
