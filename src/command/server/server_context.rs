use std::sync::Arc;

use crate::command::server::auth::AuthGate;
use crate::command::server::session::SessionResolver;
use crate::configuration::{self, Configuration};
use crate::session_store::SessionStore;

pub struct ServerContext {
    pub gate: AuthGate,
    pub sessions: SessionResolver,
    pub forwarded_headers: bool,
    pub max_body_size: usize,
}

impl ServerContext {
    pub fn new(
        config: &Configuration,
        session_store: Arc<dyn SessionStore>,
    ) -> Result<Self, configuration::Error> {
        let gate = AuthGate::new(&config.auth, &config.resource)?;
        let sessions =
            SessionResolver::new(&config.auth.session, session_store, gate.credentials());

        Ok(Self {
            gate,
            sessions,
            forwarded_headers: config.server.forwarded_headers,
            max_body_size: config.server.max_body_size,
        })
    }
}
