use std::sync::Arc;

use argh::FromArgs;
use tracing::warn;

use super::listeners::insecure::InsecureListener;
use super::ServerContext;
use crate::command::server::error::Error;
use crate::command::server::auth::AuthenticatorKind;
use crate::configuration::Configuration;
use crate::session_store::{self, SessionStore};

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "serve",
    description = "Run the authentication gate"
)]
pub struct Options {}

pub struct Command {
    listener: InsecureListener,
    session_store: Arc<dyn SessionStore>,
}

fn build_session_store(config: &Configuration) -> Result<Arc<dyn SessionStore>, Error> {
    match config.session_store.to_backend() {
        Ok(store) => Ok(store),
        Err(err) => {
            let msg = format!("Failed to initialize session store: {err}");
            Err(Error::Initialization(msg))
        }
    }
}

/// Resources whose session variant can never succeed: the in-memory store is private to
/// this process, so no application can register sessions in it.
fn unreachable_session_resources(config: &Configuration) -> Vec<&str> {
    if config.session_store != session_store::Config::Memory {
        return Vec::new();
    }

    let mut names: Vec<&str> = config
        .resource
        .iter()
        .filter(|(_, resource)| resource.authenticators.contains(&AuthenticatorKind::Session))
        .map(|(name, _)| name.as_str())
        .collect();
    names.sort_unstable();
    names
}

fn build_context(
    config: &Configuration,
    session_store: &Arc<dyn SessionStore>,
) -> Result<ServerContext, Error> {
    let unreachable = unreachable_session_resources(config);
    if !unreachable.is_empty() {
        warn!(
            "Resources [{}] use session authentication with the in-memory session store, \
             which is meant for development and tests only: configure session_store.redis",
            unreachable.join(", ")
        );
    }

    match ServerContext::new(config, Arc::clone(session_store)) {
        Ok(context) => Ok(context),
        Err(err) => {
            let msg = format!("Failed to initialize authentication gate: {err}");
            Err(Error::Initialization(msg))
        }
    }
}

impl Command {
    pub fn new(config: &Configuration) -> Result<Command, Error> {
        let session_store = build_session_store(config)?;
        let context = build_context(config, &session_store)?;
        let listener = InsecureListener::new(&config.server, context);

        Ok(Command {
            listener,
            session_store,
        })
    }

    /// Rebuild the gate from a reloaded configuration. The session store is kept.
    pub fn notify_config_change(&self, config: &Configuration) -> Result<(), Error> {
        let context = build_context(config, &self.session_store)?;
        self.listener.notify_config_change(&config.server, context);

        Ok(())
    }

    pub async fn run(&self) -> Result<(), Error> {
        self.listener.serve().await
    }
}
