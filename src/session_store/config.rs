use std::sync::Arc;

use serde::Deserialize;

use crate::session_store;
use crate::session_store::{Error, SessionStore};

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub enum Config {
    /// Process-local store. Nothing outside the gate can register sessions in it, so it
    /// only serves development and tests.
    #[default]
    #[serde(rename = "memory")]
    Memory,
    #[serde(rename = "redis")]
    Redis(session_store::redis::BackendConfig),
}

impl Config {
    pub fn to_backend(&self) -> Result<Arc<dyn SessionStore>, Error> {
        match self {
            Config::Redis(config) => Ok(Arc::new(session_store::redis::Backend::new(config)?)),
            Config::Memory => Ok(Arc::new(session_store::memory::Backend::new())),
        }
    }
}
