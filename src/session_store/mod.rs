use async_trait::async_trait;
use std::any::Any;
use std::fmt::Debug;

mod config;
mod error;
mod memory;
mod redis;

pub use config::Config;
pub use error::Error;

/// Storage for login sessions issued by the application fronted by the gate.
///
/// Each session id maps to the username of the identity that opened it.
#[async_trait]
pub trait SessionStore: Any + Debug + Send + Sync {
    /// Store (or refresh) a session
    ///
    /// # Arguments
    ///
    /// * `session_id` - The opaque session identifier, as carried by the session cookie
    /// * `username` - The username the session belongs to
    /// * `expires_in` - The time in seconds until the session expires
    async fn store_session(
        &self,
        session_id: &str,
        username: &str,
        expires_in: u64,
    ) -> Result<(), Error>;

    /// Look a session up
    ///
    /// # Returns
    ///
    /// * `Ok(Some(String))` with the session's username if the session is live
    /// * `Ok(None)` if the session is unknown or expired
    /// * `Err(Error)` if the backend could not be queried
    async fn lookup_session(&self, session_id: &str) -> Result<Option<String>, Error>;
}

fn session_key(session_id: &str) -> String {
    format!("session:{session_id}")
}
