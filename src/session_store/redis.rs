use crate::session_store::{session_key, Error, SessionStore};
use async_trait::async_trait;
use redis::AsyncCommands;
use serde::Deserialize;
use tracing::info;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BackendConfig {
    pub url: String,
    #[serde(default)]
    pub key_prefix: String,
}

#[derive(Debug)]
pub struct Backend {
    client: redis::Client,
    key_prefix: String,
}

impl Backend {
    pub fn new(config: &BackendConfig) -> Result<Self, Error> {
        info!("Using Redis session store");
        let client = redis::Client::open(config.url.as_str())?;
        Ok(Backend {
            client,
            key_prefix: config.key_prefix.clone(),
        })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, Error> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    fn key(&self, session_id: &str) -> String {
        format!("{}{}", self.key_prefix, session_key(session_id))
    }
}

#[async_trait]
impl SessionStore for Backend {
    async fn store_session(
        &self,
        session_id: &str,
        username: &str,
        expires_in: u64,
    ) -> Result<(), Error> {
        let mut conn = self.get_connection().await?;
        Ok(conn.set_ex(self.key(session_id), username, expires_in).await?)
    }

    async fn lookup_session(&self, session_id: &str) -> Result<Option<String>, Error> {
        let mut conn = self.get_connection().await?;
        let username: Option<String> = conn.get(self.key(session_id)).await?;
        Ok(username)
    }
}
