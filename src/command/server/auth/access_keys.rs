use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::credentials::CredentialStore;
use super::{Principal, TokenStore};

const SHA256_HEX_LENGTH: usize = 64;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Username of the identity the key acts as
    pub username: String,
    /// Hex encoded SHA-256 digest of the key
    pub key_sha256: String,
}

/// Access keys declared in configuration. Only key digests are kept.
pub struct AccessKeyStore {
    keys: HashMap<String, String>,
    credentials: Arc<CredentialStore>,
}

pub fn key_digest(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

impl AccessKeyStore {
    pub fn new(access_keys: &HashMap<String, Config>, credentials: Arc<CredentialStore>) -> Self {
        let mut keys = HashMap::new();

        for (name, config) in access_keys {
            let digest = config.key_sha256.to_ascii_lowercase();
            if digest.len() != SHA256_HEX_LENGTH || hex::decode(&digest).is_err() {
                warn!("Invalid SHA-256 digest for access key '{name}', ignoring it");
                continue;
            }

            if credentials.principal(&config.username).is_none() {
                warn!(
                    "Access key '{name}' refers to unknown user '{}', ignoring it",
                    config.username
                );
                continue;
            }

            keys.insert(digest, config.username.clone());
        }

        Self { keys, credentials }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl TokenStore for AccessKeyStore {
    fn lookup(&self, token: &str) -> Option<Principal> {
        let Some(username) = self.keys.get(&key_digest(token)) else {
            debug!("Access key not found");
            return None;
        };

        self.credentials.principal(username)
    }
}
