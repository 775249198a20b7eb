
use std::collections::HashMap;

use argon2::password_hash::PasswordHashString;
use argon2::{Argon2, PasswordVerifier};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{CredentialValidator, Principal};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub username: String,
    pub password: String,
    #[serde(default = "Config::default_active")]
    pub active: bool,
}

impl Config {
    fn default_active() -> bool {
        true
    }
}

struct StoredIdentity {
    id: String,
    password_hash: PasswordHashString,
    active: bool,
}

/// Identities declared in configuration, keyed by username, with argon2 password hashes.
pub struct CredentialStore {
    users: HashMap<String, StoredIdentity>,
}

fn build_users(identities: &HashMap<String, Config>) -> HashMap<String, StoredIdentity> {
    let mut users = HashMap::new();
    for (id, config) in identities {
        let password_hash = match PasswordHashString::new(&config.password) {
            Ok(hash) => hash,
            Err(err) => {
                warn!("Invalid password hash for user {}: {err}", config.username);
                continue;
            }
        };

        users.insert(
            config.username.clone(),
            StoredIdentity {
                id: id.clone(),
                password_hash,
                active: config.active,
            },
        );
    }

    users
}

impl CredentialStore {
    pub fn new(identities: &HashMap<String, Config>) -> Self {
        Self {
            users: build_users(identities),
        }
    }

    /// Principal for a username, without checking any password
    pub fn principal(&self, username: &str) -> Option<Principal> {
        self.users
            .get(username)
            .map(|identity| Principal::new(&identity.id, username, identity.active))
    }
}

impl CredentialValidator for CredentialStore {
    #[instrument(skip(self, password))]
    fn validate(&self, username: &str, password: &str) -> Option<Principal> {
        let Some(identity) = self.users.get(username) else {
            debug!("Username not found in credentials");
            return None;
        };

        let password_hash = identity.password_hash.password_hash();

        match Argon2::default().verify_password(password.as_bytes(), &password_hash) {
            Ok(()) => Some(Principal::new(&identity.id, username, identity.active)),
            Err(error) => {
                debug!("Password verification failed: {error}");
                None
            }
        }
    }
}
