use serde::Serialize;

/// An identity resolved from a credential, a session or an access key.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Principal {
    /// Configuration key of the identity
    pub id: String,
    pub username: String,
    pub active: bool,
}

impl Principal {
    pub fn new(id: impl Into<String>, username: impl Into<String>, active: bool) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            active,
        }
    }
}
