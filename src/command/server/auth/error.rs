use std::fmt;

pub const AUTHENTICATION_REQUIRED: &str = "Authorization required.";
pub const FORBIDDEN: &str = "You cannot do it.";

/// Terminal outcomes of the gate.
#[derive(Debug, PartialEq)]
pub enum Error {
    /// No configured authenticator identified the request
    AuthenticationRequired(String),
    /// The request was authenticated but a rights check denied it
    Forbidden(String),
}

impl Error {
    pub fn authentication_required() -> Self {
        Error::AuthenticationRequired(AUTHENTICATION_REQUIRED.to_string())
    }

    pub fn forbidden() -> Self {
        Error::Forbidden(FORBIDDEN.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::AuthenticationRequired(msg) => write!(f, "Authentication required: {msg}"),
            Error::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::authentication_required().to_string(),
            "Authentication required: Authorization required."
        );
        assert_eq!(Error::forbidden().to_string(), "Forbidden: You cannot do it.");
    }
}
