use std::{fmt, io};

use argon2::password_hash;

#[derive(Debug, PartialEq)]
pub enum Error {
    Input(String),
    Hashing(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Input(err) => write!(f, "Invalid password input: {err}"),
            Error::Hashing(err) => write!(f, "Password hashing failed: {err}"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Input(err.to_string())
    }
}

impl From<password_hash::Error> for Error {
    fn from(err: password_hash::Error) -> Self {
        Error::Hashing(err.to_string())
    }
}
