use opentelemetry_otlp::ExporterBuildError;
use opentelemetry_sdk::trace::TraceError;
use std::{fmt, io};
use tracing::debug;

use crate::session_store;

#[derive(Debug)]
pub enum Error {
    SessionStore(session_store::Error),
    Io(io::Error),
    ConfigurationFileFormat(String),
    PolicyCompilation(String),
    InvalidAuthenticator(String),
    TracingInit(TraceError),
    ExporterInit(ExporterBuildError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::SessionStore(err) => write!(f, "Session store error: {err}"),
            Error::Io(err) => write!(f, "IO error: {err}"),
            Error::ConfigurationFileFormat(error) => {
                write!(f, "Configuration file format error: ")?;
                write!(f, "{error}")
            }
            Error::PolicyCompilation(msg) => {
                write!(f, "Policy compilation error: {msg}")
            }
            Error::InvalidAuthenticator(msg) => {
                write!(f, "Invalid authenticator configuration: {msg}")
            }
            Error::TracingInit(error) => {
                write!(f, "Tracing initialization error: {error}")
            }
            Error::ExporterInit(error) => {
                write!(f, "Exporter initialization error: {error}")
            }
        }
    }
}

impl From<session_store::Error> for Error {
    fn from(error: session_store::Error) -> Self {
        debug!("Session store error: {error}");
        Error::SessionStore(error)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        debug!("TOML error: {error}");
        Error::ConfigurationFileFormat(error.to_string())
    }
}

impl From<TraceError> for Error {
    fn from(error: TraceError) -> Self {
        Error::TracingInit(error)
    }
}

impl From<ExporterBuildError> for Error {
    fn from(error: ExporterBuildError) -> Self {
        Error::ExporterInit(error)
    }
}
