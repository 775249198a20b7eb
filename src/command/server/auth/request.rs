use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};

use hyper::header::AsHeaderName;
use hyper::{HeaderMap, Method};
use tracing::debug;

use crate::command::server::auth::Principal;
use crate::command::server::request_ext::HeaderExt;

/// What authenticators can see of the request being processed.
///
/// Parameters merge the query string and a form-encoded body, body values taking
/// precedence. A session principal resolved before the gate runs is kept apart from the
/// principal slot: only an authenticator that accepted the request attaches a principal.
#[derive(Debug)]
pub struct RequestContext {
    method: Method,
    headers: HeaderMap,
    remote_address: Option<IpAddr>,
    query: HashMap<String, String>,
    form: HashMap<String, String>,
    session: Option<Principal>,
    principal: Mutex<Option<Principal>>,
}

fn parse_parameters(source: &str, input: &str) -> HashMap<String, String> {
    match serde_urlencoded::from_str::<Vec<(String, String)>>(input) {
        Ok(pairs) => pairs.into_iter().collect(),
        Err(error) => {
            debug!("Ignoring malformed {source} parameters: {error}");
            HashMap::new()
        }
    }
}

impl RequestContext {
    pub fn new(method: Method, headers: HeaderMap, remote_address: Option<IpAddr>) -> Self {
        Self {
            method,
            headers,
            remote_address,
            query: HashMap::new(),
            form: HashMap::new(),
            session: None,
            principal: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_query(mut self, query: Option<&str>) -> Self {
        if let Some(query) = query {
            self.query = parse_parameters("query", query);
        }
        self
    }

    #[must_use]
    pub fn with_form(mut self, body: &[u8]) -> Self {
        match std::str::from_utf8(body) {
            Ok(body) => self.form = parse_parameters("form", body),
            Err(error) => debug!("Ignoring non UTF-8 form body: {error}"),
        }
        self
    }

    #[must_use]
    pub fn with_session(mut self, session: Option<Principal>) -> Self {
        self.session = session;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn remote_address(&self) -> Option<IpAddr> {
        self.remote_address
    }

    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<String> {
        self.headers.get_header(name)
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.form
            .get(name)
            .or_else(|| self.query.get(name))
            .map(String::as_str)
    }

    /// Principal of the session cookie, not yet accepted by any authenticator
    pub fn session(&self) -> Option<&Principal> {
        self.session.as_ref()
    }

    pub fn principal(&self) -> Option<Principal> {
        self.principal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn attach_principal(&self, principal: Principal) {
        debug!("Attaching principal '{}' to request", principal.username);
        *self
            .principal
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(principal);
    }
}
