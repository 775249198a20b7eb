use hyper::Method;
use tracing::debug;

use super::session;
use super::{AntiForgeryValidator, RequestContext};
use crate::command::server::request_ext::HeaderExt;

const SAFE_METHODS: [Method; 4] = [Method::GET, Method::HEAD, Method::OPTIONS, Method::TRACE];

/// Double-submit cookie check: state changing requests must echo the token cookie
/// in a header or a form field.
pub struct CsrfValidator {
    cookie: String,
    header: String,
    field: String,
}

impl CsrfValidator {
    pub fn new(config: &session::Config) -> Self {
        Self {
            cookie: config.csrf_cookie.clone(),
            header: config.csrf_header.clone(),
            field: config.csrf_field.clone(),
        }
    }
}

impl AntiForgeryValidator for CsrfValidator {
    fn check(&self, request: &RequestContext) -> bool {
        if SAFE_METHODS.contains(request.method()) {
            return true;
        }

        let Some(expected) = request
            .headers()
            .cookie(&self.cookie)
            .filter(|token| !token.is_empty())
        else {
            debug!("CSRF cookie '{}' not set", self.cookie);
            return false;
        };

        let submitted = request
            .header(self.header.as_str())
            .or_else(|| request.parameter(&self.field).map(ToString::to_string));

        match submitted {
            Some(token) if token == expected => true,
            Some(_) => {
                debug!("CSRF token mismatch");
                false
            }
            None => {
                debug!("CSRF token missing");
                false
            }
        }
    }
}
