use std::net::IpAddr;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use hyper::header::{AsHeaderName, AUTHORIZATION, CONTENT_TYPE, COOKIE};
use hyper::HeaderMap;

static BASIC_SCHEME: &str = "basic";
static BEARER_SCHEME: &str = "bearer";
static FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub static X_FORWARDED_FOR: &str = "x-forwarded-for";

pub trait HeaderExt {
    fn get_header<K: AsHeaderName>(&self, header: K) -> Option<String>;
    fn bearer_token(&self) -> Option<String>;
    fn basic_auth(&self) -> Option<(String, String)>;
    fn cookie(&self, name: &str) -> Option<String>;
    fn forwarded_for(&self) -> Option<IpAddr>;
    fn is_form_encoded(&self) -> bool;
}

impl HeaderExt for HeaderMap {
    fn get_header<K>(&self, header: K) -> Option<String>
    where
        K: AsHeaderName,
    {
        self.get(header)
            .and_then(|header| header.to_str().ok())
            .map(ToString::to_string)
    }

    fn bearer_token(&self) -> Option<String> {
        let authorization = self.get_header(AUTHORIZATION)?;
        let (scheme, token) = authorization.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
            return None;
        }

        let token = token.trim();
        (!token.is_empty()).then(|| token.to_string())
    }

    fn basic_auth(&self) -> Option<(String, String)> {
        let authorization = self.get_header(AUTHORIZATION)?;

        let mut tokens = authorization.split_whitespace();
        let (Some(scheme), Some(value), None) = (tokens.next(), tokens.next(), tokens.next())
        else {
            return None;
        };

        if !scheme.eq_ignore_ascii_case(BASIC_SCHEME) {
            return None;
        }

        let value = BASE64_STANDARD.decode(value).ok()?;
        let value = String::from_utf8(value).ok()?;

        let (username, password) = value.split_once(':')?;
        Some((username.to_string(), password.to_string()))
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.get_all(COOKIE)
            .iter()
            .filter_map(|header| header.to_str().ok())
            .flat_map(|header| header.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.trim_matches('"').to_string())
    }

    fn forwarded_for(&self) -> Option<IpAddr> {
        let forwarded = self.get_header(X_FORWARDED_FOR)?;
        forwarded.split(',').next()?.trim().parse().ok()
    }

    fn is_form_encoded(&self) -> bool {
        self.get_header(CONTENT_TYPE).is_some_and(|content_type| {
            content_type
                .split(';')
                .next()
                .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
        })
    }
}
