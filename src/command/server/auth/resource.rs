use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;

use super::{AuthenticatorFactory, AuthenticatorKind};

#[derive(Clone, Debug, Deserialize)]
pub struct ResourceConfig {
    /// Path prefix served by the resource
    pub path: String,
    /// Authentication chain, tried in order
    #[serde(default = "ResourceConfig::default_authenticators")]
    pub authenticators: Vec<AuthenticatorKind>,
    /// Models the resource owns, checked in this order
    #[serde(default)]
    pub models: Vec<String>,
}

impl ResourceConfig {
    pub fn default_authenticators() -> Vec<AuthenticatorKind> {
        vec![AuthenticatorKind::Anonymous]
    }
}

pub struct Resource {
    pub name: String,
    prefix: String,
    pub chain: Vec<Arc<dyn AuthenticatorFactory>>,
    pub models: Vec<String>,
}

fn normalize_prefix(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

impl Resource {
    pub fn new(
        name: impl Into<String>,
        path: &str,
        chain: Vec<Arc<dyn AuthenticatorFactory>>,
        models: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            prefix: normalize_prefix(path),
            chain,
            models,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Remainder of `path` below the prefix, or `None` if the resource does not serve it.
    /// Prefixes only match on segment boundaries.
    fn strip<'p>(&self, path: &'p str) -> Option<&'p str> {
        if self.prefix == "/" {
            return path.strip_prefix('/');
        }

        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() {
            Some(rest)
        } else {
            rest.strip_prefix('/')
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        self.strip(path).is_some()
    }

    /// Models named by a path of alternating `model/id` segments below the prefix.
    /// Segments keep their position, so an empty id does not shift the next model into
    /// the id slot.
    pub fn implicated_models(&self, path: &str) -> HashSet<String> {
        let Some(rest) = self.strip(path) else {
            return HashSet::new();
        };

        rest.split('/')
            .step_by(2)
            .filter(|segment| !segment.is_empty())
            .map(ToString::to_string)
            .collect()
    }
}

fn decode_segment(segment: &str) -> Option<String> {
    let bytes = segment.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'%' {
            let mut byte = [0u8];
            hex::decode_to_slice(bytes.get(index + 1..index + 3)?, &mut byte).ok()?;
            decoded.push(byte[0]);
            index += 3;
        } else {
            decoded.push(bytes[index]);
            index += 1;
        }
    }

    let decoded = String::from_utf8(decoded).ok()?;
    // an encoded separator would change how the path splits into segments
    (!decoded.contains('/')).then_some(decoded)
}

/// Percent-decodes each segment of `path` and resolves `.` and `..` segments, so that
/// resource matching and model extraction see the path the upstream will serve.
///
/// Returns `None` for paths that cannot be read unambiguously: a malformed escape, an
/// encoded `/`, invalid UTF-8, an empty segment before the last one, or a `..` climbing
/// above the root.
pub fn canonical_path(path: &str) -> Option<String> {
    let rest = path.strip_prefix('/')?;
    let raw: Vec<&str> = rest.split('/').collect();
    let mut segments: Vec<String> = Vec::with_capacity(raw.len());

    for (position, raw_segment) in raw.iter().enumerate() {
        if raw_segment.is_empty() && position + 1 < raw.len() {
            return None;
        }

        let segment = decode_segment(raw_segment)?;
        match segment.as_str() {
            "." => {}
            ".." => {
                segments.pop()?;
            }
            _ => segments.push(segment),
        }
    }

    Some(format!("/{}", segments.join("/")))
}

/// Picks the resource with the longest prefix serving `path`.
pub fn resolve<'a>(resources: &'a [Resource], path: &str) -> Option<&'a Resource> {
    resources
        .iter()
        .filter(|resource| resource.matches(path))
        .max_by_key(|resource| resource.prefix.len())
}
