//! Where a deployment finds the game identifier in the request URL.

use crate::error::{ConfigError, RewriteError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Identifier extraction strategy. A deployment uses exactly one.
///
/// The value is returned as it appears in the URL, percent-encoding included,
/// so it can be dropped into an outgoing URL unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdentifierSource {
    /// Everything in the path after a fixed prefix, e.g. `/game/`.
    PathPrefix { prefix: String },
    /// The value of a named query parameter, e.g. `?id=`.
    QueryParam { name: String },
}

impl IdentifierSource {
    /// Strip `prefix` from the path.
    pub fn path_prefix(prefix: impl Into<String>) -> Self {
        IdentifierSource::PathPrefix {
            prefix: prefix.into(),
        }
    }

    /// Read the query parameter `name`.
    pub fn query_param(name: impl Into<String>) -> Self {
        IdentifierSource::QueryParam { name: name.into() }
    }

    /// Extract the identifier from `url`.
    ///
    /// Only a missing prefix or a missing parameter is a failure; an empty
    /// value is returned as the empty string.
    ///
    /// Query values are taken raw. The query string is split on `&` and `=`
    /// by hand instead of through `Url::query_pairs`, which would decode
    /// `%xx` and `+`: the identifier must stay in its URL form, the same as
    /// a path segment.
    pub fn extract<'a>(&self, url: &'a Url) -> Result<&'a str, RewriteError> {
        let found = match self {
            IdentifierSource::PathPrefix { prefix } => url.path().strip_prefix(prefix.as_str()),
            IdentifierSource::QueryParam { name } => url.query().and_then(|query| {
                query
                    .split('&')
                    .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
                    .find(|(key, _)| *key == name.as_str())
                    .map(|(_, value)| value)
            }),
        };

        found.ok_or_else(|| RewriteError::MissingIdentifier(self.to_string()))
    }
}

impl Default for IdentifierSource {
    fn default() -> Self {
        IdentifierSource::path_prefix("/game/")
    }
}

impl fmt::Display for IdentifierSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierSource::PathPrefix { prefix } => write!(f, "path:{}", prefix),
            IdentifierSource::QueryParam { name } => write!(f, "query:{}", name),
        }
    }
}

impl FromStr for IdentifierSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once(':') {
            Some(("path", prefix)) if prefix.starts_with('/') => Ok(Self::path_prefix(prefix)),
            Some(("query", name)) if !name.is_empty() => Ok(Self::query_param(name)),
            _ => Err(ConfigError::InvalidIdentifierSource(s.to_string())),
        }
    }
}
