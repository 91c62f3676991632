//! Error types.

use thiserror::Error;
use tracing::Level;

/// Reasons a page could not be rewritten.
///
/// These never reach the end user: the rewriter answers with the upstream
/// response unchanged and reports the reason instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    #[error("request URL could not be parsed: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("response body is not UTF-8 text: {0}")]
    BodyNotText(#[from] std::str::Utf8Error),

    #[error("response body is encoded with '{0}'")]
    EncodedBody(String),

    #[error("response body is still streaming")]
    NotBuffered,

    #[error("response body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("no identifier in request URL (source: {0})")]
    MissingIdentifier(String),
}

impl RewriteError {
    /// Level at which a passthrough for this reason is logged.
    pub fn log_level(&self) -> Level {
        match self {
            RewriteError::MissingIdentifier(_) => Level::DEBUG,
            _ => Level::WARN,
        }
    }
}

/// Failure to obtain the upstream response. Fatal for the request.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("failed to build upstream request: {0}")]
    Request(String),

    #[error("upstream request failed: {0}")]
    Client(#[from] hyper_util::client::legacy::Error),

    #[error("failed to read upstream body: {0}")]
    Body(String),

    #[error("{0}")]
    Other(String),
}

/// Invalid rewrite rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("search literal must not be empty")]
    EmptySearch,

    #[error("replacement contains an unexpanded placeholder '${{{0}}}'")]
    UnexpandedPlaceholder(String),

    #[error("replacement contains an unknown placeholder '{{{0}}}'")]
    UnknownPlaceholder(String),

    #[error("replacement has an unclosed '{{' at byte {0}")]
    Unclosed(usize),
}

/// Invalid proxy configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },

    #[error("unknown rule set '{0}', expected 'game' or 'level'")]
    UnknownRuleSet(String),

    #[error("invalid identifier source '{0}', expected 'path:<prefix>' or 'query:<name>'")]
    InvalidIdentifierSource(String),

    #[error("invalid rule list: {0}")]
    Rules(#[from] serde_json::Error),

    #[error(transparent)]
    Rule(#[from] RuleError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_log_levels() {
        assert_eq!(
            RewriteError::MissingIdentifier("path:/game/".to_string()).log_level(),
            Level::DEBUG
        );
        assert_eq!(
            RewriteError::EncodedBody("gzip".to_string()).log_level(),
            Level::WARN
        );
        assert_eq!(
            RewriteError::BodyTooLarge { limit: 1024 }.log_level(),
            Level::WARN
        );
    }
}
