//! Proxy configuration.

use crate::error::ConfigError;
use crate::rewrite::{IdentifierSource, PassthroughRewriter, RuleSet, DEFAULT_MAX_BODY_SIZE};
use serde::{Deserialize, Serialize};

/// Configuration for the proxy server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Origin serving the static site, e.g. `http://127.0.0.1:8000`.
    pub upstream: String,
    /// Rewrite rules, applied in order.
    pub rules: RuleSet,
    /// Where the game identifier comes from.
    pub identifier: IdentifierSource,
    /// Largest body, in bytes, buffered for rewriting or read from a client.
    /// Larger upstream bodies are passed through unmodified.
    pub max_body_size: usize,
    /// Whether to serve `/_health`.
    pub enable_health: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            upstream: "http://127.0.0.1:8000".to_string(),
            rules: RuleSet::game(),
            identifier: IdentifierSource::default(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            enable_health: true,
        }
    }
}

impl ProxyConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the configuration from `OGPROXY_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the configuration through `lookup`, which maps a variable name to its value.
    ///
    /// `OGPROXY_RULES` takes precedence over `OGPROXY_RULESET`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("OGPROXY_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("OGPROXY_PORT") {
            config.port = port.trim().parse().map_err(|e| ConfigError::InvalidValue {
                var: "OGPROXY_PORT",
                reason: format!("{}", e),
            })?;
        }
        if let Some(upstream) = lookup("OGPROXY_UPSTREAM") {
            config.upstream = upstream;
        }
        if let Some(name) = lookup("OGPROXY_RULESET") {
            config.rules = RuleSet::preset(&name)?;
        }
        if let Some(json) = lookup("OGPROXY_RULES") {
            config.rules = RuleSet::from_json(&json)?;
        }
        if let Some(source) = lookup("OGPROXY_ID_SOURCE") {
            config.identifier = source.parse()?;
        }
        if let Some(size) = lookup("OGPROXY_MAX_BODY_SIZE") {
            config.max_body_size = size.trim().parse().map_err(|e| ConfigError::InvalidValue {
                var: "OGPROXY_MAX_BODY_SIZE",
                reason: format!("{}", e),
            })?;
        }
        if let Some(flag) = lookup("OGPROXY_ENABLE_HEALTH") {
            config.enable_health = parse_flag("OGPROXY_ENABLE_HEALTH", &flag)?;
        }

        Ok(config)
    }

    /// Set the host address.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the upstream origin.
    pub fn upstream(mut self, upstream: impl Into<String>) -> Self {
        self.upstream = upstream.into();
        self
    }

    /// Set the rule table.
    pub fn rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Set the identifier source.
    pub fn identifier(mut self, identifier: IdentifierSource) -> Self {
        self.identifier = identifier;
        self
    }

    /// Set the body size limit.
    pub fn max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Build the rewriter described by this configuration.
    pub fn rewriter(&self) -> PassthroughRewriter {
        PassthroughRewriter::new(self.rules.clone(), self.identifier.clone())
            .with_max_body_size(self.max_body_size)
    }
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            var,
            reason: format!("expected a boolean, got '{}'", other),
        }),
    }
}
