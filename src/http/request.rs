//! Inbound request descriptor handed to the rewriter.

use bytes::Bytes;
use url::Url;

/// Base used to resolve origin-form request targets such as `/game/chess`.
const LOCAL_BASE: &str = "http://localhost/";

/// HTTP method enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    /// Any extension method, forwarded upstream as-is.
    Other(String),
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
            Method::Delete => write!(f, "DELETE"),
            Method::Patch => write!(f, "PATCH"),
            Method::Head => write!(f, "HEAD"),
            Method::Options => write!(f, "OPTIONS"),
            Method::Other(name) => write!(f, "{}", name),
        }
    }
}

impl From<&hyper::Method> for Method {
    fn from(method: &hyper::Method) -> Self {
        match *method {
            hyper::Method::GET => Method::Get,
            hyper::Method::POST => Method::Post,
            hyper::Method::PUT => Method::Put,
            hyper::Method::DELETE => Method::Delete,
            hyper::Method::PATCH => Method::Patch,
            hyper::Method::HEAD => Method::Head,
            hyper::Method::OPTIONS => Method::Options,
            ref other => Method::Other(other.as_str().to_string()),
        }
    }
}

/// An inbound page request.
///
/// `url` is kept exactly as received, usually in origin form (`/game/chess?x=1`).
/// It is only parsed when the rewriter asks for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRequest {
    /// HTTP method.
    pub method: Method,
    /// Request target as received.
    pub url: String,
    /// HTTP headers, in arrival order, with raw values.
    pub headers: Vec<(String, Bytes)>,
    /// Request body.
    pub body: Option<Bytes>,
}

impl EdgeRequest {
    /// Create a new EdgeRequest.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Shorthand for a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Add a header to the request.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Set the request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Get the first value of a header as text, matching the name case-insensitively.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .and_then(|(_, value)| std::str::from_utf8(value).ok())
    }

    /// Parse the request URL. Relative targets are resolved against a local base.
    pub fn parsed_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(LOCAL_BASE).and_then(|base| base.join(&self.url))
    }
}

impl Default for EdgeRequest {
    fn default() -> Self {
        Self::get("/")
    }
}
