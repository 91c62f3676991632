//! Upstream origin client: the next handler used by the proxy server.

use crate::error::UpstreamError;
use crate::http::{Body, EdgeRequest, EdgeResponse, StatusCode};
use crate::rewrite::Next;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

/// Headers that are not copied onto the upstream request.
fn should_forward_header(name: &str) -> bool {
    !matches!(
        name.to_ascii_lowercase().as_str(),
        "host" | "connection" | "keep-alive" | "transfer-encoding" | "upgrade" | "accept-encoding"
    )
}

/// Forwards requests to a plain-HTTP origin.
///
/// The response body is handed on unread. The origin is asked for an
/// uncompressed body so the page can be rewritten.
pub struct UpstreamOrigin {
    base: String,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl UpstreamOrigin {
    /// Create a client for `base`, e.g. `http://127.0.0.1:8000`.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    /// The origin base URL.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Resolve the request target against the origin.
    pub fn target_uri(&self, request: &EdgeRequest) -> Result<Uri, UpstreamError> {
        let path = match request.url.find("://") {
            // Absolute-form target: keep only path and query.
            Some(scheme_end) => {
                let after_authority = &request.url[scheme_end + 3..];
                after_authority
                    .find('/')
                    .map(|slash| &after_authority[slash..])
                    .unwrap_or("/")
            }
            None => request.url.as_str(),
        };

        let target = format!("{}{}", self.base, path);
        target.parse::<Uri>().map_err(|e| UpstreamError::InvalidUri {
            uri: target.clone(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Next for UpstreamOrigin {
    async fn run(&self, request: &EdgeRequest) -> Result<EdgeResponse, UpstreamError> {
        let uri = self.target_uri(request)?;
        debug!("Forwarding {} {} to {}", request.method, request.url, uri);

        let mut builder = Request::builder()
            .method(request.method.to_string().as_str())
            .uri(uri);
        for (name, value) in &request.headers {
            if should_forward_header(name) {
                builder = builder.header(name.as_str(), value.as_ref());
            }
        }
        let outgoing = builder
            .header("accept-encoding", "identity")
            .body(Full::new(request.body.clone().unwrap_or_default()))
            .map_err(|e| UpstreamError::Request(e.to_string()))?;

        let response = self.client.request(outgoing).await?;
        let (parts, body) = response.into_parts();

        let headers = parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    Bytes::copy_from_slice(value.as_bytes()),
                )
            })
            .collect();

        Ok(EdgeResponse {
            status: StatusCode(parts.status.as_u16()),
            headers,
            body: Body::stream(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarded_headers() {
        assert!(should_forward_header("Cookie"));
        assert!(should_forward_header("user-agent"));
        assert!(!should_forward_header("Host"));
        assert!(!should_forward_header("Accept-Encoding"));
    }

    #[tokio::test]
    async fn test_target_uri_origin_form() {
        let origin = UpstreamOrigin::new("http://127.0.0.1:8000/");
        let uri = origin.target_uri(&EdgeRequest::get("/game/chess?x=1")).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:8000/game/chess?x=1");
    }

    #[tokio::test]
    async fn test_target_uri_absolute_form() {
        let origin = UpstreamOrigin::new("http://127.0.0.1:8000");
        let uri = origin
            .target_uri(&EdgeRequest::get("http://myriad-game.com/game/chess"))
            .unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:8000/game/chess");
    }

    #[tokio::test]
    async fn test_target_uri_invalid() {
        let origin = UpstreamOrigin::new("http://127.0.0.1:8000");
        let result = origin.target_uri(&EdgeRequest::get("/game/a b"));
        assert!(matches!(result, Err(UpstreamError::InvalidUri { .. })));
    }
}
