//! The passthrough rewriter and the next-handler capability it wraps.

use crate::error::{RewriteError, UpstreamError};
use crate::http::{Body, Buffered, EdgeRequest, EdgeResponse};
use crate::rewrite::{IdentifierSource, RuleSet};
use async_trait::async_trait;
use std::future::Future;
use tracing::{debug, warn, Level};

/// Largest upstream body buffered for rewriting, unless configured otherwise.
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Produces the upstream response for a request.
///
/// The rewriter calls this exactly once per request and never retries it.
#[async_trait]
pub trait Next: Send + Sync {
    async fn run(&self, request: &EdgeRequest) -> Result<EdgeResponse, UpstreamError>;
}

/// [`Next`] backed by a closure. See [`next_fn`].
pub struct NextFn<F> {
    f: F,
}

/// Wrap a closure returning a future as a [`Next`].
pub fn next_fn<F, Fut>(f: F) -> NextFn<F>
where
    F: Fn(&EdgeRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<EdgeResponse, UpstreamError>> + Send + 'static,
{
    NextFn { f }
}

#[async_trait]
impl<F, Fut> Next for NextFn<F>
where
    F: Fn(&EdgeRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<EdgeResponse, UpstreamError>> + Send + 'static,
{
    async fn run(&self, request: &EdgeRequest) -> Result<EdgeResponse, UpstreamError> {
        (self.f)(request).await
    }
}

/// Result of running the rewriter on one request.
#[derive(Debug, PartialEq)]
pub enum RewriteOutcome {
    /// A new response carrying the rewritten body.
    Rewritten {
        response: EdgeResponse,
        replacements: usize,
    },
    /// The upstream response, untouched.
    Passthrough {
        response: EdgeResponse,
        reason: RewriteError,
    },
}

impl RewriteOutcome {
    /// The response to send.
    pub fn response(&self) -> &EdgeResponse {
        match self {
            RewriteOutcome::Rewritten { response, .. } => response,
            RewriteOutcome::Passthrough { response, .. } => response,
        }
    }

    /// Consume the outcome, keeping the response to send.
    pub fn into_response(self) -> EdgeResponse {
        match self {
            RewriteOutcome::Rewritten { response, .. } => response,
            RewriteOutcome::Passthrough { response, .. } => response,
        }
    }

    /// Whether the upstream response was handed back unchanged.
    pub fn is_passthrough(&self) -> bool {
        matches!(self, RewriteOutcome::Passthrough { .. })
    }

    fn passthrough(response: EdgeResponse, reason: RewriteError) -> Self {
        RewriteOutcome::Passthrough { response, reason }
    }
}

/// Rewrites the default social preview tags of a page into per-game ones.
///
/// Holds only immutable configuration; a single instance is shared by every
/// connection.
#[derive(Debug, Clone)]
pub struct PassthroughRewriter {
    rules: RuleSet,
    identifier: IdentifierSource,
    max_body_size: usize,
}

impl PassthroughRewriter {
    /// Create a rewriter from a rule table and an identifier source.
    pub fn new(rules: RuleSet, identifier: IdentifierSource) -> Self {
        Self {
            rules,
            identifier,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Set the largest body that is buffered for rewriting.
    ///
    /// Larger bodies are passed through as they stream in.
    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// The rule table.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// The identifier source.
    pub fn identifier(&self) -> &IdentifierSource {
        &self.identifier
    }

    /// The largest body that is buffered for rewriting.
    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    /// Fetch the upstream response through `next` and rewrite it.
    ///
    /// Only a failure of `next`, or of the upstream body stream while it is
    /// buffered, is returned as an error. Everything else that goes wrong
    /// yields [`RewriteOutcome::Passthrough`] with the upstream response as it
    /// was received.
    pub async fn handle<N>(
        &self,
        request: &EdgeRequest,
        next: &N,
    ) -> Result<RewriteOutcome, UpstreamError>
    where
        N: Next + ?Sized,
    {
        let url = request.parsed_url();
        let upstream = next.run(request).await?;

        let url = match url {
            Ok(url) => url,
            Err(e) => return Ok(RewriteOutcome::passthrough(upstream, e.into())),
        };
        if let Err(reason) = upstream.ensure_identity_encoding() {
            return Ok(RewriteOutcome::passthrough(upstream, reason));
        }
        let id = match self.identifier.extract(&url) {
            Ok(id) => id,
            Err(reason) => return Ok(RewriteOutcome::passthrough(upstream, reason)),
        };

        let EdgeResponse {
            status,
            headers,
            body,
        } = upstream;
        let buffered = body
            .buffer(self.max_body_size)
            .await
            .map_err(|e| UpstreamError::Body(e.to_string()))?;
        let bytes = match buffered {
            Buffered::Complete(bytes) => bytes,
            Buffered::TooLarge(body) => {
                return Ok(RewriteOutcome::passthrough(
                    EdgeResponse {
                        status,
                        headers,
                        body,
                    },
                    RewriteError::BodyTooLarge {
                        limit: self.max_body_size,
                    },
                ));
            }
        };

        let page = match std::str::from_utf8(&bytes) {
            Ok(page) => page,
            Err(e) => {
                return Ok(RewriteOutcome::passthrough(
                    EdgeResponse {
                        status,
                        headers,
                        body: Body::Full(bytes),
                    },
                    e.into(),
                ));
            }
        };

        let (text, replacements) = self.rules.apply(page, id);
        Ok(RewriteOutcome::Rewritten {
            response: EdgeResponse {
                status,
                headers,
                body: Body::from(text),
            },
            replacements,
        })
    }

    /// Like [`handle`](Self::handle), but logs the outcome and returns the
    /// response to send.
    pub async fn serve<N>(
        &self,
        request: &EdgeRequest,
        next: &N,
    ) -> Result<EdgeResponse, UpstreamError>
    where
        N: Next + ?Sized,
    {
        let outcome = self.handle(request, next).await?;

        match &outcome {
            RewriteOutcome::Rewritten { replacements, .. } => {
                debug!("Rewrote {} ({} replacements)", request.url, replacements);
            }
            RewriteOutcome::Passthrough { reason, .. } => {
                if reason.log_level() == Level::DEBUG {
                    debug!("Passing {} through unmodified: {}", request.url, reason);
                } else {
                    warn!("Passing {} through unmodified: {}", request.url, reason);
                }
            }
        }

        Ok(outcome.into_response())
    }
}

impl Default for PassthroughRewriter {
    fn default() -> Self {
        Self::new(RuleSet::game(), IdentifierSource::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::StatusCode;
    use crate::rewrite::rule::OG_IMAGE;
    use bytes::Bytes;
    use http_body_util::Full;

    fn upstream(page: &str) -> EdgeResponse {
        EdgeResponse::html(page).header("Cache-Control", "max-age=60")
    }

    fn serving(page: String) -> impl Next {
        next_fn(move |_| {
            let page = page.clone();
            async move { Ok(upstream(&page)) }
        })
    }

    #[test]
    fn test_handle_rewrites_page() {
        let rewriter = PassthroughRewriter::default();
        let next = serving(format!(r#"<img src="{}">"#, OG_IMAGE));

        let outcome =
            tokio_test::block_on(rewriter.handle(&EdgeRequest::get("/game/puzzle42"), &next))
                .unwrap();

        match outcome {
            RewriteOutcome::Rewritten {
                response,
                replacements,
            } => {
                assert_eq!(replacements, 1);
                assert_eq!(
                    response.body,
                    r#"<img src="https://myriad-game.com/.netlify/functions/image?game=puzzle42">"#
                );
            }
            other => panic!("expected rewrite, got {:?}", other),
        }
    }

    #[test]
    fn test_handle_empty_identifier_is_rewritten() {
        let rewriter = PassthroughRewriter::default();
        let next = serving(OG_IMAGE.to_string());

        let outcome =
            tokio_test::block_on(rewriter.handle(&EdgeRequest::get("/game/"), &next)).unwrap();

        assert!(!outcome.is_passthrough());
        assert_eq!(
            outcome.response().body,
            "https://myriad-game.com/.netlify/functions/image?game="
        );
    }

    #[test]
    fn test_handle_bad_url_passes_through() {
        let rewriter = PassthroughRewriter::default();
        let next = serving(OG_IMAGE.to_string());

        let outcome =
            tokio_test::block_on(rewriter.handle(&EdgeRequest::get("http://[::1"), &next))
                .unwrap();

        assert!(outcome.is_passthrough());
        assert_eq!(outcome.into_response(), upstream(OG_IMAGE));
    }

    #[tokio::test]
    async fn test_handle_streams_oversized_body_through() {
        let page = format!("{}{}", OG_IMAGE, "x".repeat(64));
        let body = Bytes::from(page.clone());
        let next = next_fn(move |_| {
            let body = body.clone();
            async move {
                Ok(EdgeResponse::ok()
                    .header("Content-Type", "text/html")
                    .body(Body::stream(Full::new(body))))
            }
        });
        let rewriter = PassthroughRewriter::default().with_max_body_size(16);

        let outcome = rewriter
            .handle(&EdgeRequest::get("/game/chess"), &next)
            .await
            .unwrap();

        let response = match outcome {
            RewriteOutcome::Passthrough { response, reason } => {
                assert_eq!(reason, RewriteError::BodyTooLarge { limit: 16 });
                response
            }
            other => panic!("expected passthrough, got {:?}", other),
        };
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.get_header("content-type"), Some("text/html"));
        assert_eq!(response.body.collect().await.unwrap(), page);
    }

    #[tokio::test]
    async fn test_handle_skips_buffering_without_identifier() {
        let next = next_fn(|_| async {
            Ok(EdgeResponse::ok().body(Body::stream(Full::new(Bytes::from_static(b"asset")))))
        });
        let rewriter = PassthroughRewriter::default();

        let outcome = rewriter
            .handle(&EdgeRequest::get("/icon/og_image.png"), &next)
            .await
            .unwrap();

        assert!(outcome.is_passthrough());
        assert!(outcome.response().body.is_stream());
    }

    #[test]
    fn test_handle_propagates_upstream_failure() {
        let rewriter = PassthroughRewriter::default();
        let next = next_fn(|_| async { Err(UpstreamError::Other("origin down".to_string())) });

        let result = tokio_test::block_on(rewriter.handle(&EdgeRequest::get("/game/x"), &next));

        assert!(matches!(result, Err(UpstreamError::Other(_))));
    }

    #[test]
    fn test_serve_returns_response() {
        let rewriter = PassthroughRewriter::default();
        let next = next_fn(|_| async {
            Ok(EdgeResponse::new(StatusCode::NOT_FOUND).body("missing"))
        });

        let response =
            tokio_test::block_on(rewriter.serve(&EdgeRequest::get("/game/x"), &next)).unwrap();

        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body, "missing");
    }
}
