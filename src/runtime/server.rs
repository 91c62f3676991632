//! Proxy HTTP server implementation.

use crate::http::{Body, EdgeRequest, EdgeResponse, Method, StatusCode, StreamBody};
use crate::rewrite::{Next, PassthroughRewriter};
use crate::runtime::{ProxyConfig, UpstreamOrigin};
use bytes::Bytes;
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Headers recomputed by hyper when the response is written.
const RECOMPUTED_HEADERS: [&str; 2] = ["content-length", "transfer-encoding"];

/// Proxy server.
///
/// Accepts page requests, fetches each page from the upstream origin and
/// answers with the rewritten page.
pub struct ProxyServer {
    /// Server configuration.
    config: ProxyConfig,
    /// Shared rewriter.
    rewriter: Arc<PassthroughRewriter>,
    /// Next handler producing upstream responses.
    upstream: Arc<dyn Next>,
}

impl ProxyServer {
    /// Create a server forwarding to the configured upstream origin.
    pub fn new(config: ProxyConfig) -> Self {
        let upstream = UpstreamOrigin::new(config.upstream.clone());
        Self::with_upstream(config, Arc::new(upstream))
    }

    /// Create a server with a custom next handler.
    pub fn with_upstream(config: ProxyConfig, upstream: Arc<dyn Next>) -> Self {
        let rewriter = Arc::new(config.rewriter());
        Self {
            config,
            rewriter,
            upstream,
        }
    }

    /// Get the rewriter.
    pub fn rewriter(&self) -> Arc<PassthroughRewriter> {
        self.rewriter.clone()
    }

    /// Bind the configured address and serve forever.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr: SocketAddr = self.config.bind_addr().parse()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve connections accepted on `listener`.
    pub async fn serve(
        self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(
            "Proxy listening on {}, upstream {}",
            listener.local_addr()?,
            self.config.upstream
        );

        let config = Arc::new(self.config);

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);

            let rewriter = self.rewriter.clone();
            let upstream = self.upstream.clone();
            let config = config.clone();

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let rewriter = rewriter.clone();
                    let upstream = upstream.clone();
                    let config = config.clone();
                    async move {
                        handle_request(req, rewriter, upstream, config, remote_addr).await
                    }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection: {:?}", err);
                }
            });
        }
    }
}

/// Handle an incoming HTTP request.
async fn handle_request(
    req: Request<Incoming>,
    rewriter: Arc<PassthroughRewriter>,
    upstream: Arc<dyn Next>,
    config: Arc<ProxyConfig>,
    remote_addr: SocketAddr,
) -> Result<Response<StreamBody>, hyper::Error> {
    let request_id = generate_request_id();

    debug!(
        "Handling request: {} {} from {} [{}]",
        req.method(),
        req.uri(),
        remote_addr,
        request_id
    );

    if config.enable_health && req.uri().path() == "/_health" {
        return Ok(build_response(
            EdgeResponse::ok()
                .header("Content-Type", "text/plain")
                .body("OK"),
        ));
    }

    let request = match convert_request(req, &config).await {
        Ok(request) => request,
        Err(e) => {
            warn!("Failed to read request: {} [{}]", e, request_id);
            return Ok(build_response(EdgeResponse::error(
                StatusCode(400),
                "Bad Request",
            )));
        }
    };

    match rewriter.serve(&request, upstream.as_ref()).await {
        Ok(response) => Ok(build_response(response)),
        Err(e) => {
            error!(
                "Upstream failure for {}: {} [{}]",
                request.url, e, request_id
            );
            Ok(build_response(EdgeResponse::error(
                StatusCode::BAD_GATEWAY,
                "Bad Gateway",
            )))
        }
    }
}

/// Convert a hyper Request to an EdgeRequest.
async fn convert_request(
    req: Request<Incoming>,
    config: &ProxyConfig,
) -> Result<EdgeRequest, Box<dyn std::error::Error + Send + Sync>> {
    let method = Method::from(req.method());
    let url = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let headers = req
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                Bytes::copy_from_slice(value.as_bytes()),
            )
        })
        .collect();

    let body_bytes = Limited::new(req.into_body(), config.max_body_size)
        .collect()
        .await?
        .to_bytes();
    let body = if body_bytes.is_empty() {
        None
    } else {
        Some(body_bytes)
    };

    Ok(EdgeRequest {
        method,
        url,
        headers,
        body,
    })
}

/// Build a hyper Response from an EdgeResponse.
///
/// Length framing headers are dropped; hyper derives them from the body.
/// Header values are written back byte for byte.
fn build_response(edge_response: EdgeResponse) -> Response<StreamBody> {
    let status = hyper::StatusCode::from_u16(edge_response.status.0).unwrap_or_else(|_| {
        warn!(
            "Invalid status code {}, falling back to 500 Internal Server Error",
            edge_response.status.0
        );
        hyper::StatusCode::INTERNAL_SERVER_ERROR
    });

    let mut builder = Response::builder().status(status);

    for (name, value) in &edge_response.headers {
        if RECOMPUTED_HEADERS
            .iter()
            .any(|h| name.eq_ignore_ascii_case(h))
        {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_ref());
    }

    builder
        .body(edge_response.body.into_stream())
        .unwrap_or_else(|e| {
            error!("Failed to build response: {}", e);
            let mut response = Response::new(Body::from("Bad Gateway").into_stream());
            *response.status_mut() = hyper::StatusCode::BAD_GATEWAY;
            response
        })
}

/// Generate a request ID for log correlation.
fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("{:x}", timestamp)
}
