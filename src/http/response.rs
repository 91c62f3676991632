//! Page response passed through the rewriter.

use crate::error::RewriteError;
use crate::http::Body;
use bytes::Bytes;

/// HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);
    pub const BAD_GATEWAY: StatusCode = StatusCode(502);

    /// Check if the status code indicates success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }

    /// Check if the status code indicates a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.0)
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::OK
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode(code)
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> Self {
        code.0
    }
}

/// An HTTP response as seen by the rewriter.
///
/// Headers are an ordered list of raw values so repeated headers
/// (`set-cookie`, `vary`) and values with non-ASCII bytes survive a pass
/// through the rewriter unchanged.
#[derive(Debug, PartialEq)]
pub struct EdgeResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// HTTP headers, in upstream order.
    pub headers: Vec<(String, Bytes)>,
    /// Response body.
    pub body: Body,
}

impl EdgeResponse {
    /// Create a new EdgeResponse with the given status code and an empty body.
    pub fn new(status: impl Into<StatusCode>) -> Self {
        Self {
            status: status.into(),
            headers: Vec::new(),
            body: Body::empty(),
        }
    }

    /// Create an OK response.
    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// Create an HTML response.
    pub fn html(content: impl Into<String>) -> Self {
        let content: String = content.into();
        Self::ok()
            .header("Content-Type", "text/html; charset=utf-8")
            .body(content)
    }

    /// Create an error response.
    pub fn error(status: impl Into<StatusCode>, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::new(status)
            .header("Content-Type", "text/plain")
            .body(message)
    }

    /// Add a header to the response.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Set the response body.
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Get the first raw value of a header, matching the name case-insensitively.
    pub fn get_header_bytes(&self, key: &str) -> Option<&Bytes> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value)
    }

    /// Get the first value of a header as text. `None` if absent or not UTF-8.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.get_header_bytes(key)
            .and_then(|value| std::str::from_utf8(value).ok())
    }

    /// Fail unless the body is sent without a content coding.
    pub fn ensure_identity_encoding(&self) -> Result<(), RewriteError> {
        if let Some(encoding) = self.get_header_bytes("content-encoding") {
            let encoding = String::from_utf8_lossy(encoding);
            if !encoding.trim().eq_ignore_ascii_case("identity") {
                return Err(RewriteError::EncodedBody(encoding.into_owned()));
            }
        }
        Ok(())
    }

    /// Read the body as text.
    ///
    /// Fails when the body is compressed, still streaming or not valid UTF-8.
    pub fn text_body(&self) -> Result<&str, RewriteError> {
        self.ensure_identity_encoding()?;
        let bytes = self.body.as_bytes().ok_or(RewriteError::NotBuffered)?;
        Ok(std::str::from_utf8(bytes)?)
    }
}

impl Default for EdgeResponse {
    fn default() -> Self {
        Self::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_body_utf8() {
        let response = EdgeResponse::html("<p>Myriad</p>");
        assert_eq!(response.text_body().unwrap(), "<p>Myriad</p>");
    }

    #[test]
    fn test_text_body_invalid_utf8() {
        let response = EdgeResponse::ok().body(vec![0x3c, 0xff, 0xfe]);
        assert!(matches!(
            response.text_body(),
            Err(RewriteError::BodyNotText(_))
        ));
    }

    #[test]
    fn test_text_body_compressed() {
        let response = EdgeResponse::html("x").header("Content-Encoding", "gzip");
        assert_eq!(
            response.text_body(),
            Err(RewriteError::EncodedBody("gzip".to_string()))
        );
    }

    #[test]
    fn test_text_body_identity_encoding() {
        let response = EdgeResponse::html("x").header("Content-Encoding", "identity");
        assert_eq!(response.text_body().unwrap(), "x");
    }

    #[test]
    fn test_text_body_streaming() {
        let response = EdgeResponse::ok().body(Body::stream(http_body_util::Full::new(
            Bytes::from_static(b"<p>later</p>"),
        )));
        assert_eq!(response.text_body(), Err(RewriteError::NotBuffered));
    }

    #[test]
    fn test_header_values_kept_as_bytes() {
        let filename = Bytes::from_static(b"inline; filename=\"caf\xe9.html\"");
        let response = EdgeResponse::ok()
            .header("Content-Disposition", filename.clone())
            .header("Set-Cookie", "a=1")
            .header("Set-Cookie", "b=2");

        assert_eq!(response.get_header_bytes("content-disposition"), Some(&filename));
        assert_eq!(response.get_header("content-disposition"), None);
        assert_eq!(response.get_header("set-cookie"), Some("a=1"));
        assert_eq!(response.headers.len(), 3);
    }

    #[test]
    fn test_status_code_helpers() {
        assert!(StatusCode::OK.is_success());
        assert!(!StatusCode::NOT_FOUND.is_success());
        assert!(StatusCode::BAD_GATEWAY.is_server_error());
        assert_eq!(u16::from(StatusCode::BAD_GATEWAY), 502);
    }
}
