//! Response bodies: fully buffered bytes, or an upstream stream not read yet.

use bytes::{Bytes, BytesMut};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Error type carried by streaming bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Type-erased streaming body, as handed to hyper.
pub type StreamBody = UnsyncBoxBody<Bytes, BoxError>;

/// A response body.
///
/// The next handler may hand over an unread stream; the rewriter buffers it
/// only when the page is a candidate for rewriting.
pub enum Body {
    /// Bytes held in memory.
    Full(Bytes),
    /// A stream that has not been read.
    Stream(StreamBody),
}

/// Result of [`Body::buffer`].
#[derive(Debug)]
pub enum Buffered {
    /// The whole body, within the limit.
    Complete(Bytes),
    /// The body did not fit. Carries the body reassembled from the bytes
    /// already read and the unread rest of the stream.
    TooLarge(Body),
}

impl Body {
    /// An empty body.
    pub fn empty() -> Self {
        Body::Full(Bytes::new())
    }

    /// Wrap any hyper body as an unread stream.
    pub fn stream<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Body::Stream(body.map_err(|e| -> BoxError { e.into() }).boxed_unsync())
    }

    /// The bytes, if the body is buffered.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Body::Full(bytes) => Some(bytes),
            Body::Stream(_) => None,
        }
    }

    /// Whether the body is an unread stream.
    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_))
    }

    /// Read the whole body into memory, up to `limit` bytes.
    ///
    /// Nothing is lost when the limit is hit: [`Buffered::TooLarge`] gives the
    /// body back with the same bytes in the same order. Only a transport error
    /// of the stream itself is returned as `Err`.
    pub async fn buffer(self, limit: usize) -> Result<Buffered, BoxError> {
        let mut stream = match self {
            Body::Full(bytes) if bytes.len() <= limit => return Ok(Buffered::Complete(bytes)),
            Body::Full(bytes) => return Ok(Buffered::TooLarge(Body::Full(bytes))),
            Body::Stream(stream) => stream,
        };

        let mut read = BytesMut::new();
        while let Some(frame) = stream.frame().await {
            let Ok(data) = frame?.into_data() else {
                // trailers
                continue;
            };
            read.extend_from_slice(&data);
            if read.len() > limit {
                let rest = Prefixed {
                    prefix: Some(read.freeze()),
                    rest: stream,
                };
                return Ok(Buffered::TooLarge(Body::Stream(rest.boxed_unsync())));
            }
        }

        Ok(Buffered::Complete(read.freeze()))
    }

    /// Convert into the body type written by the server.
    pub fn into_stream(self) -> StreamBody {
        match self {
            Body::Full(bytes) => Full::new(bytes)
                .map_err(|never: Infallible| -> BoxError { match never {} })
                .boxed_unsync(),
            Body::Stream(stream) => stream,
        }
    }

    /// Read the whole body without a limit.
    pub async fn collect(self) -> Result<Bytes, BoxError> {
        match self {
            Body::Full(bytes) => Ok(bytes),
            Body::Stream(stream) => Ok(stream.collect().await?.to_bytes()),
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Full(bytes) => f.debug_tuple("Full").field(bytes).finish(),
            Body::Stream(stream) => f
                .debug_struct("Stream")
                .field("size_hint", &stream.size_hint())
                .finish(),
        }
    }
}

/// Buffered bodies compare by content. A stream is never equal to anything,
/// since comparing would mean reading it.
impl PartialEq for Body {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Body::Full(a), Body::Full(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq<&str> for Body {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes()
            .map_or(false, |bytes| bytes.as_ref() == other.as_bytes())
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Full(bytes)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Full(Bytes::from(text))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Body::Full(Bytes::from_static(text.as_bytes()))
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Full(Bytes::from(bytes))
    }
}

/// Bytes already read from a stream, followed by the rest of the stream.
struct Prefixed {
    prefix: Option<Bytes>,
    rest: StreamBody,
}

impl HttpBody for Prefixed {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        if let Some(prefix) = self.prefix.take() {
            return Poll::Ready(Some(Ok(Frame::data(prefix))));
        }
        Pin::new(&mut self.rest).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.prefix.is_none() && self.rest.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        let prefix = self.prefix.as_ref().map_or(0, |p| p.len() as u64);
        let rest = self.rest.size_hint();
        let mut hint = SizeHint::new();
        hint.set_lower(rest.lower() + prefix);
        if let Some(upper) = rest.upper() {
            hint.set_upper(upper + prefix);
        }
        hint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Body that yields one data frame per chunk, ready on every poll.
    struct Chunks(std::vec::IntoIter<&'static str>);

    impl HttpBody for Chunks {
        type Data = Bytes;
        type Error = Infallible;

        fn poll_frame(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
            Poll::Ready(
                self.0
                    .next()
                    .map(|chunk| Ok(Frame::data(Bytes::from_static(chunk.as_bytes())))),
            )
        }
    }

    fn chunked(chunks: &[&'static str]) -> Body {
        Body::stream(Chunks(chunks.to_vec().into_iter()))
    }

    #[tokio::test]
    async fn test_buffer_within_limit() {
        let body = chunked(&["<p>", "Myriad", "</p>"]);
        match body.buffer(64).await.unwrap() {
            Buffered::Complete(bytes) => assert_eq!(bytes, "<p>Myriad</p>"),
            other => panic!("expected complete body, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_buffer_over_limit_keeps_every_byte() {
        let body = chunked(&["0123", "4567", "89"]);
        let rest = match body.buffer(5).await.unwrap() {
            Buffered::TooLarge(rest) => rest,
            other => panic!("expected oversized body, got {:?}", other),
        };

        assert!(rest.is_stream());
        assert_eq!(rest.collect().await.unwrap(), "0123456789");
    }

    #[tokio::test]
    async fn test_buffer_full_body_over_limit() {
        let body = Body::from("0123456789");
        match body.buffer(4).await.unwrap() {
            Buffered::TooLarge(rest) => assert_eq!(rest, "0123456789"),
            other => panic!("expected oversized body, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_limit_is_inclusive() {
        let body = chunked(&["0123", "4"]);
        assert!(matches!(
            body.buffer(5).await.unwrap(),
            Buffered::Complete(_)
        ));
    }

    #[test]
    fn test_prefixed_size_hint() {
        let rest = Prefixed {
            prefix: Some(Bytes::from_static(b"abc")),
            rest: Body::from("defg").into_stream(),
        };
        assert_eq!(rest.size_hint().exact(), Some(7));
    }

    #[test]
    fn test_stream_never_equal() {
        assert_ne!(chunked(&["a"]), chunked(&["a"]));
        assert_eq!(Body::from("a"), Body::from("a"));
    }
}
