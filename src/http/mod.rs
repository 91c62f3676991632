//! Request and response types shared by the rewriter and the host runtime.

mod body;
mod request;
mod response;

pub use body::{Body, BoxError, Buffered, StreamBody};
pub use request::{EdgeRequest, Method};
pub use response::{EdgeResponse, StatusCode};
