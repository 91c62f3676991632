//! # ogproxy - social preview rewriting for Myriad game pages
//!
//! ogproxy sits in front of the static Myriad site. Every page passes through
//! a [`PassthroughRewriter`] that swaps the default social preview image (and,
//! depending on the rule set, the `og:url` and `og:image:alt` tags) for ones
//! naming the game in the request URL. Link previews of `/game/<id>` then show
//! that game instead of the generic card.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   GET /game/<id>   ┌──────────────────────────────────┐
//! │  client  │ ─────────────────▶ │           ProxyServer            │
//! └──────────┘                    │  ┌────────────────────────────┐  │
//!       ▲                         │  │    PassthroughRewriter     │  │
//!       │   rewritten page,       │  │  RuleSet + IdentifierSource│  │
//!       │   upstream status and   │  └─────────────┬──────────────┘  │
//!       │   headers               │                │ Next            │
//!       └──────────────────────── │  ┌─────────────▼──────────────┐  │
//!                                 │  │       UpstreamOrigin       │  │
//!                                 │  └─────────────┬──────────────┘  │
//!                                 └────────────────┼─────────────────┘
//!                                                  ▼
//!                                        static site origin
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ogproxy::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = ProxyConfig::new()
//!         .port(8080)
//!         .upstream("http://127.0.0.1:8000")
//!         .rules(RuleSet::game());
//!
//!     ProxyServer::new(config).run().await
//! }
//! ```
//!
//! ## Failure handling
//!
//! Once the upstream page is in hand nothing reaches the client as an error:
//! a body that is not text or is larger than the rewrite limit, a URL without
//! an identifier or an unparsable URL all produce
//! [`RewriteOutcome::Passthrough`] and the page is served as the origin sent
//! it. Bodies over the limit are streamed through instead of buffered. Only a
//! failure of the origin itself is an error; the server answers it with
//! `502 Bad Gateway`.

pub mod error;
pub mod http;
pub mod rewrite;
pub mod runtime;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::error::{ConfigError, RewriteError, RuleError, UpstreamError};
    pub use crate::http::{Body, EdgeRequest, EdgeResponse, Method, StatusCode};
    pub use crate::rewrite::{
        next_fn, IdentifierSource, Next, PassthroughRewriter, RewriteOutcome, RewriteRule, RuleSet,
    };
    pub use crate::runtime::{ProxyConfig, ProxyServer, UpstreamOrigin};
    pub use async_trait::async_trait;
}

// Re-export for convenience
pub use http::{EdgeRequest, EdgeResponse};
pub use rewrite::{PassthroughRewriter, RewriteOutcome, RuleSet};
pub use runtime::{ProxyConfig, ProxyServer};
