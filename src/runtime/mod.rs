//! Host runtime: configuration, upstream client and the HTTP server.

mod config;
mod server;
mod upstream;

pub use config::ProxyConfig;
pub use server::ProxyServer;
pub use upstream::UpstreamOrigin;
