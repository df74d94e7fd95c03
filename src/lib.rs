//! A streaming HTTP relay for a single upstream API.
//!
//! Every inbound request, whatever its method or path, is forwarded to a
//! fixed upstream base ([`UPSTREAM_BASE`]) with its path, query, headers and
//! body intact. The response comes back the same way: status and headers are
//! copied, and the body is streamed in chunks of at most
//! [`RELAY_CHUNK_SIZE`] bytes, flushed as they arrive, so server-sent events
//! reach the caller without delay.
//!
//! The outbound leg can go through an intermediary HTTP proxy (from the
//! `http_proxy` environment variable). Connections are then tunnelled with
//! `CONNECT`, and certificate verification is disabled for the TLS session
//! inside the tunnel so that TLS-intercepting proxies work.
//!
//! # Example
//!
//! ```rust,no_run
//! use api_relay::{server, Config, ProxyConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::new("0.0.0.0:8080", ProxyConfig::direct());
//!     server::run(config, server::shutdown_signal()).await.unwrap();
//! }
//! ```

mod body;
mod client;
mod config;
mod danger;
mod error;
mod proxy;
mod router;
pub mod server;

pub use body::{RelayBody, RELAY_CHUNK_SIZE};
pub use client::UpstreamClient;
pub use config::{Config, ProxyConfig, DEFAULT_LISTEN_ADDR, LISTEN_ENV, PROXY_ENV, UPSTREAM_BASE};
pub use danger::insecure_tls_config;
pub use error::{describe, ConfigError, ForwardError, ServerError};
pub use proxy::{copy_headers, upstream_target, Forwarder};
