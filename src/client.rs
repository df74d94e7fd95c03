//! Outbound HTTP client for the upstream hop.
//!
//! Either a direct HTTPS-or-HTTP client with standard certificate checks, or
//! a client whose connections are tunnelled (HTTP `CONNECT`) through an
//! intermediary proxy. In the proxied case certificate verification is
//! switched off for the TLS session carried by the tunnel, see
//! [`crate::danger`].

use axum::body::Body;
use http::{HeaderValue, Request, Uri};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{
    connect::{proxy::Tunnel, Connect, HttpConnector},
    Client, ResponseFuture,
};
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::ProxyConfig;
use crate::danger::insecure_tls_config;

type DirectConnector = HttpsConnector<HttpConnector>;
type TunnelConnector = HttpsConnector<Tunnel<HttpConnector>>;

/// A cloneable handle to the upstream client.
///
/// Clones share one connection pool.
#[derive(Clone)]
pub enum UpstreamClient {
    Direct(Client<DirectConnector, Body>),
    Proxied(Client<TunnelConnector, Body>),
}

impl UpstreamClient {
    /// Builds the client for the given proxy configuration.
    pub fn new(proxy: &ProxyConfig) -> Self {
        match proxy.uri() {
            None => {
                info!("Connecting to upstream directly");
                Self::direct()
            }
            Some(uri) => {
                warn!(
                    proxy = %uri,
                    "Routing upstream traffic through intermediary proxy; certificate verification is disabled for this hop"
                );
                Self::through_proxy(uri.clone(), proxy.authorization().cloned())
            }
        }
    }

    /// A direct client that verifies certificates against the webpki roots.
    pub fn direct() -> Self {
        let https = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector());

        Self::Direct(build_client(https))
    }

    fn through_proxy(proxy: Uri, authorization: Option<HeaderValue>) -> Self {
        let mut tunnel = Tunnel::new(proxy, http_connector());
        if let Some(auth) = authorization {
            tunnel = tunnel.with_auth(auth);
        }

        let https = HttpsConnectorBuilder::new()
            .with_tls_config(insecure_tls_config())
            .https_or_http()
            .enable_http1()
            .wrap_connector(tunnel);

        Self::Proxied(build_client(https))
    }

    pub fn is_proxied(&self) -> bool {
        matches!(self, Self::Proxied(_))
    }

    /// Sends the request. The body is streamed, never buffered.
    pub fn request(&self, req: Request<Body>) -> ResponseFuture {
        match self {
            Self::Direct(client) => client.request(req),
            Self::Proxied(client) => client.request(req),
        }
    }
}

fn http_connector() -> HttpConnector {
    let mut connector = HttpConnector::new();
    connector.set_nodelay(true);
    connector.enforce_http(false);
    connector.set_keepalive(Some(Duration::from_secs(60)));
    connector.set_connect_timeout(Some(Duration::from_secs(10)));
    connector.set_reuse_address(true);
    connector
}

fn build_client<C>(connector: C) -> Client<C, Body>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(32)
        .retry_canceled_requests(false)
        .set_host(true)
        .build(connector)
}
