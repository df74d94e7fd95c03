use axum::{body::Body, response::IntoResponse};
use http::{header::HOST, HeaderMap, Request, Response, Uri};
use std::{
    convert::Infallible,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tower::Service;
use tracing::{error, trace};
use url::Url;

use crate::body::RelayBody;
use crate::client::UpstreamClient;
use crate::config::{Config, ProxyConfig};
use crate::error::{ConfigError, ForwardError};

/// Forwards every inbound request to one fixed upstream.
///
/// The inbound path and query are appended to the upstream base, headers are
/// copied in both directions, and the response body is streamed back in
/// bounded chunks. Nothing is retried and nothing is buffered whole.
#[derive(Clone)]
pub struct Forwarder {
    upstream: String,
    base: Url,
    client: UpstreamClient,
}

impl Forwarder {
    /// Creates a forwarder for `upstream` (e.g. `"https://api.openai.com"`),
    /// building the outbound client from `proxy`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use api_relay::{Forwarder, ProxyConfig};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let forwarder = Forwarder::new("https://api.openai.com", &ProxyConfig::direct()).unwrap();
    /// assert_eq!(forwarder.upstream(), "https://api.openai.com");
    /// # }
    /// ```
    pub fn new<S>(upstream: S, proxy: &ProxyConfig) -> Result<Self, ConfigError>
    where
        S: Into<String>,
    {
        Self::new_with_client(upstream, UpstreamClient::new(proxy))
    }

    /// Creates a forwarder with a pre-built client.
    pub fn new_with_client<S>(upstream: S, client: UpstreamClient) -> Result<Self, ConfigError>
    where
        S: Into<String>,
    {
        let upstream = upstream.into();
        let base = Url::parse(&upstream).map_err(|source| ConfigError::InvalidUpstream {
            value: upstream.clone(),
            source,
        })?;

        Ok(Self {
            upstream,
            base,
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new(config.upstream.as_str(), &config.proxy)
    }

    /// The upstream base requests are forwarded to.
    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    pub fn client(&self) -> &UpstreamClient {
        &self.client
    }

    /// Handles one exchange. Failures become `500` responses.
    pub async fn proxy_request(&self, req: Request<Body>) -> Result<Response<Body>, Infallible> {
        match self.forward(req).await {
            Ok(response) => Ok(response),
            Err(err) => {
                error!("Proxy error: {}", err);
                Ok(err.into_response())
            }
        }
    }

    /// Forwards one request and returns the streaming response.
    pub async fn forward(&self, req: Request<Body>) -> Result<Response<Body>, ForwardError> {
        trace!("Proxying request method={} uri={}", req.method(), req.uri());

        self.validate_target(req.uri())?;
        let target = upstream_target(&self.upstream, req.uri());
        let (parts, body) = req.into_parts();

        let mut outbound = Request::builder()
            .method(parts.method)
            .uri(target)
            .body(body)?;
        copy_headers(&parts.headers, outbound.headers_mut());
        outbound.headers_mut().remove(HOST);

        trace!(
            "Forwarding request method={} uri={} headers={:?}",
            outbound.method(),
            outbound.uri(),
            outbound.headers()
        );

        let upstream = self
            .client
            .request(outbound)
            .await
            .map_err(ForwardError::Upstream)?;

        trace!(
            "Received response status={} headers={:?}",
            upstream.status(),
            upstream.headers()
        );

        let (upstream_parts, upstream_body) = upstream.into_parts();
        let mut response = Response::new(Body::new(RelayBody::new(upstream_body)));
        copy_headers(&upstream_parts.headers, response.headers_mut());
        *response.status_mut() = upstream_parts.status;
        Ok(response)
    }

    /// Checks that the inbound target is a well-formed URL.
    ///
    /// Absolute-form targets are parsed as they are; origin-form targets are
    /// parsed as they would appear on the upstream.
    fn validate_target(&self, uri: &Uri) -> Result<(), ForwardError> {
        let candidate = if uri.scheme().is_some() {
            uri.to_string()
        } else {
            let path_and_query = uri.path_and_query().map(|x| x.as_str()).unwrap_or("/");
            format!("{}{}", self.base.origin().ascii_serialization(), path_and_query)
        };
        Url::parse(&candidate)
            .map(|_| ())
            .map_err(|source| ForwardError::InvalidTarget {
                target: uri.to_string(),
                source,
            })
    }
}

/// `base + path`, plus `?query` when the inbound query is non-empty.
pub fn upstream_target(base: &str, uri: &Uri) -> String {
    match uri.query() {
        Some(query) if !query.is_empty() => format!("{}{}?{}", base, uri.path(), query),
        _ => format!("{}{}", base, uri.path()),
    }
}

/// Appends every value of every header in `src` to `dst`.
///
/// Values are never merged or deduplicated, and values sharing a name keep
/// their relative order.
pub fn copy_headers(src: &HeaderMap, dst: &mut HeaderMap) {
    for (name, value) in src {
        dst.append(name, value.clone());
    }
}

impl Service<Request<Body>> for Forwarder {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { this.proxy_request(req).await })
    }
}
