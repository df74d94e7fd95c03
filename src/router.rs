use crate::proxy::Forwarder;
use axum::routing::Router;

/// Enables conversion from a `Forwarder` into an Axum `Router`.
///
/// The forwarder is mounted as the fallback service, so every method and
/// every path is relayed upstream.
///
/// # Example
///
/// ```rust
/// use axum::Router;
/// use api_relay::{Forwarder, ProxyConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let forwarder = Forwarder::new("https://api.openai.com", &ProxyConfig::direct()).unwrap();
/// let app: Router = forwarder.into();
/// # }
/// ```
impl<S> From<Forwarder> for Router<S>
where
    S: Send + Sync + Clone + 'static,
{
    fn from(forwarder: Forwarder) -> Self {
        Router::<S>::new().fallback_service(forwarder)
    }
}
