//! Error types for the relay.
//!
//! [`ForwardError`] covers a single exchange and always renders as a
//! `500 Internal Server Error`. [`ConfigError`] and [`ServerError`] are
//! startup and lifecycle failures reported by the binary.

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, HeaderValue, Response, StatusCode},
    response::IntoResponse,
};
use std::error::Error as StdError;
use thiserror::Error;

/// Failures while forwarding one inbound request.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid inbound target {target:?}: {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build outbound request: {0}")]
    BuildRequest(#[from] http::Error),

    #[error("{}", describe(.0))]
    Upstream(#[source] hyper_util::client::legacy::Error),
}

impl ForwardError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    /// The plain-text body sent to the caller.
    ///
    /// Only upstream execution failures expose the underlying error text;
    /// the other categories answer with a fixed message.
    pub fn caller_message(&self) -> String {
        match self {
            ForwardError::InvalidTarget { .. } => StatusCode::INTERNAL_SERVER_ERROR
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string(),
            ForwardError::BuildRequest(_) => "Error creating proxy request".to_string(),
            ForwardError::Upstream(_) => self.to_string(),
        }
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> axum::response::Response {
        let mut response = Response::new(Body::from(self.caller_message()));
        *response.status_mut() = self.status_code();
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

/// Renders an error with its whole `source()` chain, outermost first.
///
/// hyper-util's client error only says `client error (Connect)`; the useful
/// part (`Connection refused`, the TLS alert, ...) lives further down.
pub fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}

/// Problems with the startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid proxy url {value:?}: {source}")]
    InvalidProxyUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported proxy scheme {0:?}, only http proxies are supported")]
    UnsupportedProxyScheme(String),

    #[error("proxy url {0:?} has no host")]
    MissingProxyHost(String),

    #[error("invalid proxy credentials: {0}")]
    InvalidProxyCredentials(#[from] http::header::InvalidHeaderValue),

    #[error("invalid proxy uri: {0}")]
    InvalidProxyUri(#[from] http::uri::InvalidUri),

    #[error("environment variable {name} is not valid unicode: {value:?}")]
    NonUnicodeEnv {
        name: &'static str,
        value: std::ffi::OsString,
    },

    #[error("invalid upstream base {value:?}: {source}")]
    InvalidUpstream {
        value: String,
        #[source]
        source: url::ParseError,
    },
}

/// Failures of the listener as a whole.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("listener failed: {0}")]
    Serve(#[source] std::io::Error),

    #[error("listener task faulted: {0}")]
    Faulted(String),
}
