//! Error types for WebSocket connection attempts.
//!
//! Failures reach the caller through exactly one of two channels:
//! [`ClientError`] is returned synchronously by `build_async`, before any
//! network I/O, while [`WebSocketError`] is the error of the returned future.

use bytes::Bytes;
use http::{StatusCode, Uri};
use thiserror::Error;

use crate::headers::{HeaderError, HttpHeaders};
use crate::transport::{ConnectError, TransportError, UpgradeError};

/// Result type for synchronous client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Failures raised before the connect is initiated.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The transport client could not be started.
    #[error("failed to start websocket transport: {0}")]
    Start(#[from] TransportError),

    /// No target URI was configured.
    #[error("websocket request has no uri")]
    MissingUri,

    /// The target URI could not be mapped to a WebSocket URI.
    #[error("invalid websocket uri {uri}: {message}")]
    InvalidUri { uri: String, message: String },

    /// A header name or value set on the builder or in the configuration is malformed.
    #[error(transparent)]
    InvalidHeader(#[from] HeaderError),

    /// An interceptor refused or failed to prepare the request.
    #[error("request interceptor failed: {0:#}")]
    Interceptor(#[source] anyhow::Error),
}

/// Failures delivered through the connect future.
#[derive(Debug, Error)]
pub enum WebSocketError {
    /// The server answered the upgrade with a non-101 HTTP response.
    #[error(transparent)]
    Handshake(#[from] WebSocketHandshakeError),

    /// Any other connect failure, as reported by the transport.
    #[error(transparent)]
    Connect(#[from] ConnectError),
}

impl WebSocketError {
    /// The handshake failure, if this is one.
    pub fn as_handshake(&self) -> Option<&WebSocketHandshakeError> {
        match self {
            WebSocketError::Handshake(handshake) => Some(handshake),
            WebSocketError::Connect(_) => None,
        }
    }
}

/// A rejected WebSocket upgrade.
///
/// Carries the request as it was sent and a synthetic response holding only
/// the status code. The transport's [`UpgradeError`] is kept as the source.
#[derive(Debug, Error)]
#[error("websocket handshake with {} failed with status {}", .response.request.uri, .response.status)]
pub struct WebSocketHandshakeError {
    response: HttpResponse,
    #[source]
    cause: UpgradeError,
}

impl WebSocketHandshakeError {
    /// Build the failure from a transport upgrade error and the headers that were sent.
    pub fn from_upgrade(cause: UpgradeError, sent_headers: HttpHeaders) -> Self {
        let request = HttpRequest {
            uri: cause.request_uri().clone(),
            headers: sent_headers,
        };
        Self {
            response: HttpResponse {
                request,
                status: cause.status(),
                headers: HttpHeaders::new(),
                body: None,
            },
            cause,
        }
    }

    pub fn response(&self) -> &HttpResponse {
        &self.response
    }

    pub fn cause(&self) -> &UpgradeError {
        &self.cause
    }
}

/// The request half of a failed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    uri: Uri,
    headers: HttpHeaders,
}

impl HttpRequest {
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }
}

/// The response half of a failed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    request: HttpRequest,
    status: StatusCode,
    headers: HttpHeaders,
    body: Option<Bytes>,
}

impl HttpResponse {
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn is_successful(&self) -> bool {
        self.status.is_success()
    }
}
