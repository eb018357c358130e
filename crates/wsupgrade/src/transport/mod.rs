//! Transport client abstraction.
//!
//! The builder never touches sockets. It hands a fully assembled
//! [`UpgradeRequest`] to a [`TransportClient`], which performs the HTTP
//! upgrade and then feeds connection events into an [`Endpoint`].
//!
//! ```text
//! WebSocketBuilder ──start()──────────────▶ TransportClient
//!        │         ──connect(endpoint,…)──▶       │
//!        │                                        ▼
//!        │◀──── ConnectFuture ─────────── handshake task
//!        │                                        │ on_open / on_text / on_close
//!        ▼                                        ▼
//!    WebSocket  ◀──────────── Endpoint ◀──── TransportSession
//! ```

mod tungstenite_client;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use http::{StatusCode, Uri};
use thiserror::Error;

use crate::request::UpgradeRequest;

pub use tungstenite_client::TungsteniteTransport;

/// Result type for transport lifecycle operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Future returned by [`TransportClient::connect`].
pub type ConnectFuture = BoxFuture<'static, Result<Arc<dyn TransportSession>, ConnectError>>;

/// Errors raised while starting a transport client.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The client was stopped and cannot be restarted.
    #[error("transport client is closed")]
    Closed,

    /// No async runtime is available to drive connections.
    #[error("no tokio runtime available to drive the transport")]
    NoRuntime,

    /// Any other start-up failure.
    #[error("transport failed to start: {0}")]
    Start(String),
}

/// The server refused to upgrade the connection.
#[derive(Debug, Clone, Error)]
#[error("upgrade of {request_uri} rejected with status {status}")]
pub struct UpgradeError {
    request_uri: Uri,
    status: StatusCode,
}

impl UpgradeError {
    pub fn new(request_uri: Uri, status: StatusCode) -> Self {
        Self {
            request_uri,
            status,
        }
    }

    /// URI the upgrade request was sent to.
    pub fn request_uri(&self) -> &Uri {
        &self.request_uri
    }

    /// Status code of the rejecting HTTP response.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// Errors reported asynchronously by a connect attempt.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The HTTP upgrade was answered with a non-101 status.
    #[error(transparent)]
    Upgrade(#[from] UpgradeError),

    /// A failure surfaced by an intermediate async stage around the real cause.
    #[error("connect stage failed: {0}")]
    Wrapped(#[source] Box<ConnectError>),

    /// The handshake did not complete in time.
    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),

    /// Socket-level failure (refused, reset, DNS, ...).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The request could not be turned into a valid upgrade request.
    #[error("invalid upgrade request: {0}")]
    InvalidRequest(String),

    /// `connect` was called before `start`.
    #[error("transport client is not started")]
    NotStarted,

    /// The task driving the handshake was cancelled or panicked.
    #[error("handshake task aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ConnectError {
    /// Wrap `self` in one [`ConnectError::Wrapped`] layer.
    pub fn wrapped(self) -> Self {
        ConnectError::Wrapped(Box::new(self))
    }
}

/// Socket-level WebSocket client.
pub trait TransportClient: Send + Sync {
    /// Start the client. Must be idempotent and safe to call concurrently.
    fn start(&self) -> TransportResult<()>;

    /// Begin the upgrade handshake against `uri`.
    ///
    /// The returned future resolves once the server accepted the upgrade and
    /// `endpoint` received [`Endpoint::on_open`].
    fn connect(
        &self,
        endpoint: Arc<dyn Endpoint>,
        uri: Uri,
        request: UpgradeRequest,
    ) -> ConnectFuture;
}

/// An established transport connection.
pub trait TransportSession: Send + Sync {
    /// Queue a text frame. Returns `false` if the session no longer accepts data.
    fn send_text(&self, text: &str) -> bool;

    /// Queue a binary frame. Returns `false` if the session no longer accepts data.
    fn send_binary(&self, data: Bytes) -> bool;

    /// Queue a close frame. Returns `false` if a close was already queued.
    fn close(&self, code: u16, reason: &str) -> bool;

    /// Bytes queued for writing that have not been flushed yet.
    fn queue_size(&self) -> u64;

    /// Allow one more inbound message to be delivered.
    fn request(&self);
}

/// Receiver of transport-level connection events.
pub trait Endpoint: Send + Sync {
    fn on_open(&self, session: Arc<dyn TransportSession>);
    fn on_text(&self, text: &str);
    fn on_binary(&self, data: &[u8]);
    fn on_close(&self, code: u16, reason: &str);
    fn on_error(&self, error: &(dyn std::error::Error + Send + Sync));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade_error_display() {
        let err = UpgradeError::new(
            Uri::from_static("wss://cluster.local/api/v1/watch"),
            StatusCode::UNAUTHORIZED,
        );
        assert_eq!(
            err.to_string(),
            "upgrade of wss://cluster.local/api/v1/watch rejected with status 401 Unauthorized"
        );
    }

    #[test]
    fn wrapped_keeps_inner_as_source() {
        let err = ConnectError::Timeout(Duration::from_secs(1)).wrapped();
        let source = std::error::Error::source(&err).expect("wrapped error has a source");
        assert_eq!(source.to_string(), "handshake timed out after 1s");
    }
}
