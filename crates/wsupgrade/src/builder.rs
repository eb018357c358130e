//! Builder that turns connection parameters into a live [`WebSocket`].
//!
//! # Lifecycle
//!
//! ```text
//! WebSocketBuilder::build_async(listener)
//!   ├─ reject invalid builder headers     ─┐
//!   ├─ transport.start()                   │
//!   ├─ snapshot builder state              │ synchronous, errors are
//!   ├─ run interceptors in order           │ returned as ClientError
//!   ├─ assemble UpgradeRequest             │
//!   ├─ WebSocket::new(listener)            │
//!   ├─ remap uri to ws/wss                ─┘
//!   └─ transport.connect(...)  → WebSocketFuture
//!        ├─ Ok(session)             → Ok(WebSocket)
//!        ├─ Err(Upgrade | Wrapped(Upgrade)) → Err(WebSocketError::Handshake)
//!        └─ Err(other)              → Err(WebSocketError::Connect)
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{FutureExt, TryFutureExt};
use http::Uri;
use log::debug;

use crate::error::{ClientError, ClientResult, WebSocketError, WebSocketHandshakeError};
use crate::headers::{HeaderError, HttpHeaders};
use crate::interceptor::Interceptor;
use crate::request::{WebSocketRequest, to_websocket_uri};
use crate::transport::{ConnectError, TransportClient};
use crate::websocket::{Listener, WebSocket};

/// Future resolving to an open [`WebSocket`].
pub type WebSocketFuture = BoxFuture<'static, Result<WebSocket, WebSocketError>>;

/// Accumulates connection parameters and opens WebSockets from them.
///
/// The builder is never mutated by [`build_async`](Self::build_async), so it
/// can be reused for any number of concurrent attempts.
///
/// # Example
///
/// ```rust,ignore
/// let websocket = client
///     .new_websocket_builder()
///     .with_uri(Uri::from_static("https://cluster.local/api/v1/pods/web/exec"))
///     .with_header("X-Stream-Protocol-Version", "v4.channel.k8s.io")
///     .with_subprotocol("v4.channel.k8s.io")
///     .build_async(Arc::new(MyListener))?
///     .await?;
/// ```
#[derive(Clone)]
pub struct WebSocketBuilder {
    transport: Arc<dyn TransportClient>,
    interceptors: Arc<Vec<Arc<dyn Interceptor>>>,
    request: WebSocketRequest,
    // first header rejected by a `with_header*` call, reported by `build_async`
    invalid_header: Option<HeaderError>,
}

impl WebSocketBuilder {
    pub fn new(
        transport: Arc<dyn TransportClient>,
        handshake_timeout: Duration,
        interceptors: Arc<Vec<Arc<dyn Interceptor>>>,
    ) -> Self {
        Self {
            transport,
            interceptors,
            request: WebSocketRequest::new(handshake_timeout),
            invalid_header: None,
        }
    }

    pub fn with_uri(mut self, uri: Uri) -> Self {
        self.request.set_uri(uri);
        self
    }

    /// Append a header value.
    ///
    /// An invalid name or value is reported by [`build_async`](Self::build_async).
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let Err(err) = self.request.add_header(name, value) {
            self.invalid_header.get_or_insert(err);
        }
        self
    }

    /// Replace all values of a header.
    pub fn with_header_replaced(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let Err(err) = self.request.set_header(name, value) {
            self.invalid_header.get_or_insert(err);
        }
        self
    }

    /// Request a subprotocol. Validation is deferred to connect time, where a
    /// blank value means no subprotocol.
    pub fn with_subprotocol(mut self, subprotocol: impl Into<String>) -> Self {
        self.request.set_subprotocol(Some(subprotocol.into()));
        self
    }

    pub fn uri(&self) -> Option<&Uri> {
        self.request.uri()
    }

    pub fn headers(&self) -> &HttpHeaders {
        self.request.headers()
    }

    pub fn subprotocol(&self) -> Option<&str> {
        self.request.subprotocol()
    }

    pub fn handshake_timeout(&self) -> Duration {
        self.request.handshake_timeout()
    }

    /// Start a connection attempt delivering events to `listener`.
    ///
    /// Everything up to initiating the connect runs on the calling thread;
    /// failures there are returned directly. Failures of the connect itself
    /// are reported by the returned future.
    pub fn build_async(&self, listener: Arc<dyn Listener>) -> ClientResult<WebSocketFuture> {
        if let Some(err) = &self.invalid_header {
            return Err(err.clone().into());
        }
        self.transport.start()?;

        let (mut request, interceptors) = self.snapshot();
        for interceptor in &interceptors {
            let headers = request.headers().clone();
            interceptor
                .before(&mut request, &headers)
                .map_err(ClientError::Interceptor)?;
        }

        let upgrade = request.upgrade_request();
        let websocket = WebSocket::new(listener);
        let uri = to_websocket_uri(request.uri().ok_or(ClientError::MissingUri)?)?;

        debug!(
            "Connecting WebSocket to {} (subprotocols: {:?}, timeout: {}ms)",
            uri,
            upgrade.subprotocols,
            upgrade.timeout_millis()
        );

        let sent_headers = upgrade.headers.clone();
        let endpoint = websocket.endpoint();
        let future = self
            .transport
            .connect(endpoint, uri, upgrade)
            .map_ok(move |_session| websocket)
            .map_err(move |err| translate_connect_error(err, sent_headers));

        Ok(future.boxed())
    }

    fn snapshot(&self) -> (WebSocketRequest, Vec<Arc<dyn Interceptor>>) {
        (self.request.clone(), Vec::clone(&self.interceptors))
    }
}

/// Turn upgrade rejections into handshake errors, passing everything else through.
fn translate_connect_error(err: ConnectError, sent_headers: HttpHeaders) -> WebSocketError {
    match err {
        ConnectError::Upgrade(upgrade) => {
            WebSocketHandshakeError::from_upgrade(upgrade, sent_headers).into()
        }
        ConnectError::Wrapped(inner) => match *inner {
            ConnectError::Upgrade(upgrade) => {
                WebSocketHandshakeError::from_upgrade(upgrade, sent_headers).into()
            }
            inner => ConnectError::Wrapped(Box::new(inner)).into(),
        },
        other => other.into(),
    }
}

impl std::fmt::Debug for WebSocketBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketBuilder")
            .field("request", &self.request)
            .field("invalid_header", &self.invalid_header)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}
