//! WebSocket upgrade client.
//!
//! Builds WebSocket connections on top of a pluggable transport:
//!
//! - [`WebSocketClient`] hands out [`WebSocketBuilder`]s sharing a transport
//!   and an ordered interceptor chain.
//! - [`WebSocketBuilder::build_async`] snapshots the builder, runs the
//!   interceptors against the snapshot, and starts the upgrade.
//! - Rejected upgrades surface as [`WebSocketHandshakeError`] carrying the
//!   failed HTTP response; other failures are passed through untouched.

pub mod builder;
pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod interceptor;
pub mod request;
pub mod transport;
pub mod websocket;

pub use builder::{WebSocketBuilder, WebSocketFuture};
pub use client::WebSocketClient;
pub use config::ClientConfig;
pub use error::{
    ClientError, ClientResult, HttpRequest, HttpResponse, WebSocketError, WebSocketHandshakeError,
};
pub use headers::{HeaderError, HttpHeaders};
pub use interceptor::{BearerTokenInterceptor, HeaderInterceptor, Interceptor};
pub use request::{UpgradeRequest, WebSocketRequest, to_websocket_uri};
pub use transport::{
    ConnectError, ConnectFuture, Endpoint, TransportClient, TransportError, TransportResult,
    TransportSession, TungsteniteTransport, UpgradeError,
};
pub use websocket::{Listener, WebSocket};
