//! [`TransportClient`] backed by `tokio-tungstenite`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use futures::{FutureExt, Sink, SinkExt, Stream, StreamExt};
use http::Uri;
use http::header::{self, HeaderValue};
use log::{debug, info, warn};
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};

use super::{
    ConnectError, ConnectFuture, Endpoint, TransportClient, TransportError, TransportResult,
    TransportSession, UpgradeError,
};
use crate::request::UpgradeRequest;

type HandshakeResult = Result<Arc<dyn TransportSession>, ConnectError>;

/// Close code reported when the peer vanished without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported for a close frame without a status.
const NO_STATUS_RECEIVED: u16 = 1005;

enum State {
    Idle,
    Running(Handle),
    Closed,
}

/// WebSocket transport running on the tokio runtime that started it.
///
/// Handshakes are spawned as soon as [`connect`](TransportClient::connect)
/// is called, so they make progress even before the returned future is polled.
pub struct TungsteniteTransport {
    state: Mutex<State>,
}

impl TungsteniteTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Idle),
        }
    }

    /// Stop accepting new connections. Established sessions are unaffected.
    pub fn stop(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = State::Closed;
        info!("WebSocket transport stopped");
    }

    pub fn is_running(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(PoisonError::into_inner),
            State::Running(_)
        )
    }

    fn runtime(&self) -> Option<Handle> {
        match &*self.state.lock().unwrap_or_else(PoisonError::into_inner) {
            State::Running(handle) => Some(handle.clone()),
            State::Idle | State::Closed => None,
        }
    }
}

impl Default for TungsteniteTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportClient for TungsteniteTransport {
    fn start(&self) -> TransportResult<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match &*state {
            State::Running(_) => Ok(()),
            State::Closed => Err(TransportError::Closed),
            State::Idle => {
                let handle = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
                *state = State::Running(handle);
                info!("WebSocket transport started");
                Ok(())
            }
        }
    }

    fn connect(
        &self,
        endpoint: Arc<dyn Endpoint>,
        uri: Uri,
        request: UpgradeRequest,
    ) -> ConnectFuture {
        let Some(runtime) = self.runtime() else {
            return futures::future::ready(Err(ConnectError::NotStarted)).boxed();
        };

        join_handshake(runtime.spawn(handshake(endpoint, uri, request)))
    }
}

/// A handshake task that panicked or was cancelled surfaces as one
/// [`ConnectError::Wrapped`] layer around [`ConnectError::Aborted`].
fn join_handshake(task: JoinHandle<HandshakeResult>) -> ConnectFuture {
    async move {
        match task.await {
            Ok(result) => result,
            Err(err) => Err(ConnectError::from(err).wrapped()),
        }
    }
    .boxed()
}

async fn handshake(
    endpoint: Arc<dyn Endpoint>,
    uri: Uri,
    request: UpgradeRequest,
) -> HandshakeResult {
    let client_request = client_request(&uri, &request)?;

    let connecting = connect_async(client_request);
    let result = if request.timeout.is_zero() {
        connecting.await
    } else {
        tokio::time::timeout(request.timeout, connecting)
            .await
            .map_err(|_| ConnectError::Timeout(request.timeout))?
    };

    let (stream, response) = match result {
        Ok(connected) => connected,
        Err(tungstenite::Error::Http(response)) => {
            warn!(
                "WebSocket upgrade to {} rejected with status {}",
                uri,
                response.status()
            );
            return Err(UpgradeError::new(uri, response.status()).into());
        }
        Err(tungstenite::Error::Io(err)) => return Err(ConnectError::Io(err)),
        Err(err) => return Err(ConnectError::Transport(Box::new(err))),
    };

    debug!(
        "WebSocket upgrade to {} completed with status {}",
        uri,
        response.status()
    );

    let (sink, stream) = stream.split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let session = Arc::new(TungsteniteSession {
        outbound: outbound_tx,
        queued: Arc::new(AtomicU64::new(0)),
        demand: Arc::new(Semaphore::new(0)),
        closing: AtomicBool::new(false),
    });

    tokio::spawn(write_loop(sink, outbound_rx, session.queued.clone()));
    endpoint.on_open(session.clone());
    tokio::spawn(read_loop(stream, endpoint, session.demand.clone()));

    Ok(session)
}

/// Build the tungstenite client request: generated handshake headers plus
/// the caller's headers and subprotocol.
fn client_request(
    uri: &Uri,
    request: &UpgradeRequest,
) -> Result<tungstenite::handshake::client::Request, ConnectError> {
    let mut client_request = uri
        .clone()
        .into_client_request()
        .map_err(|err| ConnectError::InvalidRequest(err.to_string()))?;

    let headers = client_request.headers_mut();
    let caller = request.headers.as_header_map();
    for name in caller.keys() {
        headers.remove(name);
    }
    for (name, value) in caller {
        headers.append(name.clone(), value.clone());
    }

    if !request.subprotocols.is_empty() {
        let protocols = HeaderValue::from_str(&request.subprotocols.join(", "))
            .map_err(|err| ConnectError::InvalidRequest(format!("subprotocol: {err}")))?;
        headers.insert(header::SEC_WEBSOCKET_PROTOCOL, protocols);
    }

    Ok(client_request)
}

async fn write_loop<S>(
    mut sink: S,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    queued: Arc<AtomicU64>,
) where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(message) = outbound.recv().await {
        let size = message.len() as u64;
        let closing = matches!(message, Message::Close(_));
        let result = sink.send(message).await;
        queued.fetch_sub(size, Ordering::AcqRel);
        if let Err(err) = result {
            warn!("WebSocket write failed: {}", err);
            break;
        }
        if closing {
            break;
        }
    }

    // nothing left will be written
    outbound.close();
    while let Ok(message) = outbound.try_recv() {
        queued.fetch_sub(message.len() as u64, Ordering::AcqRel);
    }
    debug!("WebSocket write loop ended");
}

/// Delivers inbound frames while demand lasts. Ends when the stream does or
/// when the session is dropped, which closes `demand`.
async fn read_loop<St>(mut stream: St, endpoint: Arc<dyn Endpoint>, demand: Arc<Semaphore>)
where
    St: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        match demand.acquire().await {
            Ok(permit) => permit.forget(),
            Err(_) => break,
        }

        let Some(frame) = stream.next().await else {
            endpoint.on_close(ABNORMAL_CLOSURE, "connection closed without close frame");
            break;
        };

        match frame {
            Ok(Message::Text(text)) => endpoint.on_text(text.as_str()),
            Ok(Message::Binary(data)) => endpoint.on_binary(&data[..]),
            Ok(Message::Close(frame)) => {
                let (code, reason) = frame
                    .map(|frame| (u16::from(frame.code), frame.reason.to_string()))
                    .unwrap_or((NO_STATUS_RECEIVED, String::new()));
                endpoint.on_close(code, &reason);
                break;
            }
            // control frames do not consume demand
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => demand.add_permits(1),
            Err(err) => {
                endpoint.on_error(&err);
                break;
            }
        }
    }
    debug!("WebSocket read loop ended");
}

struct TungsteniteSession {
    outbound: mpsc::UnboundedSender<Message>,
    queued: Arc<AtomicU64>,
    demand: Arc<Semaphore>,
    closing: AtomicBool,
}

impl TungsteniteSession {
    fn enqueue(&self, message: Message) -> bool {
        let size = message.len() as u64;
        self.queued.fetch_add(size, Ordering::AcqRel);
        if self.outbound.send(message).is_err() {
            self.queued.fetch_sub(size, Ordering::AcqRel);
            return false;
        }
        true
    }
}

impl Drop for TungsteniteSession {
    fn drop(&mut self) {
        self.demand.close();
    }
}

impl TransportSession for TungsteniteSession {
    fn send_text(&self, text: &str) -> bool {
        !self.closing.load(Ordering::Acquire) && self.enqueue(Message::text(text.to_string()))
    }

    fn send_binary(&self, data: Bytes) -> bool {
        !self.closing.load(Ordering::Acquire) && self.enqueue(Message::binary(data))
    }

    fn close(&self, code: u16, reason: &str) -> bool {
        if self.closing.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.enqueue(Message::Close(Some(CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        })))
    }

    fn queue_size(&self) -> u64 {
        self.queued.load(Ordering::Acquire)
    }

    fn request(&self) {
        self.demand.add_permits(1);
    }
}
