//! WebSocket connection handle and listener callbacks.

use std::sync::{Arc, OnceLock, Weak};

use bytes::Bytes;
use log::debug;

use crate::transport::{Endpoint, TransportSession};

/// Receives events for a [`WebSocket`].
///
/// Inbound messages are delivered on demand: after each message the listener
/// must call [`WebSocket::request`] to receive the next one. The defaults
/// below keep messages flowing.
pub trait Listener: Send + Sync {
    /// The handshake completed.
    fn on_open(&self, websocket: &WebSocket) {
        websocket.request();
    }

    fn on_message(&self, websocket: &WebSocket, _text: &str) {
        websocket.request();
    }

    fn on_binary(&self, websocket: &WebSocket, _data: &[u8]) {
        websocket.request();
    }

    fn on_close(&self, _websocket: &WebSocket, _code: u16, _reason: &str) {}

    fn on_error(&self, _websocket: &WebSocket, _error: &(dyn std::error::Error + Send + Sync)) {}
}

/// A WebSocket connection bound to a [`Listener`].
///
/// Created before the handshake starts; every send operation returns `false`
/// until the transport has opened the session.
#[derive(Clone)]
pub struct WebSocket {
    inner: Arc<Inner>,
}

struct Inner {
    listener: Arc<dyn Listener>,
    session: OnceLock<Arc<dyn TransportSession>>,
}

impl WebSocket {
    pub(crate) fn new(listener: Arc<dyn Listener>) -> Self {
        Self {
            inner: Arc::new(Inner {
                listener,
                session: OnceLock::new(),
            }),
        }
    }

    /// The listener this connection delivers events to.
    pub fn listener(&self) -> &Arc<dyn Listener> {
        &self.inner.listener
    }

    /// Whether the transport has opened the session.
    pub fn is_open(&self) -> bool {
        self.inner.session.get().is_some()
    }

    /// Queue a binary message.
    pub fn send(&self, data: impl Into<Bytes>) -> bool {
        self.session()
            .is_some_and(|session| session.send_binary(data.into()))
    }

    /// Queue a text message.
    pub fn send_text(&self, text: &str) -> bool {
        self.session().is_some_and(|session| session.send_text(text))
    }

    /// Queue a close frame with the given status code and reason.
    pub fn send_close(&self, code: u16, reason: &str) -> bool {
        self.session()
            .is_some_and(|session| session.close(code, reason))
    }

    /// Bytes queued for sending but not yet written.
    pub fn queue_size(&self) -> u64 {
        self.session().map_or(0, |session| session.queue_size())
    }

    /// Request delivery of the next inbound message.
    pub fn request(&self) {
        if let Some(session) = self.session() {
            session.request();
        }
    }

    /// Event sink handed to the transport.
    ///
    /// It only holds the handle weakly: once every `WebSocket` clone is gone
    /// the session is released and later events are dropped.
    pub(crate) fn endpoint(&self) -> Arc<dyn Endpoint> {
        Arc::new(WeakEndpoint(Arc::downgrade(&self.inner)))
    }

    fn session(&self) -> Option<&Arc<dyn TransportSession>> {
        self.inner.session.get()
    }
}

struct WeakEndpoint(Weak<Inner>);

impl WeakEndpoint {
    fn websocket(&self) -> Option<WebSocket> {
        let websocket = self.0.upgrade().map(|inner| WebSocket { inner });
        if websocket.is_none() {
            debug!("Dropping event for released WebSocket");
        }
        websocket
    }
}

impl Endpoint for WeakEndpoint {
    fn on_open(&self, session: Arc<dyn TransportSession>) {
        if let Some(websocket) = self.websocket() {
            websocket.on_open(session);
        }
    }

    fn on_text(&self, text: &str) {
        if let Some(websocket) = self.websocket() {
            websocket.on_text(text);
        }
    }

    fn on_binary(&self, data: &[u8]) {
        if let Some(websocket) = self.websocket() {
            websocket.on_binary(data);
        }
    }

    fn on_close(&self, code: u16, reason: &str) {
        if let Some(websocket) = self.websocket() {
            websocket.on_close(code, reason);
        }
    }

    fn on_error(&self, error: &(dyn std::error::Error + Send + Sync)) {
        if let Some(websocket) = self.websocket() {
            websocket.on_error(error);
        }
    }
}

impl Endpoint for WebSocket {
    fn on_open(&self, session: Arc<dyn TransportSession>) {
        if self.inner.session.set(session).is_err() {
            debug!("Ignoring duplicate open event for WebSocket");
            return;
        }
        self.inner.listener.on_open(self);
    }

    fn on_text(&self, text: &str) {
        self.inner.listener.on_message(self, text);
    }

    fn on_binary(&self, data: &[u8]) {
        self.inner.listener.on_binary(self, data);
    }

    fn on_close(&self, code: u16, reason: &str) {
        self.inner.listener.on_close(self, code, reason);
    }

    fn on_error(&self, error: &(dyn std::error::Error + Send + Sync)) {
        self.inner.listener.on_error(self, error);
    }
}

impl std::fmt::Debug for WebSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocket")
            .field("open", &self.is_open())
            .field("queue_size", &self.queue_size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeSession {
        sent: Mutex<Vec<String>>,
        requested: AtomicUsize,
    }

    impl TransportSession for FakeSession {
        fn send_text(&self, text: &str) -> bool {
            self.sent.lock().unwrap().push(text.to_string());
            true
        }

        fn send_binary(&self, data: Bytes) -> bool {
            self.sent.lock().unwrap().push(format!("{} bytes", data.len()));
            true
        }

        fn close(&self, code: u16, reason: &str) -> bool {
            self.sent.lock().unwrap().push(format!("close {code} {reason}"));
            true
        }

        fn queue_size(&self) -> u64 {
            7
        }

        fn request(&self) {
            self.requested.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Listener for Recorder {
        fn on_message(&self, websocket: &WebSocket, text: &str) {
            self.events.lock().unwrap().push(format!("text {text}"));
            websocket.request();
        }

        fn on_close(&self, _websocket: &WebSocket, code: u16, reason: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("close {code} {reason}"));
        }
    }

    #[test]
    fn sends_fail_before_open() {
        let websocket = WebSocket::new(Arc::new(Recorder::default()));
        assert!(!websocket.is_open());
        assert!(!websocket.send_text("hello"));
        assert!(!websocket.send(vec![1, 2, 3]));
        assert!(!websocket.send_close(1000, "bye"));
        assert_eq!(websocket.queue_size(), 0);
    }

    #[test]
    fn open_session_forwards_operations() {
        let session = Arc::new(FakeSession::default());
        let websocket = WebSocket::new(Arc::new(Recorder::default()));

        websocket.on_open(session.clone());

        assert!(websocket.is_open());
        // default on_open asks for the first message
        assert_eq!(session.requested.load(Ordering::SeqCst), 1);
        assert!(websocket.send_text("hello"));
        assert!(websocket.send(Bytes::from_static(b"abc")));
        assert!(websocket.send_close(1000, "done"));
        assert_eq!(websocket.queue_size(), 7);
        assert_eq!(
            *session.sent.lock().unwrap(),
            vec!["hello", "3 bytes", "close 1000 done"]
        );
    }

    #[test]
    fn endpoint_events_reach_listener() {
        let recorder = Arc::new(Recorder::default());
        let session = Arc::new(FakeSession::default());
        let websocket = WebSocket::new(recorder.clone());
        websocket.on_open(session.clone());

        websocket.on_text("ping");
        websocket.on_close(1001, "going away");

        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec!["text ping", "close 1001 going away"]
        );
        assert_eq!(session.requested.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn transport_endpoint_does_not_keep_handle_alive() {
        let recorder = Arc::new(Recorder::default());
        let session = Arc::new(FakeSession::default());
        let websocket = WebSocket::new(recorder.clone());
        let endpoint = websocket.endpoint();

        endpoint.on_open(session.clone());
        endpoint.on_text("first");
        assert!(websocket.is_open());
        assert_eq!(Arc::strong_count(&session), 2);

        drop(websocket);
        assert_eq!(Arc::strong_count(&session), 1);

        endpoint.on_text("late");
        assert_eq!(*recorder.events.lock().unwrap(), vec!["text first"]);
    }

    struct Silent;

    impl Listener for Silent {}

    #[test]
    fn default_callbacks_keep_messages_flowing() {
        let session = Arc::new(FakeSession::default());
        let websocket = WebSocket::new(Arc::new(Silent));

        websocket.on_open(session.clone());
        websocket.on_text("one");
        websocket.on_binary(b"two");
        websocket.on_close(1000, "done");

        assert_eq!(session.requested.load(Ordering::SeqCst), 3);
        assert!(session.sent.lock().unwrap().is_empty());
    }
}
