//! Test utilities and common setup.
#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::FutureExt;
use http::{StatusCode, Uri};
use wsupgrade::transport::ConnectFuture;
use wsupgrade::{
    ConnectError, Endpoint, Listener, TransportClient, TransportError, TransportResult,
    TransportSession, UpgradeError, UpgradeRequest, WebSocket,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// How the mock transport answers a connect.
#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Open,
    Reject(StatusCode),
    WrappedReject(StatusCode),
    Refused,
}

/// A connect call as seen by the transport.
#[derive(Debug, Clone)]
pub struct ConnectCall {
    pub uri: Uri,
    pub request: UpgradeRequest,
}

/// Scripted in-memory transport.
pub struct MockTransport {
    outcome: Outcome,
    fail_start: bool,
    starts: AtomicUsize,
    calls: Mutex<Vec<ConnectCall>>,
    sessions: Mutex<Vec<Arc<MockSession>>>,
}

impl MockTransport {
    pub fn new(outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            fail_start: false,
            starts: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
        })
    }

    pub fn failing_start() -> Arc<Self> {
        Arc::new(Self {
            outcome: Outcome::Open,
            fail_start: true,
            starts: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
        })
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<ConnectCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> ConnectCall {
        self.calls().pop().expect("no connect call recorded")
    }

    pub fn sessions(&self) -> Vec<Arc<MockSession>> {
        self.sessions.lock().unwrap().clone()
    }
}

impl TransportClient for MockTransport {
    fn start(&self) -> TransportResult<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    fn connect(
        &self,
        endpoint: Arc<dyn Endpoint>,
        uri: Uri,
        request: UpgradeRequest,
    ) -> ConnectFuture {
        self.calls.lock().unwrap().push(ConnectCall {
            uri: uri.clone(),
            request,
        });

        let result: Result<Arc<dyn TransportSession>, ConnectError> = match self.outcome {
            Outcome::Open => {
                let session = Arc::new(MockSession::default());
                self.sessions.lock().unwrap().push(session.clone());
                endpoint.on_open(session.clone());
                Ok(session)
            }
            Outcome::Reject(status) => Err(UpgradeError::new(uri, status).into()),
            Outcome::WrappedReject(status) => {
                Err(ConnectError::from(UpgradeError::new(uri, status)).wrapped())
            }
            Outcome::Refused => Err(ConnectError::Io(io::Error::from(
                io::ErrorKind::ConnectionRefused,
            ))),
        };
        futures::future::ready(result).boxed()
    }
}

/// Session recording everything written to it.
#[derive(Debug, Default)]
pub struct MockSession {
    pub sent: Mutex<Vec<String>>,
    pub demand: AtomicUsize,
}

impl TransportSession for MockSession {
    fn send_text(&self, text: &str) -> bool {
        self.sent.lock().unwrap().push(text.to_string());
        true
    }

    fn send_binary(&self, data: Bytes) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push(format!("<{} bytes>", data.len()));
        true
    }

    fn close(&self, code: u16, reason: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push(format!("<close {code} {reason}>"));
        true
    }

    fn queue_size(&self) -> u64 {
        0
    }

    fn request(&self) {
        self.demand.fetch_add(1, Ordering::SeqCst);
    }
}

/// Listener recording lifecycle events.
#[derive(Debug, Default)]
pub struct RecordingListener {
    pub events: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Listener for RecordingListener {
    fn on_open(&self, websocket: &WebSocket) {
        self.events.lock().unwrap().push("open".to_string());
        websocket.request();
    }

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
