//! Request values flowing through a connection attempt.
//!
//! [`WebSocketRequest`] is both the mutable builder state and the snapshot
//! taken for each attempt. [`UpgradeRequest`] is what a transport receives.

use std::time::Duration;

use http::Uri;

use crate::error::ClientError;
use crate::headers::{HeaderError, HttpHeaders};

/// Connection parameters for a single WebSocket upgrade.
///
/// Interceptors receive a mutable reference to the snapshot that is later
/// turned into the [`UpgradeRequest`], so their changes are what gets sent.
#[derive(Debug, Clone)]
pub struct WebSocketRequest {
    uri: Option<Uri>,
    headers: HttpHeaders,
    subprotocol: Option<String>,
    handshake_timeout: Duration,
}

impl WebSocketRequest {
    pub fn new(handshake_timeout: Duration) -> Self {
        Self {
            uri: None,
            headers: HttpHeaders::new(),
            subprotocol: None,
            handshake_timeout,
        }
    }

    pub fn uri(&self) -> Option<&Uri> {
        self.uri.as_ref()
    }

    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    pub fn subprotocol(&self) -> Option<&str> {
        self.subprotocol.as_deref()
    }

    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    pub fn set_uri(&mut self, uri: Uri) -> &mut Self {
        self.uri = Some(uri);
        self
    }

    /// Append a header value.
    pub fn add_header(
        &mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<&mut Self, HeaderError> {
        self.headers.add(name, value)?;
        Ok(self)
    }

    /// Replace all values of a header.
    pub fn set_header(
        &mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<&mut Self, HeaderError> {
        self.headers.set(name, value)?;
        Ok(self)
    }

    pub fn headers_mut(&mut self) -> &mut HttpHeaders {
        &mut self.headers
    }

    pub fn remove_header(&mut self, name: impl AsRef<str>) -> &mut Self {
        self.headers.remove(name);
        self
    }

    /// Set the requested subprotocol. Blank values request none.
    pub fn set_subprotocol(&mut self, subprotocol: Option<String>) -> &mut Self {
        self.subprotocol = subprotocol;
        self
    }

    /// Assemble the transport-level request from the current state.
    pub(crate) fn upgrade_request(&self) -> UpgradeRequest {
        let subprotocols = self
            .subprotocol
            .as_deref()
            .filter(|protocol| !protocol.trim().is_empty())
            .map(|protocol| vec![protocol.to_string()])
            .unwrap_or_default();

        UpgradeRequest {
            subprotocols,
            headers: self.headers.clone(),
            timeout: self.handshake_timeout,
        }
    }
}

/// Wire parameters of an HTTP upgrade request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequest {
    /// Requested subprotocols, zero or one entry.
    pub subprotocols: Vec<String>,
    pub headers: HttpHeaders,
    /// Handshake timeout. Zero disables it.
    pub timeout: Duration,
}

impl UpgradeRequest {
    pub fn timeout_millis(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Map an HTTP URI onto the matching WebSocket scheme.
///
/// `http` becomes `ws` and `https` becomes `wss`; any other scheme is kept.
pub fn to_websocket_uri(uri: &Uri) -> Result<Uri, ClientError> {
    let text = uri.to_string();
    let remapped = match uri.scheme_str() {
        Some(scheme) if scheme.eq_ignore_ascii_case("http") => {
            format!("ws{}", &text["http".len()..])
        }
        Some(scheme) if scheme.eq_ignore_ascii_case("https") => {
            format!("wss{}", &text["https".len()..])
        }
        _ => return Ok(uri.clone()),
    };

    remapped
        .parse::<Uri>()
        .map_err(|err| ClientError::InvalidUri {
            uri: text,
            message: err.to_string(),
        })
}
