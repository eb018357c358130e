//! Factory for [`WebSocketBuilder`]s sharing one transport and interceptor chain.

use std::sync::Arc;
use std::time::Duration;

use crate::builder::WebSocketBuilder;
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::interceptor::{HeaderInterceptor, Interceptor};
use crate::transport::{TransportClient, TungsteniteTransport};

/// Shared WebSocket client.
///
/// Cheap to clone. Every builder it hands out shares the same transport and
/// sees the interceptors registered at the time the builder was created.
#[derive(Clone)]
pub struct WebSocketClient {
    transport: Arc<dyn TransportClient>,
    handshake_timeout: Duration,
    interceptors: Arc<Vec<Arc<dyn Interceptor>>>,
}

impl WebSocketClient {
    /// Create a client over `transport`.
    ///
    /// Configured default headers and user agent are applied by an
    /// interceptor that runs before any added later. Fails if one of them is
    /// not a valid header.
    pub fn new(transport: Arc<dyn TransportClient>, config: &ClientConfig) -> ClientResult<Self> {
        let mut interceptors: Vec<Arc<dyn Interceptor>> = Vec::new();
        let defaults = HeaderInterceptor::new(config.headers()?);
        if !defaults.is_empty() {
            interceptors.push(Arc::new(defaults));
        }

        Ok(Self {
            transport,
            handshake_timeout: config.handshake_timeout(),
            interceptors: Arc::new(interceptors),
        })
    }

    /// Create a client on the tokio-tungstenite transport.
    pub fn tungstenite(config: &ClientConfig) -> ClientResult<Self> {
        Self::new(Arc::new(TungsteniteTransport::new()), config)
    }

    /// Append an interceptor to the chain.
    pub fn with_interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        Arc::make_mut(&mut self.interceptors).push(Arc::new(interceptor));
        self
    }

    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    pub fn interceptor_count(&self) -> usize {
        self.interceptors.len()
    }

    pub fn new_websocket_builder(&self) -> WebSocketBuilder {
        WebSocketBuilder::new(
            self.transport.clone(),
            self.handshake_timeout,
            self.interceptors.clone(),
        )
    }
}

impl std::fmt::Debug for WebSocketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketClient")
            .field("handshake_timeout", &self.handshake_timeout)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use std::collections::BTreeMap;

    #[test]
    fn default_headers_install_an_interceptor() {
        let config = ClientConfig {
            handshake_timeout_ms: 1500,
            user_agent: Some("wsupgrade/0.1".to_string()),
            default_headers: BTreeMap::new(),
        };
        let client = WebSocketClient::tungstenite(&config).unwrap();
        assert_eq!(client.interceptor_count(), 1);

        let builder = client.new_websocket_builder();
        assert_eq!(builder.handshake_timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn no_defaults_no_interceptor() {
        let client = WebSocketClient::tungstenite(&ClientConfig::default()).unwrap();
        assert_eq!(client.interceptor_count(), 0);
    }

    #[test]
    fn interceptors_added_later_do_not_reach_existing_builders() {
        let client = WebSocketClient::tungstenite(&ClientConfig::default()).unwrap();
        let before = client.new_websocket_builder();
        let client = client.with_interceptor(NoopInterceptor);
        assert_eq!(client.interceptor_count(), 1);
        assert!(format!("{before:?}").contains("interceptors: 0"));
    }

    #[test]
    fn invalid_user_agent_is_rejected() {
        let config = ClientConfig {
            user_agent: Some("wsupgrade\r\n".to_string()),
            ..ClientConfig::default()
        };
        assert!(matches!(
            WebSocketClient::tungstenite(&config),
            Err(ClientError::InvalidHeader(_))
        ));
    }

    struct NoopInterceptor;

    impl Interceptor for NoopInterceptor {
        fn before(
            &self,
            _request: &mut crate::request::WebSocketRequest,
            _headers: &crate::headers::HttpHeaders,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }
}
