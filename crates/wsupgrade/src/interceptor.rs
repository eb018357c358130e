//! Request interceptors applied right before a handshake.

use crate::headers::HttpHeaders;
use crate::request::WebSocketRequest;

/// Hook invoked once per connection attempt, in registration order.
///
/// `request` is the snapshot that will be sent; `headers` is a read-only
/// copy of its headers as they were before this interceptor ran. Returning
/// an error aborts the attempt before any network I/O.
pub trait Interceptor: Send + Sync {
    fn before(&self, request: &mut WebSocketRequest, headers: &HttpHeaders) -> anyhow::Result<()>;
}

impl<F> Interceptor for F
where
    F: Fn(&mut WebSocketRequest, &HttpHeaders) -> anyhow::Result<()> + Send + Sync,
{
    fn before(&self, request: &mut WebSocketRequest, headers: &HttpHeaders) -> anyhow::Result<()> {
        self(request, headers)
    }
}

/// Adds fixed headers unless the request already carries them.
#[derive(Debug, Clone, Default)]
pub struct HeaderInterceptor {
    headers: HttpHeaders,
}

impl HeaderInterceptor {
    pub fn new(headers: HttpHeaders) -> Self {
        Self { headers }
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl Interceptor for HeaderInterceptor {
    fn before(&self, request: &mut WebSocketRequest, headers: &HttpHeaders) -> anyhow::Result<()> {
        for (name, value) in self.headers.iter() {
            if !headers.contains(name.as_str()) {
                request.headers_mut().append(name.clone(), value.clone());
            }
        }
        Ok(())
    }
}

/// Sets `Authorization: Bearer <token>` when no authorization header is present.
#[derive(Clone)]
pub struct BearerTokenInterceptor {
    token: String,
}

impl BearerTokenInterceptor {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Interceptor for BearerTokenInterceptor {
    fn before(&self, request: &mut WebSocketRequest, headers: &HttpHeaders) -> anyhow::Result<()> {
        if headers.contains(http::header::AUTHORIZATION.as_str()) {
            return Ok(());
        }
        anyhow::ensure!(!self.token.trim().is_empty(), "bearer token is empty");
        request.set_header(
            http::header::AUTHORIZATION.as_str(),
            format!("Bearer {}", self.token),
        )?;
        Ok(())
    }
}

impl std::fmt::Debug for BearerTokenInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerTokenInterceptor")
            .field("token", &"<redacted>")
            .finish()
    }
}
