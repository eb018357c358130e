//! Case-insensitive HTTP header multimap.

use http::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;

/// A header name or value that cannot appear in an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("invalid header name {0:?}")]
    InvalidName(String),

    #[error("invalid value for header {0}")]
    InvalidValue(String),
}

/// Ordered multimap of HTTP headers backed by [`HeaderMap`].
///
/// Names are matched case-insensitively and keep the order in which they
/// were first inserted. Every name keeps its values in insertion order.
/// Names and values are validated on insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpHeaders {
    map: HeaderMap,
}

impl HttpHeaders {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a header map from string pairs, failing on the first invalid one.
    pub fn try_from_pairs<I, K, V>(pairs: I) -> Result<Self, HeaderError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut headers = Self::new();
        for (name, value) in pairs {
            headers.add(name, value)?;
        }
        Ok(headers)
    }

    /// Append a value to `name`, keeping any existing values.
    pub fn add(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<(), HeaderError> {
        let (name, value) = parse(name.as_ref(), value.as_ref())?;
        self.map.append(name, value);
        Ok(())
    }

    /// Replace every value of `name` with `value`.
    pub fn set(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<(), HeaderError> {
        let (name, value) = parse(name.as_ref(), value.as_ref())?;
        self.map.insert(name, value);
        Ok(())
    }

    pub fn append(&mut self, name: HeaderName, value: HeaderValue) {
        self.map.append(name, value);
    }

    /// Remove `name`, returning its values if it was present.
    pub fn remove(&mut self, name: impl AsRef<str>) -> Option<Vec<String>> {
        let name = name.as_ref();
        if !self.map.contains_key(name) {
            return None;
        }
        let values = self.headers(name).into_iter().map(str::to_string).collect();
        self.map.remove(name);
        Some(values)
    }

    /// First value of `name`.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.map
            .get(name.as_ref())
            .and_then(|value| value.to_str().ok())
    }

    /// All values of `name`, empty when absent.
    pub fn headers(&self, name: impl AsRef<str>) -> Vec<&str> {
        self.map
            .get_all(name.as_ref())
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect()
    }

    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        self.map.contains_key(name.as_ref())
    }

    /// Distinct header names, lower-cased, in first-insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(HeaderName::as_str)
    }

    /// Iterate over every `(name, value)` pair.
    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.map.iter()
    }

    pub fn as_header_map(&self) -> &HeaderMap {
        &self.map
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.map.keys_len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl From<HeaderMap> for HttpHeaders {
    fn from(map: HeaderMap) -> Self {
        Self { map }
    }
}

fn parse(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), HeaderError> {
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|_| HeaderError::InvalidName(name.to_string()))?;
    let value =
        HeaderValue::from_str(value).map_err(|_| HeaderError::InvalidValue(name.to_string()))?;
    Ok((name, value))
}
