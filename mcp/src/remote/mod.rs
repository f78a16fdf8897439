//! Remote API façade
//!
//! Handlers never talk HTTP directly. They build an [`ApiRequest`] (usually
//! through the typed helpers in the backend submodules) and hand it to a
//! [`RemoteApi`]. Production uses [`HttpRemote`]; tests substitute an
//! in-memory fake.

pub mod calendar;
pub mod docs;
pub mod drive;
pub mod gmail;
pub mod http;
pub mod script;
pub mod sheets;

use crate::error::Result;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::fmt;

pub use http::HttpRemote;

/// Remote productivity backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Drive,
    Sheets,
    Docs,
    Gmail,
    Calendar,
    Script,
}

impl Backend {
    /// Base URL of the backend's REST API
    pub fn base_url(&self) -> &'static str {
        match self {
            Backend::Drive => "https://www.googleapis.com/drive/v3",
            Backend::Sheets => "https://sheets.googleapis.com/v4",
            Backend::Docs => "https://docs.googleapis.com/v1",
            Backend::Gmail => "https://gmail.googleapis.com/gmail/v1",
            Backend::Calendar => "https://www.googleapis.com/calendar/v3",
            Backend::Script => "https://script.googleapis.com/v1",
        }
    }

    /// Short name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Drive => "drive",
            Backend::Sheets => "sheets",
            Backend::Docs => "docs",
            Backend::Gmail => "gmail",
            Backend::Calendar => "calendar",
            Backend::Script => "script",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single call against a backend
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Target backend
    pub backend: Backend,

    /// HTTP method
    pub method: Method,

    /// Path segments below the backend base URL, unescaped
    pub segments: Vec<String>,

    /// Query parameters
    pub query: Vec<(String, String)>,

    /// JSON body
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Create a request with the given method and path segments
    pub fn new<I, S>(backend: Backend, method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            backend,
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body: None,
        }
    }

    /// GET request
    pub fn get<I, S>(backend: Backend, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(backend, Method::GET, segments)
    }

    /// POST request
    pub fn post<I, S>(backend: Backend, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(backend, Method::POST, segments)
    }

    /// PUT request
    pub fn put<I, S>(backend: Backend, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(backend, Method::PUT, segments)
    }

    /// PATCH request
    pub fn patch<I, S>(backend: Backend, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(backend, Method::PATCH, segments)
    }

    /// DELETE request
    pub fn delete<I, S>(backend: Backend, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(backend, Method::DELETE, segments)
    }

    /// Add a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Add a query parameter when a value is present
    pub fn query_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    /// Set the JSON body
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Path below the base URL, segments joined with `/`
    pub fn path(&self) -> String {
        self.segments.join("/")
    }

    /// Value of a query parameter
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:/{}", self.method, self.backend, self.path())
    }
}

/// Generic call interface to the remote backends
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Perform a call and decode the JSON response (`null` when empty)
    async fn call(&self, request: ApiRequest) -> Result<Value>;

    /// Perform a call and return the raw response body
    async fn download(&self, request: ApiRequest) -> Result<Vec<u8>>;
}

/// String field of a JSON object, empty when absent
pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Array field of a JSON object, empty when absent
pub(crate) fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builder() {
        let req = ApiRequest::get(Backend::Sheets, ["spreadsheets", "abc", "values", "A1:B2"])
            .query("majorDimension", "ROWS")
            .query_opt("pageToken", None::<String>);

        assert_eq!(req.method, Method::GET);
        assert_eq!(req.path(), "spreadsheets/abc/values/A1:B2");
        assert_eq!(req.query_value("majorDimension"), Some("ROWS"));
        assert_eq!(req.query_value("pageToken"), None);
        assert_eq!(req.to_string(), "GET sheets:/spreadsheets/abc/values/A1:B2");
    }

    #[test]
    fn test_field_helpers() {
        let value = json!({"name": "x", "files": [1, 2]});
        assert_eq!(str_field(&value, "name"), "x");
        assert_eq!(str_field(&value, "missing"), "");
        assert_eq!(array_field(&value, "files").len(), 2);
        assert!(array_field(&value, "missing").is_empty());
    }
}
