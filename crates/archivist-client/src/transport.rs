//! Transport seam
//!
//! Everything the client asks of the service goes through [`Transport::send`].
//! Paths are relative to the service root (`v2/assets`, `iam/v1/subjects/...`),
//! so a transport decides where the root lives and how credentials are attached.

use crate::error::TransportError;
use async_trait::async_trait;
use serde_json::Value;

/// Request verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Read
    Get,
    /// Create
    Post,
    /// Update
    Patch,
    /// Delete
    Delete,
}

impl Method {
    /// Upper-case verb
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// Request to the service
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Verb
    pub method: Method,
    /// Path relative to the service root
    pub path: String,
    /// Query parameters, in order; keys may repeat
    pub query: Vec<(String, String)>,
    /// JSON body
    pub body: Option<Value>,
    /// Ask the service for the total match count instead of relying on the body
    pub count_only: bool,
}

impl Request {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            count_only: false,
        }
    }

    /// GET request
    #[inline]
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// POST request with body
    #[inline]
    #[must_use]
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    /// PATCH request with body
    #[inline]
    #[must_use]
    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Patch, path).with_body(body)
    }

    /// DELETE request
    #[inline]
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// With body
    #[inline]
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// With additional query parameters
    #[inline]
    #[must_use]
    pub fn with_query(mut self, params: impl IntoIterator<Item = (String, String)>) -> Self {
        self.query.extend(params);
        self
    }

    /// With a single query parameter
    #[inline]
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Request the total match count
    #[inline]
    #[must_use]
    pub fn counting(mut self) -> Self {
        self.count_only = true;
        self
    }

    /// First value of a query parameter
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Response from the service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    /// JSON body; an empty object when the service sent nothing
    pub body: Value,
    /// Total match count, when requested and reported
    pub total_count: Option<u64>,
}

impl Response {
    /// Response with body
    #[inline]
    #[must_use]
    pub fn json(body: Value) -> Self {
        Self {
            body,
            total_count: None,
        }
    }

    /// With total count
    #[inline]
    #[must_use]
    pub fn with_total_count(mut self, count: u64) -> Self {
        self.total_count = Some(count);
        self
    }
}

/// Carries requests to the service
///
/// Errors are propagated unchanged by every client operation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request
    async fn send(&self, request: Request) -> Result<Response, TransportError>;

    /// Human-readable location of the service, for logs and `Display`
    fn describe(&self) -> String {
        String::from("transport")
    }
}
