//! HTTP transport backed by `reqwest`
//!
//! Requests go to `<url>/archivist/<path>` with a bearer token. Counting
//! requests set `X-Request-Total-Count: true` and read `X-Total-Count` back.
//! A 429 is retried after `Archivist-Rate-Limit-Reset` seconds, up to
//! `rate_limit_retries` times; every other failure is returned as is.

use crate::config::ArchivistConfig;
use crate::error::{ArchivistError, TransportError};
use crate::transport::{Method, Request, Response, Transport};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::StatusCode;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Request header asking for a total count
pub const REQUEST_TOTAL_COUNT: &str = "X-Request-Total-Count";
/// Response header carrying the total count
pub const TOTAL_COUNT: &str = "X-Total-Count";
/// Response header carrying seconds until the rate limit resets
pub const RATE_LIMIT_RESET: &str = "Archivist-Rate-Limit-Reset";

const ROOT: &str = "archivist";

/// Bearer token that never shows up in `Debug` output
#[derive(Clone)]
struct AuthToken(String);

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

/// `reqwest` implementation of [`Transport`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    root: String,
    token: AuthToken,
    rate_limit_retries: u32,
}

impl HttpTransport {
    /// Build from configuration and a bearer token
    ///
    /// # Errors
    /// Invalid configuration or a client that cannot be constructed.
    pub fn new(config: &ArchivistConfig, token: impl Into<String>) -> Result<Self, ArchivistError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| ArchivistError::Config(format!("http client: {e}")))?;

        Ok(Self {
            client,
            root: format!("{}/{ROOT}", config.url),
            token: AuthToken(token.into()),
            rate_limit_retries: config.rate_limit_retries,
        })
    }

    /// Absolute URL for a relative path
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.root, path.trim_start_matches('/'))
    }

    async fn send_once(&self, request: &Request) -> Result<Response, TransportError> {
        let url = self.url_for(&request.path);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, &url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token.0))
            .query(&request.query);
        if request.count_only {
            builder = builder.header(REQUEST_TOTAL_COUNT, "true");
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(status_error(status, &headers, &url, text));
        }

        let body = if text.trim().is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))?
        };

        let mut response = Response::json(body);
        if request.count_only {
            if let Some(count) = header_u64(&headers, TOTAL_COUNT) {
                response = response.with_total_count(count);
            }
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let mut retries = 0;
        loop {
            tracing::debug!(method = request.method.as_str(), path = %request.path, "request");
            match self.send_once(&request).await {
                Err(TransportError::RateLimited { retry_after_secs })
                    if retries < self.rate_limit_retries =>
                {
                    retries += 1;
                    let wait = Duration::from_secs(retry_after_secs.unwrap_or(1));
                    tracing::warn!(path = %request.path, retries, ?wait, "rate limited, backing off");
                    tokio::time::sleep(wait).await;
                }
                other => return other,
            }
        }
    }

    fn describe(&self) -> String {
        self.root.clone()
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

fn status_error(status: StatusCode, headers: &HeaderMap, url: &str, body: String) -> TransportError {
    match status {
        StatusCode::UNAUTHORIZED => TransportError::Unauthorized,
        StatusCode::FORBIDDEN => TransportError::Forbidden(url.to_string()),
        StatusCode::NOT_FOUND => TransportError::NotFound(url.to_string()),
        StatusCode::TOO_MANY_REQUESTS => TransportError::RateLimited {
            retry_after_secs: header_u64(headers, RATE_LIMIT_RESET),
        },
        other => TransportError::Status {
            code: other.as_u16(),
            body,
        },
    }
}
