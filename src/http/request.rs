//! Normalized request handed to the dispatch engine.
//!
//! # Responsibilities
//! - Carry method, path, query, body, params and headers for one dispatch
//! - Provide the sub-request constructors conditions use while descending
//! - Simple Accept negotiation for handlers
//!
//! # Design Decisions
//! - Read-only for handlers: only conditions derive modified copies
//! - Built by the transport adapter (or directly in tests), never parsed here

use std::collections::HashMap;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

/// A transport-independent request.
#[derive(Debug, Clone, Default)]
pub struct Request {
    method: String,
    path: String,
    query: HashMap<String, String>,
    body: Value,
    params: HashMap<String, String>,
    headers: HeaderMap,
}

impl Request {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, query: HashMap<String, String>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Add a single header. Invalid names or values are dropped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping invalid request header"),
        }
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Whether the client accepts `mime`. A missing Accept header accepts anything.
    pub fn accepts(&self, mime: &str) -> bool {
        let Some(accept) = self.header(header::ACCEPT.as_str()) else {
            return true;
        };
        let (kind, _) = mime.split_once('/').unwrap_or((mime, ""));

        accept
            .split(',')
            .map(|range| range.split(';').next().unwrap_or("").trim())
            .any(|range| {
                range == "*/*"
                    || range.eq_ignore_ascii_case(mime)
                    || range
                        .strip_suffix("/*")
                        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(kind))
            })
    }

    /// Copy of this request with the path replaced and extra params merged in.
    pub(crate) fn derive(&self, path: &str, params: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut sub = self.clone();
        sub.path = path.to_string();
        sub.params.extend(params);
        sub
    }
}
