//! Response sink written by middleware and actions.
//!
//! # Responsibilities
//! - Define the `ResponseSink` boundary the engine writes through
//! - Provide `BufferedResponse`, an in-memory sink the transport adapter
//!   converts into a native response
//!
//! # Design Decisions
//! - A sink is terminal once `end` is called; later writes are ignored
//! - JSON bodies always carry `application/json`

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::error::HttpError;

/// Where a dispatch writes its result.
pub trait ResponseSink: Send {
    /// Set the status code.
    fn status(&mut self, status: u16);

    /// Write `value` as a JSON body and end the response.
    fn json(&mut self, value: &Value);

    /// Write a raw body and end the response.
    fn send(&mut self, body: Vec<u8>);

    /// Set (replace) a header.
    fn header(&mut self, name: &str, value: &str);

    /// Finish the response without writing a body.
    fn end(&mut self);

    fn is_ended(&self) -> bool;

    fn status_code(&self) -> u16;

    /// Write a structured error as `{"error":{"status","message"}}` and end.
    fn error(&mut self, err: &HttpError) {
        let body = match serde_json::to_vec(&err.body()) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode error body");
                Vec::new()
            }
        };
        self.status(err.status);
        self.header(header::CONTENT_TYPE.as_str(), "application/json");
        self.send(body);
    }

    /// Redirect with `302 Found`.
    fn redirect(&mut self, location: &str) {
        self.status(302);
        self.header(header::LOCATION.as_str(), location);
        self.end();
    }
}

/// An in-memory response.
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    status: u16,
    headers: HeaderMap,
    body: Vec<u8>,
    ended: bool,
}

impl Default for BufferedResponse {
    fn default() -> Self {
        Self {
            status: 200,
            headers: HeaderMap::new(),
            body: Vec::new(),
            ended: false,
        }
    }
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    pub fn body_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    fn writable(&self) -> bool {
        if self.ended {
            tracing::warn!(status = self.status, "Ignoring write to an ended response");
        }
        !self.ended
    }
}

impl ResponseSink for BufferedResponse {
    fn status(&mut self, status: u16) {
        if self.writable() {
            self.status = status;
        }
    }

    fn json(&mut self, value: &Value) {
        if !self.writable() {
            return;
        }
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = value.to_string().into_bytes();
        self.ended = true;
    }

    fn send(&mut self, body: Vec<u8>) {
        if self.writable() {
            self.body = body;
            self.ended = true;
        }
    }

    fn header(&mut self, name: &str, value: &str) {
        if !self.writable() {
            return;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping invalid response header"),
        }
    }

    fn end(&mut self) {
        self.ended = true;
    }

    fn is_ended(&self) -> bool {
        self.ended
    }

    fn status_code(&self) -> u16 {
        self.status
    }
}

impl IntoResponse for BufferedResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response
    }
}
