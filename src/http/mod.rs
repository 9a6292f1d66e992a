//! HTTP boundary of the engine.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, tracing)
//!     → request.rs (normalized Request: method, path, query, body, headers)
//!     → [routing engine dispatches]
//!     → response.rs (BufferedResponse → native response)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::Request;
pub use response::{BufferedResponse, ResponseSink};
pub use server::{AppState, HttpServer};
