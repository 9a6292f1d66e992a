//! Declarative routing and dispatch engine for JSON APIs.
//!
//! A `RestfulApi` is a static tree of conditions, middleware and actions,
//! built once and matched against many requests:
//!
//! ```no_run
//! use futures_util::FutureExt;
//! use restful_api::{HttpError, Next, RestfulApi, Route};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), restful_api::BuildError> {
//! let api = RestfulApi::build(|root| {
//!     root.middleware(|_req, _res| async { Ok(Next::Continue) }.boxed());
//!     root.get("/hello", |hello| {
//!         hello.action(|_req, _res| async { Ok(json!("Hello")) }.boxed())?;
//!         Ok(())
//!     })?;
//!     root.get(Route::Any, |any| {
//!         any.action(|_req, _res| async { Err(HttpError::not_found("nothing here").into()) }.boxed())?;
//!         Ok(())
//!     })?;
//!     Ok(())
//! })?;
//! # let _ = api;
//! # Ok(())
//! # }
//! ```

// Core engine
pub mod error;
pub mod http;
pub mod routing;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::ServerConfig;
pub use error::{BuildError, DispatchError, HttpError};
pub use http::{BufferedResponse, HttpServer, Request, ResponseSink};
pub use lifecycle::Shutdown;
pub use routing::{
    Condition, ContextNode, HandleOptions, HandlerFuture, Next, NodeHandle, Outcome, PathPattern,
    RestfulApi, Route, Verb,
};
