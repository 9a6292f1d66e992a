//! Routing subsystem: the declarative dispatch engine.
//!
//! # Data Flow
//! ```text
//! Build time (once, synchronous):
//!     RestfulApi::build(|root| ...)
//!     → context.rs (when / get / post / middleware / action ...)
//!     → builder.rs (current node on a thread-local stack)
//!     → condition.rs (path, pattern, method, and)
//!     → immutable ContextNode tree
//!
//! Request time (many, concurrent):
//!     Request
//!     → dispatch.rs (collect levels, run middleware, run action)
//!     → ResponseSink (200 JSON, structured error, or 404)
//!
//! Tooling:
//!     ContextNode
//!     → reflection.rs (map / info)
//! ```
//!
//! # Design Decisions
//! - Tree built once, read-only afterwards (share via Arc)
//! - Declaration order is execution order
//! - First matching branch wins; no backtracking into siblings

pub mod api;
pub mod builder;
pub mod condition;
pub mod context;
pub mod dispatch;
pub mod reflection;

pub use api::{HandleOptions, RestfulApi};
pub use condition::{Condition, PathPattern};
pub use context::{ActionFn, ContextChild, ContextNode, HandlerFuture, MiddlewareFn, Next, NodeHandle, Route, Verb};
pub use dispatch::{Level, Outcome};
pub use reflection::{InfoEntry, MapEntry};
