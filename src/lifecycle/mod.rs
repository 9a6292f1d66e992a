//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → HttpServer stops accepting → in-flight requests drain → exit
//! ```
//!
//! # Design Decisions
//! - One broadcast channel, any number of subscribers
//! - The route tree needs no teardown: it is dropped with the server

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
