//! Top-level API object.
//!
//! # Responsibilities
//! - Run the root build callback with an empty current-builder stack
//! - Dispatch requests against the built tree (`handle`)
//! - Answer unmatched requests with a 404 unless told otherwise
//! - Record dispatch logs and metrics
//!
//! # Design Decisions
//! - Immutable after `build`; share it behind an `Arc` across requests
//! - Unrecognized handler errors are returned, not mapped to 500

use std::time::Instant;

use serde_json::json;

use crate::error::{BuildError, DispatchError};
use crate::http::{Request, ResponseSink};
use crate::observability::metrics;
use crate::routing::builder::{self, BuildScope};
use crate::routing::context::ContextNode;
use crate::routing::dispatch::Outcome;
use crate::routing::reflection::{InfoEntry, MapEntry};

/// Per-call dispatch options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleOptions {
    /// Write `{"error":"Not Found"}` with status 404 when nothing matched.
    pub send_404: bool,
}

impl Default for HandleOptions {
    fn default() -> Self {
        Self { send_404: true }
    }
}

/// A built route tree ready to serve requests.
#[derive(Debug)]
pub struct RestfulApi {
    root: ContextNode,
}

impl RestfulApi {
    /// Build the tree by running `build` against a fresh root node.
    pub fn build<F>(build: F) -> Result<Self, BuildError>
    where
        F: FnOnce(&mut ContextNode) -> Result<(), BuildError>,
    {
        if builder::depth() != 0 {
            return Err(BuildError::BuilderActive);
        }

        let mut root = ContextNode::new();
        {
            let _scope = BuildScope::enter(root.handle());
            build(&mut root)?;
        }
        debug_assert_eq!(builder::depth(), 0);

        tracing::debug!(branches = root.branches().count(), "API built");
        Ok(Self { root })
    }

    /// Wrap a node that was built by hand.
    pub fn from_root(root: ContextNode) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &ContextNode {
        &self.root
    }

    /// Dispatch `req`, writing the result to `res`.
    pub async fn handle(
        &self,
        req: &Request,
        res: &mut dyn ResponseSink,
        options: HandleOptions,
    ) -> Result<Outcome, DispatchError> {
        let start = Instant::now();

        let result = match self.root.dispatch(req, res).await {
            Ok(Outcome::NotFound) if options.send_404 => {
                res.status(404);
                res.json(&json!({ "error": "Not Found" }));
                Ok(Outcome::NotFound)
            }
            other => other,
        };

        match &result {
            Ok(outcome) => {
                tracing::debug!(
                    method = %req.method(),
                    path = %req.path(),
                    outcome = outcome.label(),
                    status = res.status_code(),
                    "Request dispatched"
                );
                metrics::record_dispatch(req.method(), outcome.label(), start);
            }
            Err(err) => {
                tracing::error!(
                    method = %req.method(),
                    path = %req.path(),
                    error = %err,
                    "Unhandled error during dispatch"
                );
                metrics::record_dispatch(req.method(), "error", start);
            }
        }

        result
    }

    pub fn map(&self) -> Vec<MapEntry> {
        self.root.map()
    }

    pub fn info(&self) -> Vec<InfoEntry> {
        self.root.info()
    }
}
