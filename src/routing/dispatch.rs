//! Request-time walk of the context tree.
//!
//! # Responsibilities
//! - Collect the stack of levels a request will run through
//! - Run middleware and the terminal action in declaration order
//! - Turn structured errors into responses
//!
//! # Design Decisions
//! - Collection is pure; nothing runs until the whole stack is known
//! - A level ends at the first matching branch, which opens the next level
//! - A middleware gates everything declared after it via `Next`
//! - Only `HttpError` is written; other failures go back to the caller
//! - No timeouts: a middleware that never resolves stalls only its request

use std::borrow::Cow;
use std::sync::Arc;

use crate::error::DispatchError;
use crate::http::{Request, ResponseSink};
use crate::routing::context::{ContextChild, ContextNode, Next};

/// Children of one node that will run, and the request they see.
#[derive(Debug)]
pub struct Level<'n> {
    pub request: Arc<Request>,
    pub children: Vec<&'n ContextChild>,
}

/// How a dispatch finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// An action ran.
    Handled,
    /// A middleware stopped the chain.
    Halted,
    /// A structured error was written with this status.
    Failed(u16),
    /// Nothing terminal ran.
    NotFound,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Handled => "handled",
            Outcome::Halted => "halted",
            Outcome::Failed(_) => "failed",
            Outcome::NotFound => "not_found",
        }
    }
}

impl ContextNode {
    /// Levels a dispatch of `req` would run, without running anything.
    ///
    /// Each level holds the node's children up to and including the first
    /// branch whose condition matches; branches that do not match are left
    /// out. The matched branch's node forms the next level and sees the
    /// request as transformed by every condition above it.
    pub fn context_stack(&self, req: &Request) -> Vec<Level<'_>> {
        let mut levels = Vec::new();
        let mut node = self;
        let mut request = Arc::new(req.clone());

        loop {
            let mut children = Vec::new();
            let mut descend = None;

            for child in node.children() {
                match child {
                    ContextChild::Condition { condition, context } => {
                        if !condition.applies_to(&request) {
                            continue;
                        }
                        let sub = match condition.derive_sub_request(&request) {
                            Cow::Owned(sub) => Arc::new(sub),
                            Cow::Borrowed(_) => Arc::clone(&request),
                        };
                        children.push(child);
                        descend = Some((context, sub));
                        break;
                    }
                    _ => children.push(child),
                }
            }

            levels.push(Level {
                request: Arc::clone(&request),
                children,
            });

            match descend {
                Some((context, sub)) => {
                    node = context;
                    request = sub;
                }
                None => break,
            }
        }

        levels
    }

    /// Run the tree against `req`, writing to `res`.
    ///
    /// An `HttpError` raised anywhere aborts the remaining stack and is
    /// written as `{"error":{"status","message"}}`. Any other error is
    /// returned untouched.
    pub async fn dispatch(
        &self,
        req: &Request,
        res: &mut dyn ResponseSink,
    ) -> Result<Outcome, DispatchError> {
        let levels = self.context_stack(req);
        tracing::trace!(path = %req.path(), depth = levels.len(), "Collected context stack");

        match run_stack(&levels, res).await {
            Ok(outcome) => Ok(outcome),
            Err(DispatchError::Http(err)) => {
                tracing::warn!(status = err.status, message = %err.message, "Handler raised HTTP error");
                res.error(&err);
                Ok(Outcome::Failed(err.status))
            }
            Err(err) => Err(err),
        }
    }
}

async fn run_stack(levels: &[Level<'_>], res: &mut dyn ResponseSink) -> Result<Outcome, DispatchError> {
    for level in levels {
        for child in &level.children {
            match child {
                ContextChild::Middleware(middleware) => {
                    if middleware(level.request.as_ref(), &mut *res).await? == Next::Halt {
                        return Ok(Outcome::Halted);
                    }
                }
                ContextChild::Action(action) => {
                    let value = action(level.request.as_ref(), &mut *res).await?;
                    if !res.is_ended() {
                        res.status(200);
                        res.json(&value);
                    }
                    return Ok(Outcome::Handled);
                }
                // Matched branch: its children are the next level
                ContextChild::Condition { .. } => {}
            }
        }
    }
    Ok(Outcome::NotFound)
}
