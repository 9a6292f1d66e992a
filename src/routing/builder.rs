//! Current-builder stack.
//!
//! While a build callback runs, the node it is building sits on top of a
//! thread-local stack so that helpers deep inside the callback can find
//! "the node I am inside" without threading it through every call.
//!
//! # Design Decisions
//! - Holds `NodeHandle`s (shared metadata), never the node itself
//! - Scoped by a drop guard: popped on return, early `?` and unwind
//! - Build-time only; dispatch never reads it

use std::cell::RefCell;

use crate::routing::context::NodeHandle;

thread_local! {
    static STACK: RefCell<Vec<NodeHandle>> = const { RefCell::new(Vec::new()) };
}

/// Handle of the innermost node currently being built on this thread.
pub fn current() -> Option<NodeHandle> {
    STACK.with(|stack| stack.borrow().last().cloned())
}

/// Number of nested builds in progress on this thread.
pub fn depth() -> usize {
    STACK.with(|stack| stack.borrow().len())
}

/// Keeps a node on the stack for as long as it lives.
pub(crate) struct BuildScope {
    _private: (),
}

impl BuildScope {
    pub(crate) fn enter(handle: NodeHandle) -> Self {
        STACK.with(|stack| stack.borrow_mut().push(handle));
        Self { _private: () }
    }
}

impl Drop for BuildScope {
    fn drop(&mut self) {
        STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
