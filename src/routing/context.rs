//! Context tree and its build DSL.
//!
//! # Responsibilities
//! - Hold a node's ordered children (condition branch, middleware, action)
//! - Offer the declarative build operations (`when`, verb sugar, `action`, ...)
//! - Keep per-node data, introspection fields and description lines
//!
//! # Design Decisions
//! - Nested callbacks receive the child node explicitly (`&mut ContextNode`)
//! - The shape of the tree is fixed before any request is dispatched
//! - At most one action per node
//! - Fields and descriptions live behind a `NodeHandle` so cross-cutting
//!   producers can annotate a node other than the one they are building

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use serde_json::{Map, Value};

use crate::error::{BuildError, DispatchError};
use crate::http::{Request, ResponseSink};
use crate::routing::builder::BuildScope;
use crate::routing::condition::{Condition, PathPattern};

/// Future returned by middleware and actions.
pub type HandlerFuture<'a, T> = BoxFuture<'a, Result<T, DispatchError>>;

/// `(request, response) -> Continue | Halt`, or an error.
pub type MiddlewareFn =
    dyn for<'a> Fn(&'a Request, &'a mut dyn ResponseSink) -> HandlerFuture<'a, Next> + Send + Sync;

/// `(request, response) -> value`, written as a 200 JSON body.
pub type ActionFn =
    dyn for<'a> Fn(&'a Request, &'a mut dyn ResponseSink) -> HandlerFuture<'a, Value> + Send + Sync;

/// What a middleware decided.
///
/// Returning `Err` is the equivalent of passing an error to `next`; returning
/// `Continue` after handling a problem is the equivalent of `next(true)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// Run the following children.
    Continue,
    /// Stop here. Nothing declared after this middleware runs.
    Halt,
}

/// One child of a context node.
pub enum ContextChild {
    /// Entered when the condition matches, with the derived sub-request.
    Condition {
        condition: Condition,
        context: ContextNode,
    },
    Middleware(Arc<MiddlewareFn>),
    Action(Arc<ActionFn>),
}

impl fmt::Debug for ContextChild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextChild::Condition { condition, context } => f
                .debug_struct("Condition")
                .field("condition", condition)
                .field("context", context)
                .finish(),
            ContextChild::Middleware(_) => f.write_str("Middleware"),
            ContextChild::Action(_) => f.write_str("Action"),
        }
    }
}

/// Shared metadata of a node: introspection fields and description lines.
#[derive(Debug, Default)]
struct NodeMeta {
    fields: DashMap<String, Value>,
    description: RwLock<Vec<String>>,
}

/// Cheap reference to a node's metadata, usable after the node moved.
#[derive(Debug, Clone, Default)]
pub struct NodeHandle {
    meta: Arc<NodeMeta>,
}

impl NodeHandle {
    pub fn field(&self, name: &str) -> Option<Value> {
        self.meta.fields.get(name).map(|v| v.value().clone())
    }

    pub fn set_field(&self, name: &str, value: Value) -> Result<(), BuildError> {
        if name.is_empty() {
            return Err(BuildError::InvalidArguments("field name must not be empty".into()));
        }
        self.meta.fields.insert(name.to_string(), value);
        Ok(())
    }

    /// All fields, sorted by name.
    pub fn fields(&self) -> Map<String, Value> {
        self.meta
            .fields
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn description(&self) -> Vec<String> {
        self.meta
            .description
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push_description(&self, lines: impl IntoIterator<Item = String>) {
        self.meta
            .description
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(lines);
    }

    /// Whether both handles refer to the same node.
    pub fn same_node(&self, other: &NodeHandle) -> bool {
        Arc::ptr_eq(&self.meta, &other.meta)
    }
}

/// Where a route declaration matches.
#[derive(Debug, Clone)]
pub enum Route {
    /// No path constraint.
    Any,
    /// Literal path prefix.
    Path(String),
    /// Pattern anchored at the start of the path.
    Pattern(PathPattern),
}

impl Route {
    fn into_condition(self) -> Option<Condition> {
        match self {
            Route::Any => None,
            Route::Path(path) => Some(Condition::Path(path)),
            Route::Pattern(pattern) => Some(Condition::PathPattern(pattern)),
        }
    }
}

impl From<&str> for Route {
    fn from(path: &str) -> Self {
        Route::Path(path.to_string())
    }
}

impl From<String> for Route {
    fn from(path: String) -> Self {
        Route::Path(path)
    }
}

impl From<PathPattern> for Route {
    fn from(pattern: PathPattern) -> Self {
        Route::Pattern(pattern)
    }
}

/// HTTP verbs with build sugar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Verb {
    pub const ALL: [Verb; 7] = [
        Verb::Get,
        Verb::Post,
        Verb::Put,
        Verb::Patch,
        Verb::Delete,
        Verb::Head,
        Verb::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Post => "post",
            Verb::Put => "put",
            Verb::Patch => "patch",
            Verb::Delete => "delete",
            Verb::Head => "head",
            Verb::Options => "options",
        }
    }
}

impl FromStr for Verb {
    type Err = BuildError;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL
            .into_iter()
            .find(|verb| verb.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| BuildError::InvalidArguments(format!("`{s}` has no verb sugar")))
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of the dispatch tree.
#[derive(Debug, Default)]
pub struct ContextNode {
    children: Vec<ContextChild>,
    data: HashMap<String, Value>,
    handle: NodeHandle,
}

impl ContextNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn children(&self) -> &[ContextChild] {
        &self.children
    }

    /// Handle to this node's fields and description.
    pub fn handle(&self) -> NodeHandle {
        self.handle.clone()
    }

    pub fn has_action(&self) -> bool {
        self.children
            .iter()
            .any(|child| matches!(child, ContextChild::Action(_)))
    }

    /// Condition branches in declaration order.
    pub fn branches(&self) -> impl Iterator<Item = (&Condition, &ContextNode)> {
        self.children.iter().filter_map(|child| match child {
            ContextChild::Condition { condition, context } => Some((condition, context)),
            _ => None,
        })
    }

    /// Add a branch guarded by `condition` and build it right away.
    pub fn when<F>(&mut self, condition: Condition, build: F) -> Result<&mut Self, BuildError>
    where
        F: FnOnce(&mut ContextNode) -> Result<(), BuildError>,
    {
        let mut context = ContextNode::new();
        {
            let _scope = BuildScope::enter(context.handle());
            build(&mut context)?;
        }
        self.children.push(ContextChild::Condition { condition, context });
        Ok(self)
    }

    /// Branch on a path prefix or pattern. `Route::Any` always matches.
    pub fn route<R, F>(&mut self, route: R, build: F) -> Result<&mut Self, BuildError>
    where
        R: Into<Route>,
        F: FnOnce(&mut ContextNode) -> Result<(), BuildError>,
    {
        let condition = route
            .into()
            .into_condition()
            .unwrap_or(Condition::And(Vec::new()));
        self.when(condition, build)
    }

    /// Alias of [`ContextNode::route`].
    pub fn any<R, F>(&mut self, route: R, build: F) -> Result<&mut Self, BuildError>
    where
        R: Into<Route>,
        F: FnOnce(&mut ContextNode) -> Result<(), BuildError>,
    {
        self.route(route, build)
    }

    /// Branch on a verb, optionally combined with a path or pattern.
    pub fn method<R, F>(&mut self, verb: Verb, route: R, build: F) -> Result<&mut Self, BuildError>
    where
        R: Into<Route>,
        F: FnOnce(&mut ContextNode) -> Result<(), BuildError>,
    {
        self.when(verb_condition(verb.as_str(), route.into()), build)
    }

    /// Branch on an arbitrary method name such as `PURGE`.
    pub fn on<R, F>(&mut self, method: &str, route: R, build: F) -> Result<&mut Self, BuildError>
    where
        R: Into<Route>,
        F: FnOnce(&mut ContextNode) -> Result<(), BuildError>,
    {
        if method.is_empty() || !method.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(BuildError::InvalidArguments(format!(
                "`{method}` is not a method name"
            )));
        }
        self.when(verb_condition(method, route.into()), build)
    }

    pub fn get<R, F>(&mut self, route: R, build: F) -> Result<&mut Self, BuildError>
    where
        R: Into<Route>,
        F: FnOnce(&mut ContextNode) -> Result<(), BuildError>,
    {
        self.method(Verb::Get, route, build)
    }

    pub fn post<R, F>(&mut self, route: R, build: F) -> Result<&mut Self, BuildError>
    where
        R: Into<Route>,
        F: FnOnce(&mut ContextNode) -> Result<(), BuildError>,
    {
        self.method(Verb::Post, route, build)
    }

    pub fn put<R, F>(&mut self, route: R, build: F) -> Result<&mut Self, BuildError>
    where
        R: Into<Route>,
        F: FnOnce(&mut ContextNode) -> Result<(), BuildError>,
    {
        self.method(Verb::Put, route, build)
    }

    pub fn patch<R, F>(&mut self, route: R, build: F) -> Result<&mut Self, BuildError>
    where
        R: Into<Route>,
        F: FnOnce(&mut ContextNode) -> Result<(), BuildError>,
    {
        self.method(Verb::Patch, route, build)
    }

    pub fn delete<R, F>(&mut self, route: R, build: F) -> Result<&mut Self, BuildError>
    where
        R: Into<Route>,
        F: FnOnce(&mut ContextNode) -> Result<(), BuildError>,
    {
        self.method(Verb::Delete, route, build)
    }

    pub fn head<R, F>(&mut self, route: R, build: F) -> Result<&mut Self, BuildError>
    where
        R: Into<Route>,
        F: FnOnce(&mut ContextNode) -> Result<(), BuildError>,
    {
        self.method(Verb::Head, route, build)
    }

    pub fn options<R, F>(&mut self, route: R, build: F) -> Result<&mut Self, BuildError>
    where
        R: Into<Route>,
        F: FnOnce(&mut ContextNode) -> Result<(), BuildError>,
    {
        self.method(Verb::Options, route, build)
    }

    /// Append a middleware.
    pub fn middleware<F>(&mut self, middleware: F) -> &mut Self
    where
        F: for<'a> Fn(&'a Request, &'a mut dyn ResponseSink) -> HandlerFuture<'a, Next>
            + Send
            + Sync
            + 'static,
    {
        self.children.push(ContextChild::Middleware(Arc::new(middleware)));
        self
    }

    /// Set the terminal action of this node.
    pub fn action<F>(&mut self, action: F) -> Result<&mut Self, BuildError>
    where
        F: for<'a> Fn(&'a Request, &'a mut dyn ResponseSink) -> HandlerFuture<'a, Value>
            + Send
            + Sync
            + 'static,
    {
        if self.has_action() {
            return Err(BuildError::DuplicateAction);
        }
        self.children.push(ContextChild::Action(Arc::new(action)));
        Ok(self)
    }

    pub fn data(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// The whole data store.
    pub fn data_map(&self) -> &HashMap<String, Value> {
        &self.data
    }

    pub fn set_data(&mut self, key: &str, value: Value) -> Result<&mut Self, BuildError> {
        if key.is_empty() {
            return Err(BuildError::InvalidArguments("data key must not be empty".into()));
        }
        self.data.insert(key.to_string(), value);
        Ok(self)
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.handle.field(name)
    }

    pub fn set_field(&mut self, name: &str, value: Value) -> Result<&mut Self, BuildError> {
        self.handle.set_field(name, value)?;
        Ok(self)
    }

    /// Read a field of another node.
    pub fn field_of(&self, node: &NodeHandle, name: &str) -> Option<Value> {
        node.field(name)
    }

    /// Write a field on another node.
    pub fn set_field_of(
        &mut self,
        node: &NodeHandle,
        name: &str,
        value: Value,
    ) -> Result<&mut Self, BuildError> {
        node.set_field(name, value)?;
        Ok(self)
    }

    /// Append human-readable description lines.
    pub fn description<I, S>(&mut self, lines: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.handle.push_description(lines.into_iter().map(Into::into));
        self
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.handle.description()
    }

    /// Description lines of another node. Read-only.
    pub fn description_of(&self, node: &NodeHandle) -> Vec<String> {
        node.description()
    }
}

fn verb_condition(method: &str, route: Route) -> Condition {
    let method = Condition::method(method);
    match route.into_condition() {
        Some(path) => method.and(path),
        None => method,
    }
}
