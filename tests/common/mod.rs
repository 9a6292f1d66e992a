//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use futures_util::FutureExt;
use restful_api::{
    BufferedResponse, HandleOptions, HandlerFuture, Next, Outcome, Request, ResponseSink,
    RestfulApi,
};
use serde_json::{json, Value};

/// Ordered record of which handlers ran.
pub type CallLog = Arc<Mutex<Vec<&'static str>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<&'static str> {
    log.lock().unwrap().clone()
}

/// Middleware that records `name` and then returns `next`.
pub fn recording_middleware(
    log: &CallLog,
    name: &'static str,
    next: Next,
) -> impl for<'a> Fn(&'a Request, &'a mut dyn ResponseSink) -> HandlerFuture<'a, Next>
       + Send
       + Sync
       + 'static {
    let log = log.clone();
    move |_req, _res| {
        log.lock().unwrap().push(name);
        async move { Ok(next) }.boxed()
    }
}

/// Action that records `name` and returns `value`.
pub fn recording_action(
    log: &CallLog,
    name: &'static str,
    value: Value,
) -> impl for<'a> Fn(&'a Request, &'a mut dyn ResponseSink) -> HandlerFuture<'a, Value>
       + Send
       + Sync
       + 'static {
    let log = log.clone();
    move |_req, _res| {
        log.lock().unwrap().push(name);
        let value = value.clone();
        async move { Ok(value) }.boxed()
    }
}

pub fn hello<'a>(_req: &'a Request, _res: &'a mut dyn ResponseSink) -> HandlerFuture<'a, Value> {
    async { Ok(json!("Hello")) }.boxed()
}

/// Dispatch with default options and hand back the outcome and response.
pub async fn send(api: &RestfulApi, req: Request) -> (Outcome, BufferedResponse) {
    let mut res = BufferedResponse::new();
    let outcome = api
        .handle(&req, &mut res, HandleOptions::default())
        .await
        .expect("dispatch should not propagate an error");
    (outcome, res)
}
