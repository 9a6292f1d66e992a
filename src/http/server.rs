//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router wrapping a `RestfulApi`
//! - Wire up middleware (tracing, timeout, request ID)
//! - Convert native requests into engine requests and back
//! - Serve the API description on the configured info path
//! - Bind server to listener and stop on shutdown
//!
//! # Design Decisions
//! - A single fallback handler: all routing happens in the engine
//! - Errors the engine leaves unhandled become a bare 500 here, at the edge

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{Method, Request as HttpRequest, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::error::HttpError;
use crate::http::{BufferedResponse, Request, ResponseSink};
use crate::routing::{HandleOptions, Outcome, RestfulApi};

/// Application state injected into the fallback handler.
#[derive(Clone)]
pub struct AppState {
    pub api: Arc<RestfulApi>,
    pub options: HandleOptions,
    pub info_path: Option<String>,
    pub max_body_bytes: usize,
}

/// HTTP front end for a `RestfulApi`.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    pub fn new(config: ServerConfig, api: Arc<RestfulApi>) -> Self {
        let state = AppState {
            api,
            options: HandleOptions {
                send_404: config.dispatch.send_404,
            },
            info_path: config.dispatch.info_path.clone(),
            max_body_bytes: config.limits.max_body_bytes,
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        // Outermost first
        let middleware = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        Router::new()
            .fallback(dispatch_handler)
            .with_state(state)
            .layer(middleware)
    }

    /// The Axum router, for embedding or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Convert, dispatch, convert back.
async fn dispatch_handler(State(state): State<AppState>, request: HttpRequest<Body>) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();

    // 1. Introspection endpoint
    if let Some(info_path) = &state.info_path {
        if parts.method == Method::GET && path == *info_path {
            return Json(state.api.info()).into_response();
        }
    }

    // 2. Normalize
    let query = match Query::<HashMap<String, String>>::try_from_uri(&parts.uri) {
        Ok(Query(query)) => query,
        Err(e) => {
            tracing::debug!(request_id = %request_id, error = %e, "Rejected query string");
            return error_response(HttpError::bad_request("Invalid query string"));
        }
    };

    let bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(request_id = %request_id, error = %e, "Failed to read body");
            return error_response(HttpError::new(413, "Payload Too Large"));
        }
    };

    let body = if bytes.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(_) => return error_response(HttpError::bad_request("Invalid JSON body")),
        }
    };

    let req = Request::new(parts.method.as_str(), path)
        .with_query(query)
        .with_body(body)
        .with_headers(parts.headers);

    // 3. Dispatch
    let mut res = BufferedResponse::new();
    match state.api.handle(&req, &mut res, state.options).await {
        Ok(Outcome::Halted) if !res.is_ended() => {
            tracing::warn!(request_id = %request_id, path = %req.path(), "Middleware halted without ending the response");
        }
        Ok(Outcome::NotFound) if !res.is_ended() => {
            return StatusCode::NOT_FOUND.into_response();
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Request failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    res.into_response()
}

fn error_response(err: HttpError) -> Response {
    let status = StatusCode::from_u16(err.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err.body())).into_response()
}
