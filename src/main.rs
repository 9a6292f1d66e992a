//! Reference server for the restful-api engine.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────────▶ axum (request id, timeout, trace)
//!                             │
//!                             ▼
//!                        RestfulApi::handle
//!                             │
//!              ┌──────────────┼───────────────┐
//!              ▼              ▼               ▼
//!          middleware    condition branch   action
//!                             │               │
//!                             └──── ... ──────┘
//!                                             ▼
//!     Client Response ◀──────────── BufferedResponse (JSON)
//! ```
//!
//! Serves a small demo API so the engine can be exercised end to end, and
//! prints its route description with `restful-api routes`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures_util::FutureExt;
use restful_api::config::{load_config, ServerConfig};
use restful_api::lifecycle::{signals, Shutdown};
use restful_api::observability::{logging, metrics};
use restful_api::routing::PathPattern;
use restful_api::{BuildError, HttpError, HttpServer, Next, RestfulApi, Route};
use serde_json::json;
use tokio::net::TcpListener;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "restful-api")]
#[command(about = "Serve or describe the demo API", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Print the route description as JSON
    Routes {
        /// Print tagged conditions (`map`) instead of `info`
        #[arg(long)]
        map: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    let api = demo_api()?;

    if let Some(Commands::Routes { map }) = cli.command {
        let description = if map {
            serde_json::to_string_pretty(&api.map())?
        } else {
            serde_json::to_string_pretty(&api.info())?
        };
        println!("{description}");
        return Ok(());
    }

    logging::init(&config.observability);
    tracing::info!("restful-api v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        send_404 = config.dispatch.send_404,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(signals::wait_for_shutdown(shutdown.clone()));

    let server = HttpServer::new(config, Arc::new(api));
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// A small API touching every kind of declaration.
fn demo_api() -> Result<RestfulApi, BuildError> {
    RestfulApi::build(|root| {
        root.description(["Demo API for the restful-api engine."]);

        root.get("/hello", |hello| {
            hello.description(["Says hello."]);
            hello.action(|_req, _res| async { Ok(json!("Hello")) }.boxed())?;
            Ok(())
        })?;

        root.any("/users", |users| {
            users.description(["In-memory user directory."]);

            users.get(PathPattern::new(r"/(?P<id>\d+)$", "")?, |user| {
                user.action(|req, _res| {
                    async move {
                        match req.param("id") {
                            Some("0") | None => Err(HttpError::not_found("No such user").into()),
                            Some(id) => Ok(json!({ "id": id, "name": format!("user-{id}") })),
                        }
                    }
                    .boxed()
                })?;
                Ok(())
            })?;

            users.post(Route::Any, |create| {
                create.action(|req, res| {
                    async move {
                        let Some(name) = req.body().get("name").and_then(|v| v.as_str()) else {
                            return Err(HttpError::bad_request("`name` is required").into());
                        };
                        let id = Uuid::new_v4();
                        res.header("Location", &format!("/users/{id}"));
                        let user = json!({ "id": id, "name": name });
                        res.status(201);
                        res.json(&user);
                        Ok(user)
                    }
                    .boxed()
                })?;
                Ok(())
            })?;

            users.get(Route::Any, |list| {
                list.action(|_req, _res| async { Ok(json!([{ "id": 1, "name": "user-1" }])) }.boxed())?;
                Ok(())
            })?;
            Ok(())
        })?;

        root.any("/admin", |admin| {
            let handle = admin.handle();
            admin.set_field_of(&handle, "auth", json!("bearer"))?;

            admin.middleware(|req, res| {
                async move {
                    if req.header("authorization").is_some() {
                        return Ok(Next::Continue);
                    }
                    res.error(&HttpError::unauthorized("Unauthorized"));
                    Ok(Next::Halt)
                }
                .boxed()
            });

            admin.get("/stats", |stats| {
                stats.action(|_req, _res| async { Ok(json!({ "uptime": "ok" })) }.boxed())?;
                Ok(())
            })?;
            Ok(())
        })?;

        Ok(())
    })
}
