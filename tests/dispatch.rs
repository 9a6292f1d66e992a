//! Dispatch behaviour of a built API.

use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use restful_api::routing::PathPattern;
use restful_api::{
    BufferedResponse, DispatchError, HandleOptions, HttpError, Next, Outcome, Request,
    ResponseSink, RestfulApi, Route,
};
use serde_json::json;

mod common;

use common::{call_log, calls, hello, recording_action, recording_middleware, send};

#[tokio::test]
async fn test_get_action_returns_json() {
    let api = RestfulApi::build(|root| {
        root.get("/test", |test| {
            test.action(hello)?;
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    let (outcome, res) = send(&api, Request::new("GET", "/test")).await;

    assert_eq!(outcome, Outcome::Handled);
    assert_eq!(res.status_code(), 200);
    assert_eq!(res.headers()["content-type"], "application/json");
    // A bare string is JSON-encoded, quotes included
    assert_eq!(res.body_text(), r#""Hello""#);
}

#[tokio::test]
async fn test_unmatched_request_gets_404() {
    let api = RestfulApi::build(|root| {
        root.get("/test", |test| {
            test.action(hello)?;
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    let (outcome, res) = send(&api, Request::new("GET", "/other")).await;
    assert_eq!(outcome, Outcome::NotFound);
    assert_eq!(res.status_code(), 404);
    assert_eq!(res.body_json().unwrap(), json!({"error": "Not Found"}));

    // Method mismatch is also unmatched
    let (outcome, _) = send(&api, Request::new("POST", "/test")).await;
    assert_eq!(outcome, Outcome::NotFound);
}

#[tokio::test]
async fn test_send_404_disabled_leaves_response_untouched() {
    let api = RestfulApi::build(|_| Ok(())).unwrap();
    let mut res = BufferedResponse::new();

    let outcome = api
        .handle(
            &Request::new("GET", "/"),
            &mut res,
            HandleOptions { send_404: false },
        )
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::NotFound);
    assert!(!res.is_ended());
    assert!(res.body().is_empty());
}

#[tokio::test]
async fn test_http_error_from_action() {
    let api = RestfulApi::build(|root| {
        root.get("/test", |test| {
            test.action(|_req, _res| async { Err(HttpError::not_found("test").into()) }.boxed())?;
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    let (outcome, res) = send(&api, Request::new("GET", "/test")).await;

    assert_eq!(outcome, Outcome::Failed(404));
    assert_eq!(res.status_code(), 404);
    assert_eq!(
        res.body_json().unwrap(),
        json!({"error": {"status": 404, "message": "test"}})
    );
}

#[tokio::test]
async fn test_halting_middleware_blocks_everything_after_it() {
    let log = call_log();
    let api = RestfulApi::build(|root| {
        root.middleware(recording_middleware(&log, "first", Next::Continue));
        root.middleware(recording_middleware(&log, "gate", Next::Halt));
        root.middleware(recording_middleware(&log, "after", Next::Continue));
        root.get("/x", |x| {
            x.middleware(recording_middleware(&log, "branch", Next::Continue));
            x.action(recording_action(&log, "action", json!(1)))?;
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    let (outcome, res) = send(&api, Request::new("GET", "/x")).await;

    assert_eq!(outcome, Outcome::Halted);
    assert_eq!(calls(&log), ["first", "gate"]);
    assert!(!res.is_ended());
}

#[tokio::test]
async fn test_middleware_runs_in_declaration_order_across_levels() {
    let log = call_log();
    let api = RestfulApi::build(|root| {
        root.middleware(recording_middleware(&log, "root", Next::Continue));
        root.any("/api", |api| {
            api.middleware(recording_middleware(&log, "api", Next::Continue));
            api.get("/users", |users| {
                users.middleware(recording_middleware(&log, "users", Next::Continue));
                users.action(recording_action(&log, "list", json!([])))?;
                Ok(())
            })?;
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    let (outcome, _) = send(&api, Request::new("GET", "/api/users")).await;

    assert_eq!(outcome, Outcome::Handled);
    assert_eq!(calls(&log), ["root", "api", "users", "list"]);
}

#[tokio::test]
async fn test_first_matching_branch_wins() {
    let log = call_log();
    let api = RestfulApi::build(|root| {
        root.get("/dup", |first| {
            first.action(recording_action(&log, "first", json!("first")))?;
            Ok(())
        })?;
        root.get("/dup", |second| {
            second.action(recording_action(&log, "second", json!("second")))?;
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    let (_, res) = send(&api, Request::new("GET", "/dup")).await;

    assert_eq!(res.body_json().unwrap(), json!("first"));
    assert_eq!(calls(&log), ["first"]);
}

#[tokio::test]
async fn test_action_is_terminal_for_outer_levels() {
    let log = call_log();
    let api = RestfulApi::build(|root| {
        root.any("/a", |a| {
            a.action(recording_action(&log, "inner", json!("inner")))?;
            Ok(())
        })?;
        root.middleware(recording_middleware(&log, "late", Next::Continue));
        Ok(())
    })
    .unwrap();

    let (_, res) = send(&api, Request::new("GET", "/a")).await;
    assert_eq!(res.body_json().unwrap(), json!("inner"));
    assert_eq!(calls(&log), ["inner"]);

    // Without a match the root level runs to the end
    let (outcome, _) = send(&api, Request::new("GET", "/b")).await;
    assert_eq!(outcome, Outcome::NotFound);
    assert_eq!(calls(&log), ["inner", "late"]);
}

#[tokio::test]
async fn test_middleware_error_aborts_stack() {
    let log = call_log();
    let api = RestfulApi::build(|root| {
        root.middleware(|req, _res| {
            async move {
                match req.header("authorization") {
                    Some(_) => Ok(Next::Continue),
                    None => Err(HttpError::unauthorized("Missing token").into()),
                }
            }
            .boxed()
        });
        root.get("/me", |me| {
            me.action(recording_action(&log, "me", json!({"id": 1})))?;
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    let (outcome, res) = send(&api, Request::new("GET", "/me")).await;
    assert_eq!(outcome, Outcome::Failed(401));
    assert_eq!(
        res.body_json().unwrap(),
        json!({"error": {"status": 401, "message": "Missing token"}})
    );
    assert!(calls(&log).is_empty());

    let (outcome, res) = send(
        &api,
        Request::new("GET", "/me").with_header("Authorization", "Bearer t"),
    )
    .await;
    assert_eq!(outcome, Outcome::Handled);
    assert_eq!(res.body_json().unwrap(), json!({"id": 1}));
}

#[tokio::test]
async fn test_recovering_middleware_continues() {
    let api = RestfulApi::build(|root| {
        // Handles its own problem and lets the chain go on
        root.middleware(|_req, res| {
            async move {
                res.header("X-Recovered", "true");
                Ok(Next::Continue)
            }
            .boxed()
        });
        root.get("/ok", |ok| {
            ok.action(hello)?;
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    let (outcome, res) = send(&api, Request::new("GET", "/ok")).await;
    assert_eq!(outcome, Outcome::Handled);
    assert_eq!(res.headers()["x-recovered"], "true");
}

#[tokio::test]
async fn test_unrecognized_error_propagates() {
    let api = RestfulApi::build(|root| {
        root.get("/boom", |boom| {
            boom.action(|_req, _res| async { Err(DispatchError::other("database unreachable")) }.boxed())?;
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    let mut res = BufferedResponse::new();
    let result = api
        .handle(&Request::new("GET", "/boom"), &mut res, HandleOptions::default())
        .await;

    let err = result.unwrap_err();
    assert!(err.as_http().is_none());
    assert_eq!(err.to_string(), "database unreachable");
    assert!(!res.is_ended());
}

#[tokio::test]
async fn test_action_may_write_its_own_response() {
    let api = RestfulApi::build(|root| {
        root.post("/items", |items| {
            items.action(|_req, res| {
                async move {
                    res.status(201);
                    res.json(&json!({"created": true}));
                    Ok(json!("ignored"))
                }
                .boxed()
            })?;
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    let (outcome, res) = send(&api, Request::new("POST", "/items")).await;
    assert_eq!(outcome, Outcome::Handled);
    assert_eq!(res.status_code(), 201);
    assert_eq!(res.body_json().unwrap(), json!({"created": true}));
}

#[tokio::test]
async fn test_actions_see_transformed_request() {
    let api = RestfulApi::build(|root| {
        root.any(PathPattern::new(r"/v(?P<version>\d+)", "")?, |versioned| {
            versioned.get("/items", |items| {
                items.action(|req, _res| {
                    async move {
                        Ok(json!({
                            "path": req.path(),
                            "version": req.param("version"),
                            "query": req.query().get("page"),
                        }))
                    }
                    .boxed()
                })?;
                Ok(())
            })?;
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    let query = [("page".to_string(), "3".to_string())].into_iter().collect();
    let (_, res) = send(&api, Request::new("GET", "/v2/items").with_query(query)).await;

    assert_eq!(
        res.body_json().unwrap(),
        json!({"path": "/", "version": "2", "query": "3"})
    );
}

#[tokio::test]
async fn test_anonymous_method_branch() {
    let api = RestfulApi::build(|root| {
        root.get(Route::Any, |get| {
            get.any("/test", |test| {
                test.action(hello)?;
                Ok(())
            })?;
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    let (outcome, res) = send(&api, Request::new("get", "/test")).await;
    assert_eq!(outcome, Outcome::Handled);
    assert_eq!(res.body_json().unwrap(), json!("Hello"));
}

#[tokio::test]
async fn test_concurrent_dispatches_are_independent() {
    let api = Arc::new(
        RestfulApi::build(|root| {
            root.get(PathPattern::new(r"/echo/(?P<n>\d+)", "")?, |echo| {
                echo.middleware(|req, _res| {
                    async move {
                        // Interleave requests at a suspension point
                        let n: u64 = req.param("n").and_then(|n| n.parse().ok()).unwrap_or(0);
                        tokio::time::sleep(Duration::from_millis(n % 5)).await;
                        Ok(Next::Continue)
                    }
                    .boxed()
                });
                echo.action(|req, _res| async move { Ok(json!(req.param("n"))) }.boxed())?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap(),
    );

    let tasks: Vec<_> = (0..32)
        .map(|n| {
            let api = Arc::clone(&api);
            tokio::spawn(async move {
                let mut res = BufferedResponse::new();
                let req = Request::new("GET", format!("/echo/{n}"));
                api.handle(&req, &mut res, HandleOptions::default()).await.unwrap();
                (n, res.body_json().unwrap())
            })
        })
        .collect();

    for task in tasks {
        let (n, body) = task.await.unwrap();
        assert_eq!(body, json!(n.to_string()));
    }
}

#[tokio::test]
async fn test_stalled_middleware_only_stalls_its_request() {
    let api = Arc::new(
        RestfulApi::build(|root| {
            root.get("/stuck", |stuck| {
                stuck.middleware(|_req, _res| std::future::pending().boxed());
                stuck.action(hello)?;
                Ok(())
            })?;
            root.get("/fine", |fine| {
                fine.action(hello)?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap(),
    );

    let stuck_api = Arc::clone(&api);
    let stuck = tokio::spawn(async move {
        let mut res = BufferedResponse::new();
        stuck_api
            .handle(&Request::new("GET", "/stuck"), &mut res, HandleOptions::default())
            .await
    });

    let (outcome, res) = send(&api, Request::new("GET", "/fine")).await;
    assert_eq!(outcome, Outcome::Handled);
    assert_eq!(res.status_code(), 200);

    let waited = tokio::time::timeout(Duration::from_millis(50), stuck).await;
    assert!(waited.is_err(), "stalled dispatch must not complete");
}
