//! `/batch` fan-out, transactions and conflict retries.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use strata_auth_core::{ErrorCode, InMemorySessionStore, PlatformError};
use strata_rest_controller::{
    BatchItem, ControllerConfig, ControllerError, ControllerResult, InMemoryDatabase, Method,
    NetworkClient, RequestOptions, RestController, RouteResponse, RouteTable, SessionId,
    SessionStats,
};
use url::Url;

struct NoNetwork;

#[async_trait]
impl NetworkClient for NoNetwork {
    async fn request(
        &self,
        method: &Method,
        path: &str,
        _body: Value,
        _options: &RequestOptions,
    ) -> ControllerResult<Value> {
        Err(PlatformError::other_cause(format!("unexpected network call {method} {path}")).into())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn controller(routes: RouteTable, database: InMemoryDatabase) -> RestController {
    init_tracing();
    RestController::new(
        ControllerConfig::new("app-1", Url::parse("https://api.example.com/parse").unwrap()),
        Arc::new(database),
        Arc::new(InMemorySessionStore::new()),
        Arc::new(routes),
        Arc::new(NoNetwork),
    )
}

fn ok_route(table: RouteTable, path: &str, object_id: &'static str) -> RouteTable {
    table.route(Method::POST, path, move |_| async move {
        Ok(RouteResponse::created(json!({ "objectId": object_id })))
    })
}

fn batch(paths: &[&str]) -> Value {
    let requests: Vec<Value> = paths
        .iter()
        .map(|path| json!({ "method": "POST", "path": path, "body": { "v": 1 } }))
        .collect();
    json!({ "requests": requests })
}

fn transactional() -> RequestOptions {
    RequestOptions::builder().transaction(true).build()
}

#[tokio::test]
async fn test_failed_operation_aborts_transaction() {
    let routes = ok_route(RouteTable::new(), "/classes/A", "a1").route(
        Method::POST,
        "/classes/B",
        |_| async move { Err(PlatformError::new(ErrorCode(137), "Duplicate value")) },
    );
    let database = InMemoryDatabase::new();
    let controller = controller(routes, database.clone());

    let err = controller
        .handle_request(
            Method::POST,
            "/parse/batch",
            batch(&["/parse/classes/A", "/parse/classes/B"]),
            transactional(),
        )
        .await
        .unwrap_err();

    let ControllerError::BatchAborted(items) = err else {
        panic!("expected an aborted batch");
    };
    assert_eq!(
        items,
        vec![
            BatchItem::success(json!({ "objectId": "a1" })),
            BatchItem::error(PlatformError::new(ErrorCode(137), "Duplicate value")),
        ]
    );
    assert_eq!(
        database.stats().await,
        SessionStats {
            created: 1,
            committed: 0,
            aborted: 1
        }
    );
    assert_eq!(database.open_sessions().await, 0);
}

#[tokio::test]
async fn test_successful_transaction_commits_once() {
    let routes = ok_route(ok_route(RouteTable::new(), "/classes/A", "a1"), "/classes/B", "b1");
    let database = InMemoryDatabase::new();
    let controller = controller(routes, database.clone());

    let response = controller
        .handle_request(
            Method::POST,
            "/batch",
            batch(&["/classes/A", "/classes/B"]),
            transactional(),
        )
        .await
        .unwrap();
    assert_eq!(
        response,
        json!([
            { "success": { "objectId": "a1" } },
            { "success": { "objectId": "b1" } }
        ])
    );
    assert_eq!(
        database.stats().await,
        SessionStats {
            created: 1,
            committed: 1,
            aborted: 0
        }
    );
}

#[tokio::test]
async fn test_conflicts_retry_on_fresh_sessions_until_success() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::<Option<SessionId>>::new()));
    let (counter, sessions) = (calls.clone(), seen.clone());
    let routes = RouteTable::new().route(Method::POST, "/classes/Counter", move |request| {
        let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
        sessions.lock().unwrap().push(request.transaction);
        async move {
            if attempt < 5 {
                Err(PlatformError::transaction_conflict("Write conflict"))
            } else {
                Ok(RouteResponse::ok(json!({ "attempt": attempt })))
            }
        }
    });
    let database = InMemoryDatabase::new();
    let controller = controller(routes, database.clone());

    let response = controller
        .handle_request(Method::POST, "/batch", batch(&["/classes/Counter"]), transactional())
        .await
        .unwrap();
    assert_eq!(response, json!([{ "success": { "attempt": 5 } }]));

    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(
        database.stats().await,
        SessionStats {
            created: 5,
            committed: 1,
            aborted: 4
        }
    );

    let seen = seen.lock().unwrap().clone();
    assert!(seen.iter().all(Option::is_some));
    let mut distinct = seen.clone();
    distinct.dedup();
    assert_eq!(distinct.len(), 5, "every attempt must use its own session");
}

#[tokio::test]
async fn test_conflicts_on_every_attempt_propagate() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let routes = ok_route(RouteTable::new(), "/classes/A", "a1").route(
        Method::POST,
        "/classes/Counter",
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Err(PlatformError::transaction_conflict("Write conflict")) }
        },
    );
    let database = InMemoryDatabase::new();
    let controller = controller(routes, database.clone());

    let err = controller
        .handle_request(
            Method::POST,
            "/batch",
            batch(&["/classes/A", "/classes/Counter"]),
            transactional(),
        )
        .await
        .unwrap_err();

    let ControllerError::BatchAborted(items) = err else {
        panic!("expected an aborted batch");
    };
    assert_eq!(items.len(), 2);
    assert!(!items[0].is_error());
    assert_eq!(items[1].error_code(), Some(ErrorCode::TRANSACTION_CONFLICT));

    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(
        database.stats().await,
        SessionStats {
            created: 6,
            committed: 0,
            aborted: 6
        }
    );
}

#[tokio::test]
async fn test_non_conflict_failure_is_not_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let routes = RouteTable::new().route(Method::POST, "/classes/A", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { Err(PlatformError::object_not_found("Object not found.")) }
    });
    let database = InMemoryDatabase::new();
    let controller = controller(routes, database.clone());

    let err = controller
        .handle_request(Method::POST, "/batch", batch(&["/classes/A"]), transactional())
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::BatchAborted(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(database.stats().await.created, 1);
}

#[tokio::test]
async fn test_non_transactional_batch_reports_errors_inline() {
    let routes = ok_route(RouteTable::new(), "/classes/A", "a1").route(
        Method::POST,
        "/classes/B",
        |_| async move { Err(PlatformError::transaction_conflict("Write conflict")) },
    );
    let database = InMemoryDatabase::new();
    let controller = controller(routes, database.clone());

    let response = controller
        .handle_request(
            Method::POST,
            "/batch",
            batch(&["/classes/A", "/classes/B"]),
            RequestOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(
        response,
        json!([
            { "success": { "objectId": "a1" } },
            { "error": { "code": 251, "error": "Write conflict" } }
        ])
    );
    assert_eq!(database.stats().await, SessionStats::default());
}

#[tokio::test]
async fn test_body_transaction_flag_opens_session() {
    let routes = ok_route(RouteTable::new(), "/classes/A", "a1");
    let database = InMemoryDatabase::new();
    let controller = controller(routes, database.clone());

    let mut body = batch(&["/classes/A"]);
    body["transaction"] = json!(true);
    controller
        .handle_request(Method::POST, "/batch", body, RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(database.stats().await.committed, 1);
}

#[tokio::test]
async fn test_sub_requests_share_the_batch_session() {
    let seen = Arc::new(Mutex::new(Vec::<Option<SessionId>>::new()));
    let mut routes = RouteTable::new();
    for path in ["/classes/A", "/classes/B", "/classes/C"] {
        let seen = seen.clone();
        routes.register(Method::POST, path, move |request| {
            seen.lock().unwrap().push(request.transaction);
            async move { Ok(RouteResponse::ok(json!({}))) }
        });
    }
    let controller = controller(routes, InMemoryDatabase::new());

    controller
        .handle_request(
            Method::POST,
            "/batch",
            batch(&["/classes/A", "/classes/B", "/classes/C"]),
            transactional(),
        )
        .await
        .unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 3);
    assert!(seen[0].is_some());
    assert!(seen.iter().all(|id| *id == seen[0]));
}

#[tokio::test]
async fn test_return_status_items_carry_status() {
    let routes = RouteTable::new().route(Method::POST, "/classes/A", |_| async move {
        Ok(RouteResponse::created(json!({ "objectId": "a1" })).with_header("Location", "/classes/A/a1"))
    });
    let controller = controller(routes, InMemoryDatabase::new());

    let options = RequestOptions::builder().return_status(true).build();
    let response = controller
        .handle_request(Method::POST, "/batch", batch(&["/classes/A"]), options)
        .await
        .unwrap();
    assert_eq!(
        response,
        json!([{
            "success": { "objectId": "a1" },
            "_status": 201,
            "_headers": { "Location": "/classes/A/a1" }
        }])
    );
}

#[tokio::test]
async fn test_nested_batch_does_not_inherit_outer_transaction() {
    let seen = Arc::new(Mutex::new(Vec::<(String, Option<SessionId>)>::new()));
    let mut routes = RouteTable::new();
    for path in ["/classes/A", "/classes/B"] {
        let seen = seen.clone();
        routes.register(Method::POST, path, move |request| {
            seen.lock().unwrap().push((path.to_string(), request.transaction));
            async move { Ok(RouteResponse::ok(json!({}))) }
        });
    }
    let database = InMemoryDatabase::new();
    let controller = controller(routes, database.clone());

    let body = json!({
        "requests": [
            { "method": "POST", "path": "/classes/A", "body": {} },
            { "method": "POST", "path": "/parse/batch", "body": batch(&["/classes/B"]) }
        ]
    });
    let response = controller
        .handle_request(Method::POST, "/batch", body, transactional())
        .await
        .unwrap();
    assert_eq!(
        response,
        json!([{ "success": {} }, { "success": [{ "success": {} }] }])
    );

    assert_eq!(
        database.stats().await,
        SessionStats {
            created: 1,
            committed: 1,
            aborted: 0
        }
    );
    let seen = seen.lock().unwrap().clone();
    let outer = seen.iter().find(|(path, _)| path == "/classes/A").unwrap();
    let inner = seen.iter().find(|(path, _)| path == "/classes/B").unwrap();
    assert!(outer.1.is_some());
    assert_eq!(inner.1, None);
}
