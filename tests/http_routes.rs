//! Session HTTP routes exercised through the full router.

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
    response::Response,
};
use serde_json::{Value, json};
use tower::ServiceExt;

use feud_sync_back::{
    config::AppConfig,
    dao::session_store::MemorySessionStore,
    routes,
    state::AppState,
};

async fn test_app() -> (Router, MemorySessionStore) {
    let state = AppState::new(AppConfig::default());
    let store = MemorySessionStore::new();
    state.set_session_store(Arc::new(store.clone())).await;
    (routes::router(state), store)
}

async fn call(app: &Router, method: Method, uri: &str) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn json_body(res: Response) -> Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn create_session_returns_ok_and_is_idempotent() {
    let (app, store) = test_app().await;

    for _ in 0..2 {
        let res = call(&app, Method::POST, "/api/create-session/AB12").await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await, json!({ "ok": true }));
    }
    assert_eq!(store.len(), 1);

    let res = call(&app, Method::GET, "/api/session-exists/AB12").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await, json!({ "exists": true }));
}

#[tokio::test]
async fn unknown_session_does_not_exist() {
    let (app, _store) = test_app().await;
    let res = call(&app, Method::GET, "/api/session-exists/ZZ99").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await, json!({ "exists": false }));
}

#[tokio::test]
async fn malformed_ids_are_rejected_with_json() {
    let (app, store) = test_app().await;

    let res = call(&app, Method::POST, "/api/create-session/ab1").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(res).await,
        json!({ "message": "Invalid request - create-session" })
    );
    assert!(store.is_empty());

    let res = call(&app, Method::GET, "/api/session-exists/TOOLONG").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(res).await,
        json!({ "message": "Invalid request - session-exists" })
    );
}

#[tokio::test]
async fn store_outage_maps_to_service_unavailable() {
    let (app, store) = test_app().await;
    store.set_offline(true);

    let res = call(&app, Method::POST, "/api/create-session/AB12").await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        json_body(res).await,
        json!({ "message": "Session store unavailable" })
    );
}
