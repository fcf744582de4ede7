use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        // Shared links
        .route(
            "/api/link",
            post(handlers::create_link)
                .fallback(handlers::link_method_not_allowed)
                .layer(DefaultBodyLimit::max(handlers::MAX_PAGE_STATE_SIZE)),
        )
        .route("/api/page_config", get(handlers::page_config))
        // Internal
        .route("/_internal/health", get(handlers::health));

    if state.metrics.is_some() {
        router = router.route("/metrics", get(handlers::metrics));
    }

    let prefix = state.config.server.route_prefix.clone();
    let router = if prefix.is_empty() {
        router
    } else {
        Router::new().nest(&prefix, router)
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::api::handlers::{PageConfigResponse, MAX_PAGE_STATE_SIZE};
    use crate::link_store::LinkStore;
    use crate::naming::short_name;
    use crate::testutil::{local_blob_store, sqlite_store, test_state};

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&body).to_string())
    }

    fn post_link(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/api/link")
            .body(body.into())
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_create_then_load_page_config() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(Some(Arc::new(local_blob_store(&dir))));
        let page_state = r#"{"queries":[{"expr":"rate(http_requests_total[5m])"}]}"#;

        let (status, name) = send(create_router(state.clone()), post_link(page_state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(name, short_name(page_state.as_bytes()));

        let (status, body) = send(
            create_router(state),
            get(&format!("/api/page_config?l={name}")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let config: PageConfigResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(config.default_prometheus_url, "http://prometheus:9090");
        let loaded = config.page_state.expect("page state should be loaded");
        assert_eq!(
            serde_json::Value::Object(loaded),
            serde_json::from_str::<serde_json::Value>(page_state).unwrap()
        );
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(sqlite_store(&dir).await);
        let state = test_state(Some(store.clone() as Arc<dyn LinkStore>));

        let (first_status, first) = send(create_router(state.clone()), post_link("{}")).await;
        let (second_status, second) = send(create_router(state), post_link("{}")).await;
        assert_eq!(first_status, StatusCode::OK);
        assert_eq!(second_status, StatusCode::OK);
        assert_eq!(first, second);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM link")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
        store.close().await;
    }

    #[tokio::test]
    async fn test_size_limit_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(sqlite_store(&dir).await);
        let state = test_state(Some(store.clone() as Arc<dyn LinkStore>));

        let exact = "a".repeat(MAX_PAGE_STATE_SIZE);
        let (status, name) = send(create_router(state.clone()), post_link(exact.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(store.read(&name).await.unwrap(), exact);

        let oversized = "b".repeat(MAX_PAGE_STATE_SIZE + 1);
        let (status, body) = send(create_router(state), post_link(oversized)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body, "Page is too large to save, sorry");

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM link")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
        store.close().await;
    }

    #[tokio::test]
    async fn test_other_methods_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(Some(Arc::new(local_blob_store(&dir))));

        for method in [Method::GET, Method::PUT, Method::DELETE] {
            let request = Request::builder()
                .method(method)
                .uri("/api/link")
                .body(Body::empty())
                .unwrap();
            let (status, body) = send(create_router(state.clone()), request).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(body, "Invalid HTTP method, use POST");
        }
    }

    #[tokio::test]
    async fn test_invalid_utf8_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(Some(Arc::new(local_blob_store(&dir))));

        let (status, _) = send(create_router(state), post_link(vec![0xff, 0xfe, 0x00])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_sharing_disabled() {
        let state = test_state(None);

        let (status, _) = send(create_router(state.clone()), post_link("{}")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = send(create_router(state.clone()), get("/api/page_config?l=abc")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        // Without a link the store is not needed.
        let (status, body) = send(create_router(state), get("/api/page_config")).await;
        assert_eq!(status, StatusCode::OK);
        let config: PageConfigResponse = serde_json::from_str(&body).unwrap();
        assert!(config.page_state.is_none());
        assert!(config.now > 0);
    }

    #[tokio::test]
    async fn test_unknown_link_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(sqlite_store(&dir).await);
        let state = test_state(Some(store.clone() as Arc<dyn LinkStore>));

        let (status, body) = send(create_router(state), get("/api/page_config?l=doesNotExist")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "Shared link not found");
        store.close().await;
    }

    #[tokio::test]
    async fn test_non_json_page_state_is_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(Some(Arc::new(local_blob_store(&dir))));

        let (status, name) = send(create_router(state.clone()), post_link("not json")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            create_router(state),
            get(&format!("/api/page_config?l={name}")),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_route_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_state(None).config.clone();
        config.server.route_prefix = "/lens".to_string();
        let state = Arc::new(AppState {
            config,
            links: Some(Arc::new(local_blob_store(&dir))),
            metrics: None,
        });

        let request = Request::builder()
            .method(Method::POST)
            .uri("/lens/api/link")
            .body(Body::from("{}"))
            .unwrap();
        let (status, name) = send(create_router(state.clone()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(name, short_name(b"{}"));

        let (status, _) = send(create_router(state), post_link("{}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_reports_backend() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(Some(Arc::new(local_blob_store(&dir))));

        let (status, body) = send(create_router(state), get("/_internal/health")).await;
        assert_eq!(status, StatusCode::OK);
        let health: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["link_backend"], "local");
    }
}
