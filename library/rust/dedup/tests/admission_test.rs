use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use http::Request;
use http_body_util::BodyExt;
use tollgate_dedup::{
    admission_middleware, AdmissionConfig, AdmissionFilter, AdmissionState, DedupError,
    DedupStore, InMemoryDedupStore, MissingRequestIdPolicy, StoreErrorPolicy, REQUEST_ID_HEADER,
};
use tower::ServiceExt;

fn app(store: Arc<dyn DedupStore>, config: AdmissionConfig) -> Router {
    let filter = AdmissionFilter::new(store, config).unwrap();
    Router::new()
        .route("/api/pay", post(|| async { "paid" }))
        .route("/api/refund", post(|| async { "refunded" }))
        .route("/health", get(|| async { "ok" }))
        .layer(middleware::from_fn_with_state(
            AdmissionState::new(filter),
            admission_middleware,
        ))
}

async fn send(app: Router, method: &str, uri: &str, request_id: Option<&str>) -> (u16, String) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = request_id {
        builder = builder.header(REQUEST_ID_HEADER, id);
    }
    let req = builder.body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status().as_u16();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&body).to_string())
}

fn error_json(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap()
}

struct UnavailableStore;

#[async_trait::async_trait]
impl DedupStore for UnavailableStore {
    async fn check_and_mark(&self, _fingerprint: &str) -> Result<bool, DedupError> {
        Err(DedupError::Unavailable("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_first_request_reaches_handler() {
    let store: Arc<dyn DedupStore> = Arc::new(InMemoryDedupStore::new());
    let (status, body) = send(app(store, AdmissionConfig::default()), "POST", "/api/pay", Some("req-1")).await;
    assert_eq!(status, 200);
    assert_eq!(body, "paid");
}

#[tokio::test]
async fn test_duplicate_request_is_rejected_before_handler() {
    let store: Arc<dyn DedupStore> = Arc::new(InMemoryDedupStore::new());
    let config = AdmissionConfig::default();

    let (status1, _) = send(app(store.clone(), config.clone()), "POST", "/api/pay", Some("req-1")).await;
    assert_eq!(status1, 200);

    let (status2, body2) = send(app(store.clone(), config.clone()), "POST", "/api/pay", Some("req-1")).await;
    assert_eq!(status2, 409);
    let json = error_json(&body2);
    assert_eq!(json["error"]["code"], "SYS_ADMISSION_DUPLICATE_REQUEST");
    assert_eq!(json["error"]["request_id"], "req-1");

    // 同じ ID でも別ルートは受け付ける
    let (status3, body3) = send(app(store, config), "POST", "/api/refund", Some("req-1")).await;
    assert_eq!(status3, 200);
    assert_eq!(body3, "refunded");
}

#[tokio::test]
async fn test_missing_request_id_is_rejected_by_default() {
    let store: Arc<dyn DedupStore> = Arc::new(InMemoryDedupStore::new());
    let (status, body) = send(app(store, AdmissionConfig::default()), "POST", "/api/pay", None).await;
    assert_eq!(status, 400);
    assert_eq!(error_json(&body)["error"]["code"], "SYS_ADMISSION_MISSING_REQUEST_ID");
}

#[tokio::test]
async fn test_missing_request_id_passes_through_when_configured() {
    let store: Arc<dyn DedupStore> = Arc::new(InMemoryDedupStore::new());
    let config = AdmissionConfig {
        missing_request_id: MissingRequestIdPolicy::PassThrough,
        ..Default::default()
    };
    for _ in 0..2 {
        let (status, body) = send(app(store.clone(), config.clone()), "POST", "/api/pay", None).await;
        assert_eq!(status, 200);
        assert_eq!(body, "paid");
    }
}

#[tokio::test]
async fn test_paths_outside_scope_are_not_checked() {
    let store: Arc<dyn DedupStore> = Arc::new(InMemoryDedupStore::new());
    for _ in 0..2 {
        let (status, body) = send(app(store.clone(), AdmissionConfig::default()), "GET", "/health", Some("req-1")).await;
        assert_eq!(status, 200);
        assert_eq!(body, "ok");
    }
}

#[tokio::test]
async fn test_custom_header_name() {
    let store: Arc<dyn DedupStore> = Arc::new(InMemoryDedupStore::new());
    let config = AdmissionConfig {
        header_name: "JIAN-REQUESTID".to_string(),
        ..Default::default()
    };
    let filter = AdmissionFilter::new(store, config).unwrap();
    let router = Router::new()
        .route("/api/pay", post(|| async { "paid" }))
        .layer(middleware::from_fn_with_state(
            AdmissionState::new(filter),
            admission_middleware,
        ));

    let send_with = |router: Router| async move {
        let req = Request::builder()
            .method("POST")
            .uri("/api/pay")
            .header("jian-requestid", "req-5")
            .body(Body::empty())
            .unwrap();
        router.oneshot(req).await.unwrap().status().as_u16()
    };
    assert_eq!(send_with(router.clone()).await, 200);
    assert_eq!(send_with(router).await, 409);
}

#[tokio::test]
async fn test_store_failure_policies() {
    let store: Arc<dyn DedupStore> = Arc::new(UnavailableStore);

    let (open_status, _) = send(app(store.clone(), AdmissionConfig::default()), "POST", "/api/pay", Some("req-1")).await;
    assert_eq!(open_status, 200);

    let closed = AdmissionConfig {
        store_error: StoreErrorPolicy::FailClosed,
        ..Default::default()
    };
    let (closed_status, body) = send(app(store, closed), "POST", "/api/pay", Some("req-1")).await;
    assert_eq!(closed_status, 503);
    assert_eq!(
        error_json(&body)["error"]["code"],
        "SYS_ADMISSION_SERVICE_UNAVAILABLE"
    );
}

#[tokio::test]
async fn test_request_is_accepted_again_after_ttl() {
    let store: Arc<dyn DedupStore> =
        Arc::new(InMemoryDedupStore::with_settings(Duration::from_millis(300), 1_000));
    let config = AdmissionConfig::default();

    assert_eq!(send(app(store.clone(), config.clone()), "POST", "/api/pay", Some("req-1")).await.0, 200);
    assert_eq!(send(app(store.clone(), config.clone()), "POST", "/api/pay", Some("req-1")).await.0, 409);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(send(app(store, config), "POST", "/api/pay", Some("req-1")).await.0, 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicates_admit_exactly_one() {
    let store: Arc<dyn DedupStore> = Arc::new(InMemoryDedupStore::new());
    let router = app(store, AdmissionConfig::default());

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let router = router.clone();
        tasks.push(tokio::spawn(async move {
            send(router, "POST", "/api/pay", Some("req-42")).await.0
        }));
    }
    let mut statuses = Vec::new();
    for task in tasks {
        statuses.push(task.await.unwrap());
    }
    assert_eq!(statuses.iter().filter(|s| **s == 200).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == 409).count(), 15);
}
