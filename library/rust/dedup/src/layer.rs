use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::filter::AdmissionFilter;

/// axum middleware State に渡すフィルタ（dyn dispatch のストアを内包する）
#[derive(Clone)]
pub struct AdmissionState {
    pub filter: Arc<AdmissionFilter>,
}

impl AdmissionState {
    pub fn new(filter: AdmissionFilter) -> Self {
        Self {
            filter: Arc::new(filter),
        }
    }
}

/// axum ミドルウェア関数
///
/// `axum::middleware::from_fn_with_state` で利用する。ハンドラより前に重複判定を行い、
/// 拒否した場合は `{ "error": { code, message, request_id } }` 形式で応答する。
///
/// ```ignore
/// use axum::{Router, middleware};
/// use tollgate_dedup::{admission_middleware, AdmissionConfig, AdmissionFilter, AdmissionState, InMemoryDedupStore};
///
/// let filter = AdmissionFilter::new(Arc::new(InMemoryDedupStore::new()), AdmissionConfig::default())?;
/// let app = Router::new()
///     .route("/api/pay", post(handler))
///     .layer(middleware::from_fn_with_state(AdmissionState::new(filter), admission_middleware));
/// ```
pub async fn admission_middleware(
    State(state): State<AdmissionState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let request_id = req
        .headers()
        .get(state.filter.header_name())
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    let route = req.uri().path().to_string();

    match state.filter.admit(request_id.as_deref(), &route).await {
        Ok(_) => next.run(req).await,
        Err(e) => {
            let service_error = e.to_service_error();
            match request_id {
                Some(id) => service_error.into_response_with_request_id(id),
                None => service_error.into_response(),
            }
        }
    }
}
