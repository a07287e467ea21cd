//! Web server module for extmon.
//!
//! Serves the Prometheus scrape endpoint and liveness/readiness probes. It
//! only ever reads the [`MetricsRegistry`]; the monitor loop is the writer.

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::metrics::{Exposition, ExpositionError, MetricsRegistry};

/// Shared application state.
pub struct AppState {
    pub metrics: Arc<MetricsRegistry>,
    pub exposition: Exposition,
}

impl AppState {
    /// Build state over an existing registry.
    ///
    /// # Errors
    /// Returns `ExpositionError` if the Prometheus collectors cannot be
    /// registered.
    pub fn new(metrics: Arc<MetricsRegistry>) -> Result<Self, ExpositionError> {
        let exposition = Exposition::new(Arc::clone(&metrics))?;
        Ok(Self {
            metrics,
            exposition,
        })
    }
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cycles: Option<u64>,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let app_state = Arc::new(state);

    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .with_state(app_state)
}

/// Prometheus scrape endpoint.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.exposition.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, state.exposition.content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Metrics exposition failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response()
        }
    }
}

/// Liveness probe.
async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        cycles: None,
    })
}

/// Readiness probe: ready once the first probe cycle has finished.
async fn readyz_handler(State(state): State<Arc<AppState>>) -> Response {
    let cycles = state.metrics.cycles();
    if cycles > 0 {
        Json(HealthResponse {
            status: "ok".to_string(),
            cycles: Some(cycles),
        })
        .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "not_ready".to_string(),
                cycles: None,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    fn create_test_state() -> (AppState, Arc<MetricsRegistry>) {
        let metrics = Arc::new(MetricsRegistry::default());
        let state = AppState::new(Arc::clone(&metrics)).expect("Failed to build state");
        (state, metrics)
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (state, metrics) = create_test_state();
        metrics.observe_latency("good_example", 42.0);
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));
        let body = body_text(response).await;
        assert!(body.contains("external_monitor_durations_milliseconds_count{host=\"good_example\"} 1"));
    }

    #[tokio::test]
    async fn test_healthz_endpoint() {
        let (state, _metrics) = create_test_state();
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_readyz_waits_for_first_cycle() {
        let (state, metrics) = create_test_state();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_text(response).await, r#"{"status":"not_ready"}"#);

        metrics.record_cycle();
        let response = app
            .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, r#"{"status":"ok","cycles":1}"#);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (state, _metrics) = create_test_state();
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/api/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
