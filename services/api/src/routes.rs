use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, get_service};
use axum::{Extension, Json, Router};
use serde_json::json;
use std::path::Path;
use tower_http::services::{ServeDir, ServeFile};
use tracing::error;

const FORM_PLACEHOLDER_ACTION: &str = "action=\"#\"";
const REGISTRATION_ACTION: &str = "action=\"/submit-registration\"";

/// Operational endpoints and the static form pages. Anything unrouted falls
/// through to files under `static_root`.
pub(crate) fn with_page_routes(router: Router, static_root: &Path) -> Router {
    router
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route(
            "/",
            get_service(ServeFile::new(static_root.join("index.html"))),
        )
        .route(
            "/registration",
            get_service(ServeFile::new(static_root.join("registration.html"))),
        )
        .route(
            "/enquiry",
            get_service(ServeFile::new(static_root.join("enquiry.html"))),
        )
        .route("/registration.html", get(registration_page))
        .fallback_service(ServeDir::new(static_root))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// The registration page with its placeholder form action pointed at the
/// submission endpoint.
pub(crate) async fn registration_page(Extension(state): Extension<AppState>) -> Response {
    let path = state.page("registration.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(page) => {
            Html(page.replacen(FORM_PLACEHOLDER_ACTION, REGISTRATION_ACTION, 1)).into_response()
        }
        Err(err) => {
            error!(error = %err, path = %path.display(), "failed to load registration page");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error loading registration page",
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(static_root: &Path, ready: bool) -> Router {
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
            static_root: Arc::new(PathBuf::from(static_root)),
        };
        with_page_routes(Router::new(), static_root).layer(Extension(state))
    }

    fn static_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("index.html"), "<h1>Admissions</h1>").expect("index");
        std::fs::write(
            dir.path().join("registration.html"),
            "<form id=\"registrationForm\" action=\"#\" method=\"post\"></form>",
        )
        .expect("registration");
        std::fs::write(dir.path().join("enquiry.html"), "<form id=\"enquiryForm\"></form>")
            .expect("enquiry");
        std::fs::write(dir.path().join("styles.css"), "body { margin: 0; }").expect("css");
        dir
    }

    async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).expect("request builds"))
            .await
            .expect("router responds");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let root = static_root();
        let (status, body) = get_text(app(root.path(), false), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn readiness_follows_the_flag() {
        let root = static_root();
        let (status, _) = get_text(app(root.path(), false), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = get_text(app(root.path(), true), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("ready"));
    }

    #[tokio::test]
    async fn pages_are_served_by_friendly_path() {
        let root = static_root();
        let (status, body) = get_text(app(root.path(), true), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Admissions"));

        let (_, body) = get_text(app(root.path(), true), "/enquiry").await;
        assert!(body.contains("enquiryForm"));

        let (_, body) = get_text(app(root.path(), true), "/registration").await;
        assert!(body.contains("action=\"#\""));
    }

    #[tokio::test]
    async fn registration_html_points_the_form_at_the_endpoint() {
        let root = static_root();
        let (status, body) = get_text(app(root.path(), true), "/registration.html").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("action=\"/submit-registration\""));
        assert!(!body.contains("action=\"#\""));
    }

    #[tokio::test]
    async fn missing_registration_page_is_an_error() {
        let root = tempfile::tempdir().expect("temp dir");
        let (status, body) = get_text(app(root.path(), true), "/registration.html").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Error loading registration page");
    }

    #[tokio::test]
    async fn other_files_fall_through_to_the_static_root() {
        let root = static_root();
        let (status, body) = get_text(app(root.path(), true), "/styles.css").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("margin"));

        let (status, _) = get_text(app(root.path(), true), "/missing.js").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_are_plain_text() {
        let root = static_root();
        let response = app(root.path(), true)
            .oneshot(Request::get("/metrics").body(Body::empty()).expect("request builds"))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
    }
}
