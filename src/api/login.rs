//! Login ingress.
//!
//! `GET /user/:token/login` starts a pipeline run and acknowledges at once.
//! The response never reflects how the run ends.

use axum::extract::{Extension, Path};
use axum::http::{HeaderName, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use flowmanager_core::Orchestrator;
use std::sync::Arc;

/// Body returned for every accepted token
pub const ACCEPTED: &str = "User token was successfully accepted.";

/// Response header carrying the run id
pub const RUN_ID_HEADER: HeaderName = HeaderName::from_static("x-run-id");

async fn user_login(
    Path(token): Path<String>,
    Extension(orchestrator): Extension<Arc<Orchestrator>>,
) -> impl IntoResponse {
    let run = orchestrator.submit(&token);
    (StatusCode::OK, [(RUN_ID_HEADER, run.to_string())], ACCEPTED)
}

/// Create login routes
pub fn login_routes() -> Router {
    Router::new().route("/user/:token/login", get(user_login))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::orchestrator;
    use crate::server::build_app;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use flowmanager_core::RunEvent;
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn login(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let run_id = response
            .headers()
            .get(RUN_ID_HEADER)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, run_id, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_login_acknowledges_and_starts_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/snapshot"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let orch = orchestrator(&server.uri());
        let mut rx = orch.monitor().subscribe();
        let app = build_app(orch.clone());

        let (status, run_id, body) = login(app, "/user/abc/login").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, ACCEPTED);

        let run_id = run_id.expect("x-run-id header");
        assert!(uuid::Uuid::parse_str(&run_id).is_ok());

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, RunEvent::RunStarted { .. }));
        assert_eq!(first.run_id().to_string(), run_id);
    }

    #[tokio::test]
    async fn test_login_acknowledges_when_backends_are_down() {
        // Nothing listens on port 1
        let orch = orchestrator("http://127.0.0.1:1");
        let mut rx = orch.monitor().subscribe();
        let app = build_app(orch.clone());

        let (status, _, body) = login(app, "/user/bad/login").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, ACCEPTED);

        let failed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let RunEvent::RunFailed { .. } = rx.recv().await.unwrap() {
                    break;
                }
            }
        })
        .await;
        assert!(failed.is_ok());
        assert_eq!(orch.monitor().stats().failed, 1);
    }

    #[tokio::test]
    async fn test_each_login_gets_its_own_run() {
        let orch = orchestrator("http://127.0.0.1:1");

        let (_, first, _) = login(build_app(orch.clone()), "/user/abc/login").await;
        let (_, second, _) = login(build_app(orch.clone()), "/user/abc/login").await;
        assert_ne!(first, second);
        assert_eq!(orch.monitor().stats().started, 2);
    }

    #[tokio::test]
    async fn test_other_paths_not_found() {
        let app = build_app(orchestrator("http://127.0.0.1:1"));

        let (status, _, _) = login(app.clone(), "/user/abc").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) = login(app, "/user/abc/logout").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
