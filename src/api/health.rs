//! Health check endpoints with component-level diagnostics.
//!
//! Provides:
//! - `/health`: simple "healthy" + version (for load balancers)
//! - `/health/detailed`: per-component status (pipeline, event_bus)

use axum::extract::Extension;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use flowmanager_core::event_bus::EventBus;
use flowmanager_core::orchestrator::Orchestrator;
use flowmanager_core::{signals, RunMonitor};
use serde::Serialize;
use std::sync::Arc;

/// Simple health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed health response with per-component checks
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub checks: HealthChecks,
}

/// All component health checks
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub pipeline: ComponentHealth,
    pub event_bus: ComponentHealth,
}

/// Individual component health status
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ComponentHealth {
    fn healthy_with_details(details: serde_json::Value) -> Self {
        Self {
            status: "healthy",
            error: None,
            details: Some(details),
        }
    }

    fn unhealthy(error: String, details: serde_json::Value) -> Self {
        Self {
            status: "unhealthy",
            error: Some(error),
            details: Some(details),
        }
    }
}

/// Simple health check (for load balancers)
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Detailed health check with run counters and bus wiring
async fn detailed_health_check(
    Extension(orchestrator): Extension<Arc<Orchestrator>>,
) -> Json<DetailedHealthResponse> {
    let pipeline = check_pipeline(orchestrator.monitor());
    let event_bus = check_event_bus(orchestrator.bus());

    let status = if pipeline.status == "healthy" && event_bus.status == "healthy" {
        "healthy"
    } else {
        "unhealthy"
    };

    Json(DetailedHealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        checks: HealthChecks {
            pipeline,
            event_bus,
        },
    })
}

/// Run counters since startup
fn check_pipeline(monitor: &RunMonitor) -> ComponentHealth {
    let stats = monitor.stats();
    ComponentHealth::healthy_with_details(serde_json::json!({
        "runs_started": stats.started,
        "runs_persisted": stats.persisted,
        "runs_failed": stats.failed,
        "runs_in_flight": stats.in_flight(),
        "monitor_subscribers": monitor.subscriber_count(),
    }))
}

/// The bus is unhealthy if nothing listens for logins
fn check_event_bus(bus: &EventBus) -> ComponentHealth {
    let login_listeners = bus.listener_count(signals::USER_LOGIN);
    let details = serde_json::json!({
        "login_listeners": login_listeners,
        "pending_joins": bus.pending_joins(),
    });
    if login_listeners == 0 {
        ComponentHealth::unhealthy("no listeners for user login".to_string(), details)
    } else {
        ComponentHealth::healthy_with_details(details)
    }
}

/// Create health routes
pub fn health_routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/detailed", get(detailed_health_check))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::orchestrator;
    use crate::server::build_app;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn get_json(app: Router, uri: &str) -> serde_json::Value {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_component_health_unhealthy() {
        let h = ComponentHealth::unhealthy("no listeners".to_string(), serde_json::json!({}));
        assert_eq!(h.status, "unhealthy");
        assert_eq!(h.error.as_deref(), Some("no listeners"));
    }

    #[test]
    fn test_unwired_bus_is_unhealthy() {
        let h = check_event_bus(&EventBus::new());
        assert_eq!(h.status, "unhealthy");
        assert_eq!(h.details.unwrap()["login_listeners"], 0);
    }

    #[test]
    fn test_health_response_serialization() {
        let resp = HealthResponse {
            status: "healthy",
            version: "0.1.0",
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("0.1.0"));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = build_app(orchestrator("http://127.0.0.1:1"));
        let json = get_json(app, "/health").await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_detailed_health_endpoint() {
        let orch = orchestrator("http://127.0.0.1:1");
        orch.monitor().publish(flowmanager_core::RunEvent::RunStarted {
            run_id: flowmanager_core::RunId::new(),
            started_at: chrono::Utc::now(),
        });

        let json = get_json(build_app(orch), "/health/detailed").await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["checks"]["pipeline"]["details"]["runs_started"], 1);
        assert_eq!(json["checks"]["pipeline"]["details"]["runs_in_flight"], 1);
        assert_eq!(json["checks"]["event_bus"]["details"]["login_listeners"], 2);
        assert_eq!(json["checks"]["event_bus"]["details"]["pending_joins"], 0);
    }
}
