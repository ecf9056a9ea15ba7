//! Web API module for Flow Manager
//!
//! Provides endpoints for:
//! - Login ingress (`GET /user/:token/login`)
//! - Health checks

pub mod health;
pub mod login;

use axum::Router;

pub use health::health_routes;
pub use login::login_routes;

/// Create the API router with all endpoints.
///
/// Handlers expect an `Extension<Arc<Orchestrator>>` layer.
pub fn api_router() -> Router {
    Router::new().merge(login_routes()).merge(health_routes())
}

#[cfg(test)]
pub(crate) mod test_support {
    use flowmanager_core::Orchestrator;
    use flowmanager_sources::{SourceConfig, SourcesConfig};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn source(url: String) -> SourceConfig {
        SourceConfig {
            url,
            ..Default::default()
        }
    }

    /// Orchestrator whose six sources live under `base`.
    pub fn orchestrator(base: &str) -> Arc<Orchestrator> {
        let config = SourcesConfig {
            vars: HashMap::from([("backend".to_string(), base.to_string())]),
            user_preferences: source("${backend}/user/%token".into()),
            device_reporter: source("${backend}/device".into()),
            match_maker: source("${backend}/match?%query".into()),
            transformer: source("${backend}/transform?%query".into()),
            launch_manager: source("${backend}/launch?%query".into()),
            snapshot: source("${backend}/snapshot".into()),
        };
        crate::server::build_orchestrator(&config, &reqwest::Client::new()).unwrap()
    }
}
