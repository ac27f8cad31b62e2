//! HTTP boundary: routes, token authentication and failure mapping

mod auth;
mod error;
mod rest;
mod types;

pub use auth::{AuthUser, ConfigTokens, IdentityProvider, StaticTokens, API_TOKEN_HEADER};
pub use error::{ApiError, ApiResult};
pub use rest::{AppState, RestApi, MAX_UPLOAD_BYTES};
pub use types::*;

use crate::metrics::metrics_route;
use crate::service::SaveSyncService;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Full application router: API routes, `/metrics`, CORS and request tracing
pub fn create_api_server(
    service: SaveSyncService,
    identities: Arc<dyn IdentityProvider>,
) -> Router {
    let rest_api = RestApi::new(service, identities);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(rest_api.router())
        .route("/metrics", metrics_route())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ServerConfig, SharedConfig};
    use crate::ledger::SyncLedger;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::Service;

    #[tokio::test]
    async fn test_api_server_creation() {
        let temp = TempDir::new().unwrap();
        let config = SharedConfig::new(ServerConfig {
            data_root: temp.path().to_path_buf(),
            ..Default::default()
        });
        let service = SaveSyncService::new(
            config.clone(),
            SyncLedger::new_in_memory().await.unwrap(),
        );
        let mut app = create_api_server(service, Arc::new(ConfigTokens::new(config)));

        let request = Request::builder()
            .uri("/manage/health")
            .body(Body::empty())
            .unwrap();
        let response = app.call(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
