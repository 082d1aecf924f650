//! Application state and HTTP router construction.
//!
//! Used by [HttpServerService](crate::services::http_server::HttpServerService)
//! to build the Axum app.

use std::sync::Arc;

use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::config::Config;
use crate::graphql::{CatalogSchema, GraphqlService};
use crate::services::ServicesManager;

/// Shared state for HTTP handlers (GraphQL, health routes).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub schema: CatalogSchema,
    pub services: Arc<ServicesManager>,
    /// Fires once when the HTTP server stops; open WebSocket connections close on it.
    pub shutdown: broadcast::Sender<()>,
}

/// Build the full Axum router: health, /graphql, /graphql/ws, static files, layers.
pub fn build_app(state: AppState) -> Router<()> {
    let static_dir = state.config.static_dir.clone();

    Router::new()
        .merge(api::health::router())
        .merge(GraphqlService::router())
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/assets", ServeDir::new(static_dir))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    use crate::graphql::GraphqlServiceConfig;
    use crate::services::CatalogServiceConfig;

    async fn app() -> Router<()> {
        let services = ServicesManager::builder()
            .add_service(CatalogServiceConfig::default())
            .add_service(GraphqlServiceConfig { server_port: 0 })
            .start()
            .await
            .unwrap();
        let schema = services.get_graphql().await.unwrap().schema().await.unwrap();
        build_app(AppState {
            config: Arc::new(Config::default()),
            schema,
            services,
            shutdown: broadcast::channel(1).0,
        })
    }

    #[tokio::test]
    async fn test_graphql_post_routes_to_schema() {
        let response = app()
            .await
            .oneshot(
                Request::post("/graphql")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"query":"{ books { title } }"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["books"][1]["title"], "Jurassic Park");
    }

    #[tokio::test]
    async fn test_graphql_get_without_html_is_rejected() {
        let response = app()
            .await
            .oneshot(Request::get("/graphql").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_healthz() {
        let response = app()
            .await
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
