//! GraphQL service: owns schema building and exposes HTTP routes for /graphql and /graphql/ws.
//!
//! Depends on the catalog service; builds the schema in [start](Service::start) once the
//! catalog is available. The HTTP server merges [GraphqlService::router] into the app and
//! uses [GraphqlService::schema] to build [AppState](crate::app::AppState).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLProtocol, GraphQLRequest, GraphQLResponse, GraphQLWebSocket};
use async_trait::async_trait;
use axum::Router;
use axum::extract::ws::{CloseFrame, Message, close_code};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use tokio::sync::RwLock;
use tracing::info;

use crate::app::AppState;
use crate::services::manager::{Service, ServiceHealth, ServicesManager};

use super::{ACK_INIT_PARAM, CatalogSchema, SubscriptionAck, build_schema};

/// Configuration for the GraphQL service (server port for playground URL logging).
#[derive(Debug, Clone)]
pub struct GraphqlServiceConfig {
    pub server_port: u16,
}

/// GraphQL service: builds and holds the schema, provides routes for the playground and API.
pub struct GraphqlService {
    manager: Arc<ServicesManager>,
    server_port: u16,
    schema: RwLock<Option<CatalogSchema>>,
}

impl GraphqlService {
    pub fn new(manager: Arc<ServicesManager>, server_port: u16) -> Self {
        Self {
            manager,
            server_port,
            schema: RwLock::new(None),
        }
    }

    /// Return the built schema, if the service has been started.
    pub async fn schema(&self) -> Option<CatalogSchema> {
        self.schema.read().await.clone()
    }

    /// Routes for `/graphql` (playground + POST) and `/graphql/ws` (subscriptions).
    pub fn router() -> Router<AppState> {
        Router::new()
            .route("/graphql", get(graphiql).post(graphql_handler))
            .route("/graphql/ws", get(graphql_ws_handler))
    }
}

async fn graphiql(headers: HeaderMap) -> impl IntoResponse {
    let accepts_html = headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);

    if accepts_html {
        axum::response::Html(
            GraphiQLSource::build()
                .endpoint("/graphql")
                .subscription_endpoint("/graphql/ws")
                .finish(),
        )
        .into_response()
    } else {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            axum::Json(serde_json::json!({
                "error": "GET requests are not supported for GraphQL queries. Use POST with Content-Type: application/json"
            })),
        )
            .into_response()
    }
}

async fn graphql_handler(State(state): State<AppState>, req: GraphQLRequest) -> GraphQLResponse {
    state.schema.execute(req.into_inner()).await.into()
}

async fn graphql_ws_handler(
    State(state): State<AppState>,
    protocol: GraphQLProtocol,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    tracing::debug!("Subscription connection upgrading");
    let mut shutdown = state.shutdown.subscribe();
    ws.protocols(["graphql-transport-ws", "graphql-ws"])
        .on_upgrade(move |socket| async move {
            let (mut sink, source) = socket.split();
            let stopping = Arc::new(AtomicBool::new(false));
            let flag = stopping.clone();
            // Ending the inbound half stops the connection and drops its streams.
            let source = source.take_until(async move {
                let _ = shutdown.recv().await;
                flag.store(true, Ordering::Relaxed);
            });

            GraphQLWebSocket::new_with_pair(&mut sink, source, state.schema.clone(), protocol)
                .on_connection_init(|params: serde_json::Value| async move {
                    let mut data = async_graphql::Data::default();
                    if params.get(ACK_INIT_PARAM).and_then(serde_json::Value::as_bool) == Some(true) {
                        data.insert(SubscriptionAck);
                    }
                    tracing::debug!("Subscription connection active");
                    Ok(data)
                })
                .serve()
                .await;

            if stopping.load(Ordering::Relaxed) {
                let _ = sink
                    .send(Message::Close(Some(CloseFrame {
                        code: close_code::AWAY,
                        reason: "server shutting down".into(),
                    })))
                    .await;
                tracing::debug!("Subscription connection closed for shutdown");
            } else {
                tracing::debug!("Subscription connection closed");
            }
        })
}

#[async_trait]
impl Service for GraphqlService {
    fn name(&self) -> &str {
        "graphql"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["catalog".to_string()]
    }

    async fn start(&self) -> Result<()> {
        info!(service = "graphql", "GraphQL service starting");
        let catalog = self
            .manager
            .get_catalog()
            .await
            .map(|svc| svc.catalog())
            .ok_or_else(|| anyhow::anyhow!("catalog service not available"))?;
        let schema = build_schema(catalog);
        *self.schema.write().await = Some(schema);
        info!(service = "graphql", "GraphQL service started");
        info!(
            service = "graphql",
            "GraphQL playground: http://localhost:{}/graphql",
            self.server_port
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        *self.schema.write().await = None;
        info!(service = "graphql", "Stopped");
        Ok(())
    }

    async fn health(&self) -> Result<ServiceHealth> {
        if self.schema.read().await.is_some() {
            Ok(ServiceHealth::healthy())
        } else {
            Ok(ServiceHealth::unhealthy("schema not built"))
        }
    }
}
