//! HTTP server service: binds the Axum app and runs it in a background task.
//!
//! Depends on the GraphQL service (and transitively the catalog). Start order is
//! ensured by the service manager; this service builds [AppState] and the router in
//! [start](Service::start) and runs the server until [stop](Service::stop).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::app::{AppState, build_app};
use crate::config::Config;
use crate::services::manager::{Service, ServiceHealth, ServicesManager};

/// How long [stop](Service::stop) waits for in-flight requests.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Configuration for the HTTP server service (bind address, port and static dir).
#[derive(Clone)]
pub struct HttpServerConfig {
    pub config: Arc<Config>,
}

/// HTTP server service: binds and serves the Axum app in a background task.
pub struct HttpServerService {
    manager: Arc<ServicesManager>,
    config: Arc<Config>,
    /// Address actually bound; differs from the config when port 0 was requested.
    local_addr: parking_lot::RwLock<Option<SocketAddr>>,
    /// JoinHandle for the server task; set in start(), taken in stop().
    join_handle: parking_lot::RwLock<Option<tokio::task::JoinHandle<Result<()>>>>,
    /// Sent once to stop the listener and close subscription sockets; set in start(), taken in stop().
    shutdown_tx: parking_lot::RwLock<Option<broadcast::Sender<()>>>,
}

impl HttpServerService {
    pub fn new(manager: Arc<ServicesManager>, config: Arc<Config>) -> Self {
        Self {
            manager,
            config,
            local_addr: parking_lot::RwLock::new(None),
            join_handle: parking_lot::RwLock::new(None),
            shutdown_tx: parking_lot::RwLock::new(None),
        }
    }

    /// The bound socket address while the server is running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read()
    }
}

#[async_trait]
impl Service for HttpServerService {
    fn name(&self) -> &str {
        "http"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["graphql".to_string()]
    }

    async fn start(&self) -> Result<()> {
        info!(service = "http", "HTTP server service starting");

        let gql = self
            .manager
            .get_graphql()
            .await
            .ok_or_else(|| anyhow::anyhow!("graphql service not available"))?;
        let schema = gql
            .schema()
            .await
            .ok_or_else(|| anyhow::anyhow!("graphql schema not built"))?;

        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let state = AppState {
            config: self.config.clone(),
            schema,
            services: self.manager.clone(),
            shutdown: shutdown_tx.clone(),
        };

        let addr = SocketAddr::new(self.config.bind_address, self.config.port);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("HTTP server: bind {} failed", addr))?;
        let bound = listener
            .local_addr()
            .context("HTTP server: local address unavailable")?;

        let mut shutdown_rx = shutdown_tx.subscribe();
        let server = axum::serve(listener, build_app(state)).with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        });
        let join = tokio::spawn(async move { server.await.context("axum::serve") });

        *self.join_handle.write() = Some(join);
        *self.shutdown_tx.write() = Some(shutdown_tx);
        *self.local_addr.write() = Some(bound);

        info!(
            service = "http",
            addr = %bound,
            "Serving GraphQL on /graphql, subscriptions on /graphql/ws"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let tx = self.shutdown_tx.write().take();
        let handle = self.join_handle.write().take();
        if let Some(tx) = tx {
            // Reaches the listener and every open subscription socket.
            let _ = tx.send(());
        }
        if let Some(h) = handle {
            let abort = h.abort_handle();
            match tokio::time::timeout(SHUTDOWN_GRACE, h).await {
                Ok(Ok(Err(e))) => {
                    warn!(service = "http", error = %e, "HTTP server exited with error")
                }
                Ok(_) => {}
                Err(_) => {
                    warn!(service = "http", "HTTP server did not drain in time");
                    abort.abort();
                }
            }
        }
        *self.local_addr.write() = None;
        info!(service = "http", "HTTP server service stopped");
        Ok(())
    }

    async fn health(&self) -> Result<ServiceHealth> {
        match self.join_handle.read().as_ref() {
            Some(h) if !h.is_finished() => Ok(ServiceHealth::healthy()),
            Some(_) => Ok(ServiceHealth::unhealthy("server task exited")),
            None => Ok(ServiceHealth::unhealthy("server task not running")),
        }
    }
}
