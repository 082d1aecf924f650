//! Services manager for the long-running parts of the server.
//!
//! Services register with the manager and are started/stopped together.
//! Start order respects [dependencies](Service::dependencies); a service is only
//! started after all of its dependencies. Stop runs in reverse order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::graphql::{GraphqlService, GraphqlServiceConfig};
use crate::services::catalog::{CatalogService, CatalogServiceConfig};
use crate::services::http_server::{HttpServerConfig, HttpServerService};

/// Health status of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Result of a service health check.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServiceHealth {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: None,
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            message: Some(message.into()),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
        }
    }
}

/// A service that can be started, stopped, restarted, and health-checked by the manager.
///
/// Implementations log lifecycle transitions with [tracing] and include the
/// service name as a field (e.g. `tracing::info!(service = "http", "Started")`).
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Unique name for logging and lookup (e.g. "catalog", "graphql", "http").
    fn name(&self) -> &str;

    /// Names of services that must be started before this one.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn restart(&self) -> Result<()> {
        self.stop().await?;
        self.start().await
    }

    async fn health(&self) -> Result<ServiceHealth> {
        Ok(ServiceHealth::healthy())
    }
}

/// Pending registration for the builder.
pub enum ServiceRegistration {
    Catalog(CatalogServiceConfig),
    Graphql(GraphqlServiceConfig),
    Http(HttpServerConfig),
    Service(Arc<dyn Service>),
}

/// Types that can be added to a [ServicesManagerBuilder] via [add_service](ServicesManagerBuilder::add_service).
pub trait IntoServiceRegistration {
    #[doc(hidden)]
    fn into_registration(self) -> ServiceRegistration;
}

impl IntoServiceRegistration for CatalogServiceConfig {
    fn into_registration(self) -> ServiceRegistration {
        ServiceRegistration::Catalog(self)
    }
}

impl IntoServiceRegistration for GraphqlServiceConfig {
    fn into_registration(self) -> ServiceRegistration {
        ServiceRegistration::Graphql(self)
    }
}

impl IntoServiceRegistration for HttpServerConfig {
    fn into_registration(self) -> ServiceRegistration {
        ServiceRegistration::Http(self)
    }
}

impl IntoServiceRegistration for Arc<dyn Service> {
    fn into_registration(self) -> ServiceRegistration {
        ServiceRegistration::Service(self)
    }
}

/// Builder for [ServicesManager]: add services with configs, then [build](ServicesManagerBuilder::build) or [start](ServicesManagerBuilder::start).
///
/// ```ignore
/// let services = ServicesManager::builder()
///     .add_service(CatalogServiceConfig::default())
///     .add_service(GraphqlServiceConfig { server_port: config.port })
///     .add_service(HttpServerConfig { config: config.clone() })
///     .start()
///     .await?;
/// ```
pub struct ServicesManagerBuilder {
    registrations: Vec<ServiceRegistration>,
}

impl ServicesManagerBuilder {
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }

    /// Add a service: a config (e.g. [CatalogServiceConfig], [GraphqlServiceConfig]) or a
    /// pre-built [Arc]\[[dyn](Service)\]. Config-based services are instantiated on build.
    pub fn add_service<T: IntoServiceRegistration>(mut self, t: T) -> Self {
        self.registrations.push(t.into_registration());
        self
    }

    /// Build the manager and register all services. Does not start them.
    pub async fn build(self) -> Result<Arc<ServicesManager>> {
        let manager = Arc::new(ServicesManager::new());
        for reg in self.registrations {
            match reg {
                ServiceRegistration::Catalog(config) => {
                    let catalog_svc = Arc::new(CatalogService::new(config));
                    manager.register_catalog(catalog_svc).await;
                }
                ServiceRegistration::Graphql(config) => {
                    let graphql_svc =
                        Arc::new(GraphqlService::new(manager.clone(), config.server_port));
                    manager.register_graphql(graphql_svc).await;
                }
                ServiceRegistration::Http(config) => {
                    let http_svc =
                        Arc::new(HttpServerService::new(manager.clone(), config.config));
                    manager.register_http(http_svc).await;
                }
                ServiceRegistration::Service(svc) => {
                    manager.register(svc).await;
                }
            }
        }
        Ok(manager)
    }

    /// Build the manager, register all services, and start them in dependency order.
    pub async fn start(self) -> Result<Arc<ServicesManager>> {
        let manager = self.build().await?;
        manager.start_all().await?;
        Ok(manager)
    }
}

impl Default for ServicesManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry and lifecycle controller for services.
pub struct ServicesManager {
    services: RwLock<HashMap<String, Arc<dyn Service>>>,
    started: RwLock<HashSet<String>>,
    catalog: RwLock<Option<Arc<CatalogService>>>,
    graphql: RwLock<Option<Arc<GraphqlService>>>,
    http: RwLock<Option<Arc<HttpServerService>>>,
}

impl Default for ServicesManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServicesManager {
    pub fn new() -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
            started: RwLock::new(HashSet::new()),
            catalog: RwLock::new(None),
            graphql: RwLock::new(None),
            http: RwLock::new(None),
        }
    }

    pub fn builder() -> ServicesManagerBuilder {
        ServicesManagerBuilder::new()
    }

    /// Compute start order from dependencies (topological order). Returns an error on unknown deps or cycles.
    async fn start_order(&self) -> Result<Vec<String>> {
        let guard = self.services.read().await;
        let names: HashSet<String> = guard.keys().cloned().collect();
        let mut deps: HashMap<String, Vec<String>> = HashMap::new();
        for (name, svc) in guard.iter() {
            let d = svc.dependencies();
            for dep in &d {
                if !names.contains(dep) {
                    anyhow::bail!(
                        "Service {} depends on {} which is not registered",
                        name,
                        dep
                    );
                }
            }
            deps.insert(name.clone(), d);
        }
        drop(guard);

        // Kahn's algorithm: dependencies first.
        let mut in_degree: HashMap<String, usize> = deps
            .iter()
            .map(|(name, d)| (name.clone(), d.len()))
            .collect();
        let mut dependents: HashMap<String, Vec<String>> =
            names.iter().map(|n| (n.clone(), Vec::new())).collect();
        for (name, d) in &deps {
            for dep in d {
                if let Some(list) = dependents.get_mut(dep) {
                    list.push(name.clone());
                }
            }
        }
        let mut queue: Vec<String> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| n.clone())
            .collect();
        queue.sort();
        let mut order = Vec::with_capacity(names.len());
        while let Some(n) = queue.pop() {
            for s in dependents.get(&n).into_iter().flatten() {
                if let Some(deg) = in_degree.get_mut(s) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push(s.clone());
                    }
                }
            }
            order.push(n);
        }
        if order.len() != names.len() {
            anyhow::bail!("Service dependency cycle detected");
        }
        Ok(order)
    }

    async fn insert(&self, service: Arc<dyn Service>) {
        let name = service.name().to_string();
        let mut guard = self.services.write().await;
        if guard.insert(name.clone(), service).is_some() {
            warn!(service = %name, "Service '{}' reregistered, overwriting previous", name);
        } else {
            info!(service = %name, "Service '{}' registered", name);
        }
    }

    /// Register a service. Does not start it. If a service with the same name
    /// exists, it is replaced (the previous instance is not stopped).
    pub async fn register(&self, service: Arc<dyn Service>) {
        self.insert(service).await;
    }

    /// Register the catalog service so [get_catalog](ServicesManager::get_catalog) works.
    pub async fn register_catalog(&self, service: Arc<CatalogService>) {
        *self.catalog.write().await = Some(service.clone());
        self.insert(service).await;
    }

    /// Register the GraphQL service so [get_graphql](ServicesManager::get_graphql) works.
    pub async fn register_graphql(&self, service: Arc<GraphqlService>) {
        *self.graphql.write().await = Some(service.clone());
        self.insert(service).await;
    }

    /// Register the HTTP server service so [get_http](ServicesManager::get_http) works.
    pub async fn register_http(&self, service: Arc<HttpServerService>) {
        *self.http.write().await = Some(service.clone());
        self.insert(service).await;
    }

    /// Return the catalog service if it is registered and currently **started**.
    pub async fn get_catalog(&self) -> Option<Arc<CatalogService>> {
        if !self.started.read().await.contains("catalog") {
            return None;
        }
        self.catalog.read().await.clone()
    }

    /// Return the GraphQL service if it is registered and currently **started**.
    pub async fn get_graphql(&self) -> Option<Arc<GraphqlService>> {
        if !self.started.read().await.contains("graphql") {
            return None;
        }
        self.graphql.read().await.clone()
    }

    /// Return the HTTP server service if it is registered and currently **started**.
    pub async fn get_http(&self) -> Option<Arc<HttpServerService>> {
        if !self.started.read().await.contains("http") {
            return None;
        }
        self.http.read().await.clone()
    }

    /// Start all registered services in dependency order (dependencies first).
    pub async fn start_all(&self) -> Result<()> {
        let order = self.start_order().await?;
        for name in &order {
            let svc = {
                let g = self.services.read().await;
                g.get(name).cloned()
            };
            if let Some(s) = svc {
                if let Err(e) = s.start().await {
                    warn!(service = %name, error = %e, "Service '{}' start failed", name);
                    return Err(e).context(format!("failed to start service {}", name));
                }
                self.started.write().await.insert(name.clone());
                info!(service = %name, "Service '{}' started", name);
            }
        }
        Ok(())
    }

    /// Stop all registered services in reverse dependency order (dependents first).
    pub async fn stop_all(&self) -> Result<()> {
        let order = self.start_order().await?;
        for name in order.into_iter().rev() {
            if !self.started.read().await.contains(&name) {
                continue;
            }
            let svc = {
                let g = self.services.read().await;
                g.get(&name).cloned()
            };
            if let Some(s) = svc {
                if let Err(e) = s.stop().await {
                    warn!(service = %name, error = %e, "Service '{}' stop failed", name);
                } else {
                    info!(service = %name, "Service '{}' stopped", name);
                }
                self.started.write().await.remove(&name);
            }
        }
        Ok(())
    }

    /// Restart a single service by name. Dependencies are not restarted.
    pub async fn restart_one(&self, name: &str) -> Result<()> {
        let svc = {
            let guard = self.services.read().await;
            guard.get(name).cloned()
        };
        match svc {
            Some(s) => {
                self.started.write().await.remove(name);
                s.restart().await?;
                self.started.write().await.insert(name.to_string());
                info!(service = %name, "Service '{}' restarted", name);
                Ok(())
            }
            None => {
                anyhow::bail!("Service not found: {}", name)
            }
        }
    }

    /// Health check for all registered services. Services that return an error from
    /// [health](Service::health) are reported as [Unhealthy](HealthStatus::Unhealthy).
    pub async fn health_all(&self) -> HashMap<String, ServiceHealth> {
        let services: Vec<(String, Arc<dyn Service>)> = {
            let guard = self.services.read().await;
            guard.iter().map(|(n, s)| (n.clone(), s.clone())).collect()
        };
        let mut out = HashMap::new();
        for (name, svc) in services {
            let h = match svc.health().await {
                Ok(h) => h,
                Err(e) => ServiceHealth::unhealthy(e.to_string()),
            };
            out.insert(name, h);
        }
        out
    }

    /// Return whether the given service is currently started (tracked by the manager).
    pub async fn is_started(&self, name: &str) -> bool {
        self.started.read().await.contains(name)
    }

    /// List all registered service names.
    pub async fn names(&self) -> Vec<String> {
        let guard = self.services.read().await;
        guard.keys().cloned().collect()
    }
}
