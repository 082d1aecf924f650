//! Catalog service: owns the process-wide [Catalog] for the lifetime of the server.
//!
//! The catalog is constructed once, when the service is created, so restarting the
//! service (or the GraphQL service that depends on it) keeps every added book.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::catalog::{Book, Catalog, seed_books};
use crate::services::manager::Service;

/// Configuration for the catalog service.
#[derive(Debug, Clone)]
pub struct CatalogServiceConfig {
    /// Records present when the process starts.
    pub seed: Vec<Book>,
}

impl Default for CatalogServiceConfig {
    fn default() -> Self {
        Self { seed: seed_books() }
    }
}

pub struct CatalogService {
    catalog: Arc<Catalog>,
}

impl CatalogService {
    pub fn new(config: CatalogServiceConfig) -> Self {
        Self {
            catalog: Arc::new(Catalog::new(config.seed)),
        }
    }

    /// Shared handle to the catalog. Injected into the GraphQL schema.
    pub fn catalog(&self) -> Arc<Catalog> {
        self.catalog.clone()
    }
}

#[async_trait]
impl Service for CatalogService {
    fn name(&self) -> &str {
        "catalog"
    }

    async fn start(&self) -> Result<()> {
        info!(service = "catalog", books = self.catalog.len(), "Catalog service started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let closed = self.catalog.close_subscriptions();
        info!(
            service = "catalog",
            books = self.catalog.len(),
            closed_subscriptions = closed,
            "Stopped"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_restart_keeps_books() {
        let svc = CatalogService::new(CatalogServiceConfig::default());
        svc.start().await.unwrap();
        svc.catalog().add_book("Dune".into(), "Herbert".into());
        svc.restart().await.unwrap();
        assert_eq!(svc.catalog().len(), 3);
        assert_eq!(
            svc.health().await.unwrap().status,
            crate::services::manager::HealthStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_stop_closes_subscriptions() {
        use futures::StreamExt;

        let svc = CatalogService::new(CatalogServiceConfig::default());
        svc.start().await.unwrap();
        let mut events = svc.catalog().subscribe_book_added();
        assert_eq!(svc.catalog().subscriber_count(), 1);

        svc.stop().await.unwrap();
        assert_eq!(svc.catalog().subscriber_count(), 0);
        assert_eq!(events.next().await, None);
    }

    #[test]
    fn test_custom_seed() {
        let svc = CatalogService::new(CatalogServiceConfig { seed: Vec::new() });
        assert!(svc.catalog().is_empty());
    }
}
