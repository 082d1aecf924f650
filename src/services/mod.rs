//! Long-running services and their lifecycle manager

pub mod catalog;
pub mod http_server;
pub mod manager;

pub use catalog::{CatalogService, CatalogServiceConfig};
pub use http_server::{HttpServerConfig, HttpServerService};
pub use manager::{HealthStatus, Service, ServiceHealth, ServicesManager, ServicesManagerBuilder};
