//! Health check endpoints

use std::collections::HashMap;

use axum::extract::State;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::app::AppState;
use crate::services::{HealthStatus, ServiceHealth};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub books: usize,
    pub services: HashMap<String, ServiceHealth>,
}

/// Health check - always returns OK if the server is running
async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness check - every registered service reports healthy
async fn readyz(State(state): State<AppState>) -> Json<ReadyResponse> {
    let services = state.services.health_all().await;
    let ready = services
        .values()
        .all(|h| h.status == HealthStatus::Healthy);
    let books = match state.services.get_catalog().await {
        Some(svc) => svc.catalog().len(),
        None => 0,
    };

    Json(ReadyResponse {
        ready,
        books,
        services,
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
}
