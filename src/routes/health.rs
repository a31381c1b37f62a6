// src/routes/health.rs
//! API health check endpoint for the asset health service.
//!
//! This module defines the `/health` route used by container orchestrators
//! and CI pipelines to verify that the service is up. It is a sibling module
//! in the `routes` directory and follows the Explicit Module Boundary Pattern
//! (EMBP): the gateway (`mod.rs`) merges this subrouter into the top-level
//! API router so that `main.rs` does not need to know about endpoints.

use axum::{routing::get, Json, Router};
use serde::Serialize;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Handle `GET /health`.
///
/// Does not touch the store; a reachable process answers `ok`.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Subrouter with the `/health` route, generic over the gateway state.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}
