//! HTTP gateway (EMBP): merges the per-resource subrouters and owns the
//! mapping from engine errors to responses.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::models::AssetType;

mod anomalies;
mod health;
mod risk;
mod summary;

// ---

pub fn router(engine: Engine) -> Router {
    // ---
    Router::new()
        .merge(risk::router())
        .merge(anomalies::router())
        .merge(summary::router())
        .merge(health::router())
        .with_state(engine)
}

/// `{ "success": false, "error": message }` with the given status.
fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    // ---
    let body = json!({ "success": false, "error": message.into() });
    (status, Json(body)).into_response()
}

/// Map an engine error to a response. Storage details are logged, not sent.
fn engine_failure(err: EngineError, action: &str) -> Response {
    // ---
    match err {
        EngineError::NoAssets { .. } => failure(StatusCode::NOT_FOUND, err.to_string()),
        EngineError::Store(e) => {
            error!("Failed to {}: {}", action, e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to {action}"))
        }
    }
}

/// Body of the per-asset calculation endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetRequest {
    // ---
    asset_id: Option<String>,
    asset_type: Option<String>,
}

/// Validate the request body and check the asset is registered.
///
/// The engine itself never validates existence; that is the caller's job.
async fn resolve_asset(
    engine: &Engine,
    req: AssetRequest,
    action: &str,
) -> Result<(String, AssetType), Response> {
    // ---
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let (Some(asset_id), Some(asset_type)) = (non_empty(req.asset_id), non_empty(req.asset_type))
    else {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            "assetId and assetType are required",
        ));
    };

    match engine.store().asset_exists(&asset_id).await {
        Ok(true) => Ok((asset_id, AssetType::from(asset_type))),
        Ok(false) => Err(failure(
            StatusCode::NOT_FOUND,
            format!("Asset {asset_id} not found"),
        )),
        Err(e) => Err(engine_failure(e.into(), action)),
    }
}
