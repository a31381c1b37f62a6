use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{engine_failure, resolve_asset, AssetRequest};
use crate::engine::{AnomalyFilter, Engine};
use crate::models::Severity;

// ---

pub fn router() -> Router<Engine> {
    // ---
    Router::new()
        .route("/api/anomalies/detect", post(detect))
        .route("/api/anomalies/critical/all", get(critical))
        .route("/api/anomalies/{asset_id}", get(by_asset))
}

/// `POST /api/anomalies/detect` – check an asset's newest readings.
async fn detect(State(engine): State<Engine>, Json(req): Json<AssetRequest>) -> Response {
    // ---
    let action = "detect anomalies";
    let (asset_id, asset_type) = match resolve_asset(&engine, req, action).await {
        Ok(resolved) => resolved,
        Err(response) => return response,
    };

    debug!("POST /api/anomalies/detect - {} ({})", asset_id, asset_type);

    match engine.anomalies.detect_anomalies(&asset_id, asset_type).await {
        Ok(result) => {
            info!(
                "Anomaly detection completed for asset {}: {} anomalies found",
                asset_id, result.anomalies_detected
            );
            let should_notify = result.should_notify();
            (
                StatusCode::OK,
                Json(json!({ "success": true, "result": result, "shouldNotify": should_notify })),
            )
                .into_response()
        }
        Err(e) => engine_failure(e, action),
    }
}

/// Query parameters for filtering an asset's anomalies
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnomalyParams {
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    severity: Option<Severity>,
    limit: Option<u32>,
}

/// `GET /api/anomalies/{asset_id}`
async fn by_asset(
    State(engine): State<Engine>,
    Path(asset_id): Path<String>,
    Query(params): Query<AnomalyParams>,
) -> Response {
    // ---
    let filter = AnomalyFilter {
        start_date: params.start_date,
        end_date: params.end_date,
        severity: params.severity,
        limit: Some(params.limit.unwrap_or(50)),
    };

    match engine.anomalies.get_anomalies_by_asset(&asset_id, &filter).await {
        Ok(anomalies) => (
            StatusCode::OK,
            Json(json!({ "success": true, "count": anomalies.len(), "anomalies": anomalies })),
        )
            .into_response(),
        Err(e) => engine_failure(e, "fetch anomalies"),
    }
}

#[derive(Debug, Deserialize)]
struct LimitParams {
    limit: Option<u32>,
}

/// `GET /api/anomalies/critical/all` – open critical anomalies plant-wide.
async fn critical(State(engine): State<Engine>, Query(params): Query<LimitParams>) -> Response {
    // ---
    match engine
        .anomalies
        .get_critical_anomalies(params.limit.unwrap_or(50))
        .await
    {
        Ok(anomalies) => (
            StatusCode::OK,
            Json(json!({ "success": true, "count": anomalies.len(), "anomalies": anomalies })),
        )
            .into_response(),
        Err(e) => engine_failure(e, "fetch critical anomalies"),
    }
}
