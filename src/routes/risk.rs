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

use super::{engine_failure, failure, resolve_asset, AssetRequest};
use crate::engine::Engine;

// ---

pub fn router() -> Router<Engine> {
    // ---
    Router::new()
        .route("/api/risk/calculate", post(calculate))
        .route("/api/risk/{asset_id}", get(latest))
        .route("/api/risk/{asset_id}/history", get(history))
}

/// `POST /api/risk/calculate` – score an asset and report large swings.
async fn calculate(State(engine): State<Engine>, Json(req): Json<AssetRequest>) -> Response {
    // ---
    let action = "calculate risk score";
    let (asset_id, asset_type) = match resolve_asset(&engine, req, action).await {
        Ok(resolved) => resolved,
        Err(response) => return response,
    };

    debug!("POST /api/risk/calculate - {} ({})", asset_id, asset_type);

    let score = match engine.risk.calculate_risk_score(&asset_id, asset_type).await {
        Ok(score) => score,
        Err(e) => return engine_failure(e, action),
    };
    let change = match engine.risk.assess_change(&score).await {
        Ok(change) => change,
        Err(e) => return engine_failure(e, action),
    };

    info!(
        "Calculated risk score for asset {}: {}",
        asset_id, score.risk_score
    );
    (
        StatusCode::OK,
        Json(json!({ "success": true, "riskScore": score, "change": change })),
    )
        .into_response()
}

/// `GET /api/risk/{asset_id}` – most recent stored score.
async fn latest(State(engine): State<Engine>, Path(asset_id): Path<String>) -> Response {
    // ---
    match engine.risk.get_latest_risk_score(&asset_id).await {
        Ok(Some(score)) => {
            (StatusCode::OK, Json(json!({ "success": true, "riskScore": score }))).into_response()
        }
        Ok(None) => failure(StatusCode::NOT_FOUND, "No risk score found for this asset"),
        Err(e) => engine_failure(e, "fetch risk score"),
    }
}

/// Query parameters for the score history
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    limit: Option<u32>,
}

/// `GET /api/risk/{asset_id}/history` – stored scores, newest first.
async fn history(
    State(engine): State<Engine>,
    Path(asset_id): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Response {
    // ---
    let limit = params.limit.unwrap_or(30);
    match engine
        .risk
        .get_risk_score_history(&asset_id, params.start_date, params.end_date, limit)
        .await
    {
        Ok(history) => (
            StatusCode::OK,
            Json(json!({ "success": true, "count": history.len(), "history": history })),
        )
            .into_response(),
        Err(e) => engine_failure(e, "fetch risk score history"),
    }
}
