use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::engine_failure;
use crate::engine::Engine;

// ---

pub fn router() -> Router<Engine> {
    // ---
    Router::new()
        .route("/api/summary/{plant_id}", get(generate))
        .route("/api/summary/{plant_id}/history", get(history))
}

/// `GET /api/summary/{plant_id}` – always a freshly generated summary.
async fn generate(State(engine): State<Engine>, Path(plant_id): Path<String>) -> Response {
    // ---
    info!("GET /api/summary/{}", plant_id);
    match engine.summaries.generate_summary(&plant_id).await {
        Ok(summary) => {
            (StatusCode::OK, Json(json!({ "success": true, "summary": summary }))).into_response()
        }
        Err(e) => engine_failure(e, "generate executive summary"),
    }
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    limit: Option<u32>,
}

/// `GET /api/summary/{plant_id}/history`
async fn history(
    State(engine): State<Engine>,
    Path(plant_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Response {
    // ---
    match engine
        .summaries
        .get_summary_history(&plant_id, params.limit.unwrap_or(30))
        .await
    {
        Ok(history) => (
            StatusCode::OK,
            Json(json!({ "success": true, "count": history.len(), "history": history })),
        )
            .into_response(),
        Err(e) => engine_failure(e, "fetch executive summary history"),
    }
}
