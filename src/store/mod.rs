//! Storage gateway for the engine (EMBP).
//!
//! The engine never talks to a database directly. Everything it reads or
//! writes goes through the [`Store`] trait: the time-series log of readings,
//! risk scores and anomalies, the asset registry, and the summary history.
//! Two backends live behind this gateway:
//! - [`PgStore`] – PostgreSQL via `sqlx`, used by the service binary
//! - [`MemoryStore`] – in-process tables, used by tests and embedded callers

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::models::{
    Anomaly, AnomalyStatus, Asset, AssetRiskSummary, ExecutiveSummary, RiskScore, SensorReading,
    Severity,
};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

// ---

/// Filters for anomaly read queries. Unset fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct AnomalyQuery {
    // ---
    pub asset_id: Option<String>,
    /// Restrict to assets registered under this plant.
    pub plant_id: Option<String>,
    pub severity: Option<Severity>,
    pub status: Option<AnomalyStatus>,
    /// Lower bound on the anomalous reading's timestamp.
    pub start: Option<DateTime<Utc>>,
    /// Upper bound on the anomalous reading's timestamp.
    pub end: Option<DateTime<Utc>>,
    /// Only anomalies whose check ran after this instant.
    pub detected_since: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

/// Window over an asset's stored risk scores, newest first.
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    // ---
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub offset: u32,
    pub limit: u32,
}

impl HistoryWindow {
    // ---
    pub fn latest(limit: u32) -> Self {
        Self {
            start: None,
            end: None,
            offset: 0,
            limit,
        }
    }
}

/// Collaborator interface consumed by the engine.
///
/// Implementations must return readings, scores and anomalies newest first.
/// Any error is a storage failure; callers propagate it without retrying.
#[async_trait]
pub trait Store: Send + Sync {
    // ---
    /// Up to `limit` readings for the asset, most recent first.
    async fn recent_readings(&self, asset_id: &str, limit: u32)
        -> StoreResult<Vec<SensorReading>>;

    /// Registry lookup.
    async fn find_asset(&self, asset_id: &str) -> StoreResult<Option<Asset>>;

    async fn asset_exists(&self, asset_id: &str) -> StoreResult<bool> {
        Ok(self.find_asset(asset_id).await?.is_some())
    }

    /// Append an immutable risk score row.
    async fn append_risk_score(&self, score: &RiskScore) -> StoreResult<()>;

    /// Overwrite the asset's current risk score unless the stored value was
    /// computed after `computed_at`. Returns whether the write applied.
    async fn update_current_risk_score(
        &self,
        asset_id: &str,
        score: f64,
        computed_at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn risk_score_history(
        &self,
        asset_id: &str,
        window: &HistoryWindow,
    ) -> StoreResult<Vec<RiskScore>>;

    async fn append_anomaly(&self, anomaly: &Anomaly) -> StoreResult<()>;

    /// Anomalies matching `query`, newest reading first.
    async fn query_anomalies(&self, query: &AnomalyQuery) -> StoreResult<Vec<Anomaly>>;

    /// Non-decommissioned assets of a plant, highest current risk first.
    async fn list_assets_for_plant(&self, plant_id: &str) -> StoreResult<Vec<AssetRiskSummary>>;

    async fn append_executive_summary(&self, summary: &ExecutiveSummary) -> StoreResult<()>;

    async fn executive_summary_history(
        &self,
        plant_id: &str,
        limit: u32,
    ) -> StoreResult<Vec<ExecutiveSummary>>;
}
