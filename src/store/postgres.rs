//! PostgreSQL [`Store`] backend.
//!
//! Tables are created by `schema::create_schema`. Rows are fetched into
//! private `FromRow` structs and converted to the typed models, so enum
//! columns stored as TEXT are validated on the way out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{AnomalyQuery, HistoryWindow, Store};
use crate::error::{StoreError, StoreResult};
use crate::models::{
    Anomaly, Asset, AssetRiskSummary, AssetType, ExecutiveSummary, RiskDistribution, RiskFactor,
    RiskScore, SensorReading, TrendingIssue, DECOMMISSIONED,
};

/// Version tag written alongside every risk score row.
const MODEL_VERSION: &str = "1.0.0";

// ---

/// Store backed by a `sqlx` PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    // ---
    pool: PgPool,
}

impl PgStore {
    // ---
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ---

#[derive(sqlx::FromRow)]
struct ReadingRow {
    // ---
    asset_id: String,
    time: DateTime<Utc>,
    sensor_type: String,
    value: f64,
    unit: String,
}

impl From<ReadingRow> for SensorReading {
    fn from(row: ReadingRow) -> Self {
        // ---
        SensorReading {
            asset_id: row.asset_id,
            timestamp: row.time,
            sensor_type: row.sensor_type.into(),
            value: row.value,
            unit: row.unit,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AssetRow {
    // ---
    id: String,
    name: String,
    asset_type: String,
    plant_id: String,
    location: Option<String>,
    status: String,
    current_risk_score: Option<f64>,
    risk_scored_at: Option<DateTime<Utc>>,
}

impl From<AssetRow> for Asset {
    fn from(row: AssetRow) -> Self {
        // ---
        Asset {
            id: row.id,
            name: row.name,
            asset_type: AssetType::from(row.asset_type),
            plant_id: row.plant_id,
            location: row.location,
            status: row.status,
            current_risk_score: row.current_risk_score,
            risk_scored_at: row.risk_scored_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PlantAssetRow {
    // ---
    id: String,
    name: String,
    asset_type: String,
    risk_score: f64,
    status: String,
    location: String,
}

impl From<PlantAssetRow> for AssetRiskSummary {
    fn from(row: PlantAssetRow) -> Self {
        // ---
        AssetRiskSummary {
            asset_id: row.id,
            asset_name: row.name,
            asset_type: AssetType::from(row.asset_type),
            risk_score: row.risk_score,
            status: row.status,
            location: row.location,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RiskScoreRow {
    // ---
    asset_id: String,
    time: DateTime<Utc>,
    score: f64,
    explanation: String,
    factors: Json<Vec<RiskFactor>>,
    confidence: f64,
}

impl From<RiskScoreRow> for RiskScore {
    fn from(row: RiskScoreRow) -> Self {
        // ---
        RiskScore {
            asset_id: row.asset_id,
            risk_score: row.score,
            timestamp: row.time,
            explanation: row.explanation,
            risk_factors: row.factors.0,
            confidence: row.confidence,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AnomalyRow {
    // ---
    id: Uuid,
    asset_id: String,
    timestamp: DateTime<Utc>,
    detected_at: DateTime<Utc>,
    severity: String,
    metric: String,
    expected_value: f64,
    actual_value: f64,
    deviation: f64,
    description: String,
    status: String,
}

impl TryFrom<AnomalyRow> for Anomaly {
    type Error = StoreError;

    fn try_from(row: AnomalyRow) -> Result<Self, Self::Error> {
        // ---
        Ok(Anomaly {
            id: row.id,
            asset_id: row.asset_id,
            timestamp: row.timestamp,
            detected_at: row.detected_at,
            severity: row.severity.parse()?,
            metric: row.metric.into(),
            expected_value: row.expected_value,
            actual_value: row.actual_value,
            deviation: row.deviation,
            description: row.description,
            status: row.status.parse()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    // ---
    plant_id: String,
    generated_at: DateTime<Utc>,
    overall_health_score: f64,
    total_assets: i32,
    risk_distribution: Json<RiskDistribution>,
    critical_anomaly_count: i32,
    top_risk_assets: Json<Vec<AssetRiskSummary>>,
    trending_issues: Json<Vec<TrendingIssue>>,
    recommendations: Json<Vec<String>>,
}

impl From<SummaryRow> for ExecutiveSummary {
    fn from(row: SummaryRow) -> Self {
        // ---
        ExecutiveSummary {
            plant_id: row.plant_id,
            generated_at: row.generated_at,
            overall_health_score: row.overall_health_score,
            total_assets: usize::try_from(row.total_assets).unwrap_or(0),
            risk_distribution: row.risk_distribution.0,
            critical_anomaly_count: usize::try_from(row.critical_anomaly_count).unwrap_or(0),
            top_risk_assets: row.top_risk_assets.0,
            trending_issues: row.trending_issues.0,
            recommendations: row.recommendations.0,
        }
    }
}

fn to_i32(count: usize) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

fn to_i64(count: u32) -> i64 {
    i64::from(count)
}

// ---

#[async_trait]
impl Store for PgStore {
    // ---
    async fn recent_readings(
        &self,
        asset_id: &str,
        limit: u32,
    ) -> StoreResult<Vec<SensorReading>> {
        // ---
        let rows: Vec<ReadingRow> = sqlx::query_as(
            r#"
            SELECT asset_id, time, sensor_type, value, unit
            FROM sensor_readings
            WHERE asset_id = $1
            ORDER BY time DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(asset_id)
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SensorReading::from).collect())
    }

    async fn find_asset(&self, asset_id: &str) -> StoreResult<Option<Asset>> {
        // ---
        let row: Option<AssetRow> = sqlx::query_as(
            r#"
            SELECT id, name, type AS asset_type, plant_id, location, status,
                   current_risk_score, risk_scored_at
            FROM assets
            WHERE id = $1
            "#,
        )
        .bind(asset_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Asset::from))
    }

    async fn append_risk_score(&self, score: &RiskScore) -> StoreResult<()> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO risk_scores (time, asset_id, score, explanation, factors, confidence, model_version)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(score.timestamp)
        .bind(&score.asset_id)
        .bind(score.risk_score)
        .bind(&score.explanation)
        .bind(Json(&score.risk_factors))
        .bind(score.confidence)
        .bind(MODEL_VERSION)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_current_risk_score(
        &self,
        asset_id: &str,
        score: f64,
        computed_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        // ---
        let result = sqlx::query(
            r#"
            UPDATE assets
            SET current_risk_score = $1, risk_scored_at = $3, updated_at = NOW()
            WHERE id = $2
              AND (risk_scored_at IS NULL OR risk_scored_at <= $3)
            "#,
        )
        .bind(score)
        .bind(asset_id)
        .bind(computed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn risk_score_history(
        &self,
        asset_id: &str,
        window: &HistoryWindow,
    ) -> StoreResult<Vec<RiskScore>> {
        // ---
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT asset_id, time, score, explanation, factors, confidence \
             FROM risk_scores WHERE asset_id = ",
        );
        qb.push_bind(asset_id);

        if let Some(start) = window.start {
            qb.push(" AND time >= ").push_bind(start);
        }
        if let Some(end) = window.end {
            qb.push(" AND time <= ").push_bind(end);
        }

        qb.push(" ORDER BY time DESC, id DESC LIMIT ")
            .push_bind(to_i64(window.limit))
            .push(" OFFSET ")
            .push_bind(to_i64(window.offset));

        let rows = qb.build_query_as::<RiskScoreRow>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(RiskScore::from).collect())
    }

    async fn append_anomaly(&self, anomaly: &Anomaly) -> StoreResult<()> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO anomalies (
                id, asset_id, timestamp, detected_at, severity, metric,
                expected_value, actual_value, deviation, description, status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(anomaly.id)
        .bind(&anomaly.asset_id)
        .bind(anomaly.timestamp)
        .bind(anomaly.detected_at)
        .bind(anomaly.severity.as_str())
        .bind(anomaly.metric.as_str())
        .bind(anomaly.expected_value)
        .bind(anomaly.actual_value)
        .bind(anomaly.deviation)
        .bind(&anomaly.description)
        .bind(anomaly.status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn query_anomalies(&self, query: &AnomalyQuery) -> StoreResult<Vec<Anomaly>> {
        // ---
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT an.id, an.asset_id, an.timestamp, an.detected_at, an.severity, an.metric, \
             an.expected_value, an.actual_value, an.deviation, an.description, an.status \
             FROM anomalies an",
        );

        if query.plant_id.is_some() {
            qb.push(" JOIN assets a ON an.asset_id = a.id");
        }
        qb.push(" WHERE TRUE");

        if let Some(plant_id) = &query.plant_id {
            qb.push(" AND a.plant_id = ").push_bind(plant_id.clone());
        }
        if let Some(asset_id) = &query.asset_id {
            qb.push(" AND an.asset_id = ").push_bind(asset_id.clone());
        }
        if let Some(severity) = query.severity {
            qb.push(" AND an.severity = ").push_bind(severity.as_str());
        }
        if let Some(status) = query.status {
            qb.push(" AND an.status = ").push_bind(status.as_str());
        }
        if let Some(start) = query.start {
            qb.push(" AND an.timestamp >= ").push_bind(start);
        }
        if let Some(end) = query.end {
            qb.push(" AND an.timestamp <= ").push_bind(end);
        }
        if let Some(since) = query.detected_since {
            qb.push(" AND an.detected_at > ").push_bind(since);
        }

        qb.push(" ORDER BY an.timestamp DESC");
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(to_i64(limit));
        }

        let rows = qb.build_query_as::<AnomalyRow>().fetch_all(&self.pool).await?;
        rows.into_iter().map(Anomaly::try_from).collect()
    }

    async fn list_assets_for_plant(&self, plant_id: &str) -> StoreResult<Vec<AssetRiskSummary>> {
        // ---
        let rows: Vec<PlantAssetRow> = sqlx::query_as(
            r#"
            SELECT id, name, type AS asset_type,
                   COALESCE(current_risk_score, 0) AS risk_score,
                   status,
                   COALESCE(location, 'Unknown') AS location
            FROM assets
            WHERE plant_id = $1
              AND status <> $2
            ORDER BY current_risk_score DESC NULLS LAST
            "#,
        )
        .bind(plant_id)
        .bind(DECOMMISSIONED)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AssetRiskSummary::from).collect())
    }

    async fn append_executive_summary(&self, summary: &ExecutiveSummary) -> StoreResult<()> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO executive_summaries (
                plant_id, generated_at, overall_health_score, total_assets,
                risk_distribution, critical_anomaly_count, top_risk_assets,
                trending_issues, recommendations
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&summary.plant_id)
        .bind(summary.generated_at)
        .bind(summary.overall_health_score)
        .bind(to_i32(summary.total_assets))
        .bind(Json(&summary.risk_distribution))
        .bind(to_i32(summary.critical_anomaly_count))
        .bind(Json(&summary.top_risk_assets))
        .bind(Json(&summary.trending_issues))
        .bind(Json(&summary.recommendations))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn executive_summary_history(
        &self,
        plant_id: &str,
        limit: u32,
    ) -> StoreResult<Vec<ExecutiveSummary>> {
        // ---
        let rows: Vec<SummaryRow> = sqlx::query_as(
            r#"
            SELECT plant_id, generated_at, overall_health_score, total_assets,
                   risk_distribution, critical_anomaly_count, top_risk_assets,
                   trending_issues, recommendations
            FROM executive_summaries
            WHERE plant_id = $1
            ORDER BY generated_at DESC
            LIMIT $2
            "#,
        )
        .bind(plant_id)
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ExecutiveSummary::from).collect())
    }
}
