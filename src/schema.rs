//! Database schema management for `assethealth`.
//!
//! Ensures the asset registry and the append-only time-series tables exist
//! before serving requests. Applied once on startup from `main.rs` (EMBP:
//! single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Statements applied in order inside one transaction. Each is idempotent.
const STATEMENTS: &[&str] = &[
    // Asset registry; `current_risk_score` is the denormalized latest score,
    // guarded by the computation time in `risk_scored_at`.
    r#"
    CREATE TABLE IF NOT EXISTS assets (
        id                 TEXT PRIMARY KEY,
        name               TEXT        NOT NULL,
        type               TEXT        NOT NULL,
        plant_id           TEXT        NOT NULL,
        location           TEXT,
        status             TEXT        NOT NULL DEFAULT 'active',
        current_risk_score DOUBLE PRECISION,
        risk_scored_at     TIMESTAMPTZ,
        updated_at         TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sensor_readings (
        id          BIGSERIAL PRIMARY KEY,
        asset_id    TEXT             NOT NULL,
        time        TIMESTAMPTZ      NOT NULL,
        sensor_type TEXT             NOT NULL,
        value       DOUBLE PRECISION NOT NULL,
        unit        TEXT             NOT NULL DEFAULT ''
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS risk_scores (
        id            BIGSERIAL PRIMARY KEY,
        time          TIMESTAMPTZ      NOT NULL,
        asset_id      TEXT             NOT NULL,
        score         DOUBLE PRECISION NOT NULL,
        explanation   TEXT             NOT NULL,
        factors       JSONB            NOT NULL DEFAULT '[]',
        confidence    DOUBLE PRECISION NOT NULL,
        model_version TEXT             NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS anomalies (
        id             UUID PRIMARY KEY,
        asset_id       TEXT             NOT NULL,
        timestamp      TIMESTAMPTZ      NOT NULL,
        detected_at    TIMESTAMPTZ      NOT NULL,
        severity       TEXT             NOT NULL,
        metric         TEXT             NOT NULL,
        expected_value DOUBLE PRECISION NOT NULL,
        actual_value   DOUBLE PRECISION NOT NULL,
        deviation      DOUBLE PRECISION NOT NULL,
        description    TEXT             NOT NULL,
        status         TEXT             NOT NULL DEFAULT 'open'
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS executive_summaries (
        id                     BIGSERIAL PRIMARY KEY,
        plant_id               TEXT             NOT NULL,
        generated_at           TIMESTAMPTZ      NOT NULL,
        overall_health_score   DOUBLE PRECISION NOT NULL,
        total_assets           INTEGER          NOT NULL,
        risk_distribution      JSONB            NOT NULL,
        critical_anomaly_count INTEGER          NOT NULL,
        top_risk_assets        JSONB            NOT NULL,
        trending_issues        JSONB            NOT NULL,
        recommendations        JSONB            NOT NULL
    );
    "#,
    // Indexes for the recency and plant lookups the engine issues
    r#"
    CREATE INDEX IF NOT EXISTS idx_sensor_readings_asset_time
        ON sensor_readings (asset_id, time DESC);
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_risk_scores_asset_time
        ON risk_scores (asset_id, time DESC);
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_anomalies_asset_timestamp
        ON anomalies (asset_id, timestamp DESC);
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_anomalies_open_detected
        ON anomalies (detected_at) WHERE status = 'open';
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_assets_plant_id
        ON assets (plant_id);
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_executive_summaries_plant
        ON executive_summaries (plant_id, generated_at DESC);
    "#,
];

/// Create or update the database schema (idempotent).
///
/// Safe to call on every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    for statement in STATEMENTS {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    tracing::debug!("Schema ready ({} statements applied)", STATEMENTS.len());
    Ok(())
}
