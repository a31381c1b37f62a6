//! End-to-end engine scenarios over the in-memory store.
//!
//! Each test builds a small plant, runs the services through the public
//! `Engine` surface and checks what a caller would see.

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};

use assethealth::engine::{AnomalyFilter, RiskLevel, COLD_START_CONFIDENCE};
use assethealth::models::{
    Asset, AssetType, SensorReading, SensorType, Severity, TrendDirection,
};
use assethealth::{Engine, EngineError, EngineSettings, MemoryStore, Store};

// ---

fn asset(id: &str, asset_type: AssetType, plant_id: &str) -> Asset {
    // ---
    Asset {
        id: id.to_string(),
        name: format!("{} {}", asset_type.label(), id),
        asset_type,
        plant_id: plant_id.to_string(),
        location: Some("Substation 4".to_string()),
        status: "active".to_string(),
        current_risk_score: None,
        risk_scored_at: None,
    }
}

/// Push `values` oldest first; the last value becomes the newest reading.
fn push_series(store: &MemoryStore, asset_id: &str, sensor: SensorType, unit: &str, values: &[f64]) {
    // ---
    let start = Utc::now() - Duration::hours(3);
    store.push_readings(values.iter().enumerate().map(|(i, v)| SensorReading {
        asset_id: asset_id.to_string(),
        timestamp: start + Duration::minutes(i as i64),
        sensor_type: sensor.clone(),
        value: *v,
        unit: unit.to_string(),
    }));
}

/// Transformer with a late temperature spike and a flat voltage channel.
fn push_overheating(store: &MemoryStore, asset_id: &str) {
    // ---
    push_series(
        store,
        asset_id,
        SensorType::Temperature,
        "°C",
        &[70.0, 72.0, 71.0, 71.0, 70.0, 200.0],
    );
    push_series(store, asset_id, SensorType::Voltage, "V", &[230.0; 5]);
}

/// Two overheating transformers, one unmonitored pump, one retired motor.
fn plant() -> (Arc<MemoryStore>, Engine) {
    // ---
    let store = Arc::new(MemoryStore::new());
    store.insert_asset(asset("tx-1", AssetType::Transformer, "plant-1"));
    store.insert_asset(asset("tx-2", AssetType::Transformer, "plant-1"));
    store.insert_asset(asset("pump-1", AssetType::Pump, "plant-1"));

    let mut retired = asset("motor-9", AssetType::Motor, "plant-1");
    retired.status = "decommissioned".to_string();
    retired.current_risk_score = Some(95.0);
    store.insert_asset(retired);

    push_overheating(&store, "tx-1");
    push_overheating(&store, "tx-2");

    let engine = Engine::new(store.clone(), EngineSettings::default());
    (store, engine)
}

#[tokio::test]
async fn risk_scoring_end_to_end() -> Result<()> {
    // ---
    let (store, engine) = plant();

    let score = engine
        .risk
        .calculate_risk_score("tx-1", AssetType::Transformer)
        .await?;

    assert_eq!(score.risk_score, 60.0);
    assert_eq!(score.confidence, 0.11);
    assert_eq!(RiskLevel::from_score(score.risk_score), RiskLevel::High);
    assert_eq!(score.risk_factors.len(), 1);
    assert_eq!(score.risk_factors[0].factor, "High Temperature");
    assert!(score.explanation.starts_with("Risk Level: HIGH (60.0/100)."));

    let registry = store.asset("tx-1").expect("asset registered");
    assert_eq!(registry.current_risk_score, Some(60.0));

    // A first score has nothing to compare against
    let change = engine.risk.assess_change(&score).await?;
    assert_eq!(change.previous_score, None);
    assert!(!change.should_notify);

    let again = engine
        .risk
        .calculate_risk_score("tx-1", AssetType::Transformer)
        .await?;
    let change = engine.risk.assess_change(&again).await?;
    assert_eq!(change.previous_score, Some(60.0));
    assert_eq!(change.delta, Some(0.0));
    assert!(!change.should_notify);

    let latest = engine.risk.get_latest_risk_score("tx-1").await?;
    assert_eq!(latest.map(|s| s.timestamp), Some(again.timestamp));

    let history = engine
        .risk
        .get_risk_score_history("tx-1", None, None, 30)
        .await?;
    assert_eq!(history.len(), 2);
    assert!(history[0].timestamp >= history[1].timestamp);

    Ok(())
}

#[tokio::test]
async fn cold_start_is_not_persisted() -> Result<()> {
    // ---
    let (store, engine) = plant();

    let score = engine
        .risk
        .calculate_risk_score("pump-1", AssetType::Pump)
        .await?;

    assert_eq!(score.risk_score, 15.0);
    assert_eq!(score.confidence, COLD_START_CONFIDENCE);
    assert_eq!(store.risk_score_count(), 0);
    assert_eq!(engine.risk.get_latest_risk_score("pump-1").await?, None);

    Ok(())
}

#[tokio::test]
async fn anomaly_detection_end_to_end() -> Result<()> {
    // ---
    let (store, engine) = plant();

    let result = engine
        .anomalies
        .detect_anomalies("tx-1", AssetType::Transformer)
        .await?;

    assert_eq!(result.total_checked, 11);
    assert_eq!(result.anomalies_detected, 1);
    assert!(result.should_notify());

    let anomaly = &result.anomalies[0];
    assert_eq!(anomaly.metric, SensorType::Temperature);
    assert_eq!(anomaly.severity, Severity::Critical);
    assert_eq!(anomaly.actual_value, 200.0);

    // Too few readings: an empty, successful result
    let quiet = engine
        .anomalies
        .detect_anomalies("pump-1", AssetType::Pump)
        .await?;
    assert_eq!(quiet.anomalies_detected, 0);
    assert!(!quiet.should_notify());

    let stored = engine
        .anomalies
        .get_anomalies_by_asset("tx-1", &AnomalyFilter::default())
        .await?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, anomaly.id);

    let low_only = AnomalyFilter {
        severity: Some(Severity::Low),
        ..AnomalyFilter::default()
    };
    assert!(engine
        .anomalies
        .get_anomalies_by_asset("tx-1", &low_only)
        .await?
        .is_empty());

    assert_eq!(engine.anomalies.get_critical_anomalies(50).await?.len(), 1);
    assert_eq!(store.anomaly_count(), 1);

    Ok(())
}

#[tokio::test]
async fn executive_summary_end_to_end() -> Result<()> {
    // ---
    let (store, engine) = plant();

    for id in ["tx-1", "tx-2"] {
        engine
            .risk
            .calculate_risk_score(id, AssetType::Transformer)
            .await?;
        engine
            .anomalies
            .detect_anomalies(id, AssetType::Transformer)
            .await?;
    }
    engine
        .risk
        .calculate_risk_score("pump-1", AssetType::Pump)
        .await?;

    let summary = engine.summaries.generate_summary("plant-1").await?;

    // The retired motor is excluded; the unscored pump counts as zero risk
    assert_eq!(summary.total_assets, 3);
    assert_eq!(summary.overall_health_score, 60.0);
    assert_eq!(summary.risk_distribution.low, 1);
    assert_eq!(summary.risk_distribution.medium, 2);
    assert_eq!(summary.risk_distribution.total(), 3);
    assert_eq!(summary.critical_anomaly_count, 2);

    assert_eq!(summary.top_risk_assets.len(), 3);
    assert_eq!(summary.top_risk_assets[2].asset_id, "pump-1");

    assert_eq!(summary.trending_issues.len(), 1);
    let issue = &summary.trending_issues[0];
    assert_eq!(issue.issue_type, SensorType::Temperature);
    assert_eq!(issue.affected_asset_count, 2);
    assert_eq!(issue.severity, Severity::Critical);
    assert_eq!(issue.trend, TrendDirection::Increasing);

    assert_eq!(
        summary.recommendations,
        vec![
            "Plant health requires attention. Schedule maintenance for high-risk assets."
                .to_string(),
            "2 critical anomaly(ies) require attention.".to_string(),
            "Trending issue: Elevated temperature detected across 2 assets. Investigate root cause to prevent escalation."
                .to_string(),
        ]
    );

    assert_eq!(store.summary_count(), 1);
    let history = engine.summaries.get_summary_history("plant-1", 30).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].generated_at, summary.generated_at);

    Ok(())
}

#[tokio::test]
async fn summary_for_unknown_plant_is_an_error() {
    // ---
    let (_, engine) = plant();

    let err = engine
        .summaries
        .generate_summary("plant-404")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoAssets { .. }));
    assert_eq!(err.to_string(), "No assets found for plant plant-404");
}

#[tokio::test]
async fn store_outage_surfaces_as_store_error() {
    // ---
    let (store, engine) = plant();
    store.set_unavailable(Some("connection reset"));

    let err = engine
        .risk
        .calculate_risk_score("tx-1", AssetType::Transformer)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));

    let err = engine.summaries.generate_summary("plant-1").await.unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
    assert_eq!(store.summary_count(), 0);
}

#[tokio::test]
async fn stale_score_does_not_overwrite_newer_one() -> Result<()> {
    // ---
    let (store, _) = plant();
    let now = Utc::now();

    assert!(store.update_current_risk_score("tx-1", 70.0, now).await?);
    assert!(
        !store
            .update_current_risk_score("tx-1", 30.0, now - Duration::seconds(5))
            .await?
    );

    let registry = store.asset("tx-1").expect("asset registered");
    assert_eq!(registry.current_risk_score, Some(70.0));
    assert_eq!(registry.risk_scored_at, Some(now));

    Ok(())
}
