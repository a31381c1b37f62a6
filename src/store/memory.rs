//! In-process [`Store`] backend.
//!
//! Tables are plain vectors behind `RwLock`s; nothing survives a restart.
//! Locks are never held across an `.await`.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{AnomalyQuery, HistoryWindow, Store};
use crate::error::{StoreError, StoreResult};
use crate::models::{
    Anomaly, Asset, AssetRiskSummary, ExecutiveSummary, RiskScore, SensorReading,
};

// ---

#[derive(Default)]
struct Tables {
    // ---
    assets: Vec<Asset>,
    readings: Vec<SensorReading>,
    risk_scores: Vec<RiskScore>,
    anomalies: Vec<Anomaly>,
    summaries: Vec<ExecutiveSummary>,
}

/// Volatile store for tests and embedded use.
///
/// `set_unavailable` makes every trait call fail with
/// [`StoreError::Unavailable`], which lets callers exercise the
/// storage-failure path without a database.
#[derive(Default)]
pub struct MemoryStore {
    // ---
    tables: RwLock<Tables>,
    outage: RwLock<Option<String>>,
}

impl MemoryStore {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace an asset.
    pub fn insert_asset(&self, asset: Asset) {
        // ---
        let mut tables = self.write();
        tables.assets.retain(|a| a.id != asset.id);
        tables.assets.push(asset);
    }

    /// Append a raw reading, as ingestion would.
    pub fn push_reading(&self, reading: SensorReading) {
        self.write().readings.push(reading);
    }

    pub fn push_readings(&self, readings: impl IntoIterator<Item = SensorReading>) {
        self.write().readings.extend(readings);
    }

    /// Simulate a backend outage (`Some`) or recover from one (`None`).
    pub fn set_unavailable(&self, reason: Option<&str>) {
        // ---
        let mut outage = self.outage.write().unwrap_or_else(|e| e.into_inner());
        *outage = reason.map(str::to_string);
    }

    /// Snapshot of a registry entry, bypassing outage simulation.
    pub fn asset(&self, asset_id: &str) -> Option<Asset> {
        self.read().assets.iter().find(|a| a.id == asset_id).cloned()
    }

    pub fn anomaly_count(&self) -> usize {
        self.read().anomalies.len()
    }

    pub fn risk_score_count(&self) -> usize {
        self.read().risk_scores.len()
    }

    pub fn summary_count(&self) -> usize {
        self.read().summaries.len()
    }

    // ---

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }

    fn check_available(&self) -> StoreResult<()> {
        // ---
        let outage = self.outage.read().unwrap_or_else(|e| e.into_inner());
        match outage.as_ref() {
            Some(reason) => Err(StoreError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

fn matches(anomaly: &Anomaly, query: &AnomalyQuery, plant_assets: Option<&[String]>) -> bool {
    // ---
    query
        .asset_id
        .as_ref()
        .map_or(true, |id| &anomaly.asset_id == id)
        && plant_assets.map_or(true, |ids| ids.contains(&anomaly.asset_id))
        && query.severity.map_or(true, |s| anomaly.severity == s)
        && query.status.map_or(true, |s| anomaly.status == s)
        && query.start.map_or(true, |t| anomaly.timestamp >= t)
        && query.end.map_or(true, |t| anomaly.timestamp <= t)
        && query.detected_since.map_or(true, |t| anomaly.detected_at > t)
}

#[async_trait]
impl Store for MemoryStore {
    // ---
    async fn recent_readings(
        &self,
        asset_id: &str,
        limit: u32,
    ) -> StoreResult<Vec<SensorReading>> {
        // ---
        self.check_available()?;
        let tables = self.read();

        // Newest insert wins ties on timestamp.
        let mut readings: Vec<SensorReading> = tables
            .readings
            .iter()
            .rev()
            .filter(|r| r.asset_id == asset_id)
            .cloned()
            .collect();
        readings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        readings.truncate(limit as usize);
        Ok(readings)
    }

    async fn find_asset(&self, asset_id: &str) -> StoreResult<Option<Asset>> {
        self.check_available()?;
        Ok(self.asset(asset_id))
    }

    async fn append_risk_score(&self, score: &RiskScore) -> StoreResult<()> {
        // ---
        self.check_available()?;
        self.write().risk_scores.push(score.clone());
        Ok(())
    }

    async fn update_current_risk_score(
        &self,
        asset_id: &str,
        score: f64,
        computed_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        // ---
        self.check_available()?;
        let mut tables = self.write();
        let Some(asset) = tables.assets.iter_mut().find(|a| a.id == asset_id) else {
            return Ok(false);
        };

        if asset.risk_scored_at.is_some_and(|at| at > computed_at) {
            return Ok(false);
        }
        asset.current_risk_score = Some(score);
        asset.risk_scored_at = Some(computed_at);
        Ok(true)
    }

    async fn risk_score_history(
        &self,
        asset_id: &str,
        window: &HistoryWindow,
    ) -> StoreResult<Vec<RiskScore>> {
        // ---
        self.check_available()?;
        let tables = self.read();

        let mut scores: Vec<RiskScore> = tables
            .risk_scores
            .iter()
            .rev()
            .filter(|s| s.asset_id == asset_id)
            .filter(|s| window.start.map_or(true, |t| s.timestamp >= t))
            .filter(|s| window.end.map_or(true, |t| s.timestamp <= t))
            .cloned()
            .collect();
        scores.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(scores
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .collect())
    }

    async fn append_anomaly(&self, anomaly: &Anomaly) -> StoreResult<()> {
        // ---
        self.check_available()?;
        self.write().anomalies.push(anomaly.clone());
        Ok(())
    }

    async fn query_anomalies(&self, query: &AnomalyQuery) -> StoreResult<Vec<Anomaly>> {
        // ---
        self.check_available()?;
        let tables = self.read();

        let plant_assets: Option<Vec<String>> = query.plant_id.as_ref().map(|plant| {
            tables
                .assets
                .iter()
                .filter(|a| &a.plant_id == plant)
                .map(|a| a.id.clone())
                .collect()
        });

        let mut anomalies: Vec<Anomaly> = tables
            .anomalies
            .iter()
            .rev()
            .filter(|a| matches(a, query, plant_assets.as_deref()))
            .cloned()
            .collect();
        anomalies.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        if let Some(limit) = query.limit {
            anomalies.truncate(limit as usize);
        }
        Ok(anomalies)
    }

    async fn list_assets_for_plant(&self, plant_id: &str) -> StoreResult<Vec<AssetRiskSummary>> {
        // ---
        self.check_available()?;
        let tables = self.read();

        let mut assets: Vec<AssetRiskSummary> = tables
            .assets
            .iter()
            .filter(|a| a.plant_id == plant_id && !a.is_decommissioned())
            .map(|a| AssetRiskSummary {
                asset_id: a.id.clone(),
                asset_name: a.name.clone(),
                asset_type: a.asset_type,
                risk_score: a.current_risk_score.unwrap_or(0.0),
                status: a.status.clone(),
                location: a.location.clone().unwrap_or_else(|| "Unknown".to_string()),
            })
            .collect();
        assets.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
        Ok(assets)
    }

    async fn append_executive_summary(&self, summary: &ExecutiveSummary) -> StoreResult<()> {
        // ---
        self.check_available()?;
        self.write().summaries.push(summary.clone());
        Ok(())
    }

    async fn executive_summary_history(
        &self,
        plant_id: &str,
        limit: u32,
    ) -> StoreResult<Vec<ExecutiveSummary>> {
        // ---
        self.check_available()?;
        let tables = self.read();

        let mut history: Vec<ExecutiveSummary> = tables
            .summaries
            .iter()
            .rev()
            .filter(|s| s.plant_id == plant_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        history.truncate(limit as usize);
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{AssetType, SensorType};
    use chrono::Duration;

    fn asset(id: &str, plant: &str) -> Asset {
        // ---
        Asset {
            id: id.to_string(),
            name: format!("Asset {id}"),
            asset_type: AssetType::Motor,
            plant_id: plant.to_string(),
            location: None,
            status: "active".to_string(),
            current_risk_score: None,
            risk_scored_at: None,
        }
    }

    fn reading(asset_id: &str, at: DateTime<Utc>, value: f64) -> SensorReading {
        // ---
        SensorReading {
            asset_id: asset_id.to_string(),
            timestamp: at,
            sensor_type: SensorType::Temperature,
            value,
            unit: "°C".to_string(),
        }
    }

    #[test]
    fn test_recent_readings_newest_first_and_limited() {
        // ---
        let store = MemoryStore::new();
        let base = Utc::now();
        for i in 0..5 {
            store.push_reading(reading("a1", base + Duration::seconds(i), i as f64));
        }
        store.push_reading(reading("a2", base, 99.0));

        let readings = tokio_test::block_on(store.recent_readings("a1", 3)).unwrap();
        let values: Vec<f64> = readings.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![4.0, 3.0, 2.0]);
    }

    #[test]
    fn test_current_score_update_rejects_older_computation() {
        // ---
        let store = MemoryStore::new();
        store.insert_asset(asset("a1", "p1"));
        let now = Utc::now();

        let applied =
            tokio_test::block_on(store.update_current_risk_score("a1", 55.0, now)).unwrap();
        assert!(applied);

        let stale = now - Duration::seconds(5);
        let applied =
            tokio_test::block_on(store.update_current_risk_score("a1", 10.0, stale)).unwrap();
        assert!(!applied);
        assert_eq!(store.asset("a1").unwrap().current_risk_score, Some(55.0));
    }

    #[test]
    fn test_update_for_unknown_asset_is_not_applied() {
        // ---
        let store = MemoryStore::new();
        let applied =
            tokio_test::block_on(store.update_current_risk_score("ghost", 1.0, Utc::now()))
                .unwrap();
        assert!(!applied);
    }

    #[test]
    fn test_plant_listing_skips_decommissioned_and_sorts_by_risk() {
        // ---
        let store = MemoryStore::new();
        let mut low = asset("low", "p1");
        low.current_risk_score = Some(12.0);
        let mut high = asset("high", "p1");
        high.current_risk_score = Some(70.0);
        let mut retired = asset("retired", "p1");
        retired.status = crate::models::DECOMMISSIONED.to_string();
        store.insert_asset(low);
        store.insert_asset(asset("unscored", "p1"));
        store.insert_asset(high);
        store.insert_asset(retired);
        store.insert_asset(asset("elsewhere", "p2"));

        let listed = tokio_test::block_on(store.list_assets_for_plant("p1")).unwrap();
        let ids: Vec<&str> = listed.iter().map(|a| a.asset_id.as_str()).collect();
        assert_eq!(ids, vec!["high", "low", "unscored"]);
        assert_eq!(listed[2].risk_score, 0.0);
        assert_eq!(listed[2].location, "Unknown");
    }

    #[test]
    fn test_outage_fails_every_call() {
        // ---
        let store = MemoryStore::new();
        store.set_unavailable(Some("connection refused"));
        let err = tokio_test::block_on(store.recent_readings("a1", 10)).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        store.set_unavailable(None);
        assert!(tokio_test::block_on(store.recent_readings("a1", 10)).is_ok());
    }
}
