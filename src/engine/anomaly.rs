//! Anomaly detection: dual z-score / IQR test on each channel's newest
//! reading, with severity rated by percent deviation from the channel mean.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::features::{group_by_sensor, SensorStats};
use super::thresholds::critical_deviation_percent;
use super::EngineSettings;
use crate::error::{EngineResult, StoreResult};
use crate::models::{
    Anomaly, AnomalyDetectionResult, AnomalyStatus, AssetType, SensorReading, SensorType, Severity,
};
use crate::store::{AnomalyQuery, Store};

/// Below this many readings in total, detection is skipped.
pub const MIN_READINGS: usize = 10;

/// Channels with fewer readings than this are not examined.
pub const MIN_CHANNEL_READINGS: usize = 5;

const Z_SCORE_THRESHOLD: f64 = 2.5;
const IQR_MULTIPLIER: f64 = 1.5;

/// Percent deviation recorded when the channel mean is exactly zero and the
/// relative deviation is undefined.
pub const ZERO_MEAN_DEVIATION_PERCENT: f64 = 1000.0;

// ---

/// Optional filters for [`AnomalyDetectionService::get_anomalies_by_asset`].
#[derive(Debug, Clone, Default)]
pub struct AnomalyFilter {
    // ---
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub severity: Option<Severity>,
    pub limit: Option<u32>,
}

/// Rate a percent deviation against the channel's critical limit.
pub fn classify_severity(deviation_percent: f64, sensor: &SensorType) -> Severity {
    // ---
    let critical = critical_deviation_percent(sensor);
    if deviation_percent >= critical * 1.5 {
        Severity::Critical
    } else if deviation_percent >= critical {
        Severity::High
    } else if deviation_percent >= critical * 0.5 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Signed percent deviation of `actual` from `mean`, `None` if `mean` is 0.
fn percent_deviation(actual: f64, mean: f64) -> Option<f64> {
    // ---
    if mean == 0.0 {
        return None;
    }
    Some((actual - mean) / mean * 100.0)
}

/// Interquartile outlier bounds, quartiles taken by rank.
fn iqr_bounds(values: &[f64]) -> (f64, f64) {
    // ---
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let q1 = sorted[n / 4];
    let q3 = sorted[(n * 3) / 4];
    let iqr = q3 - q1;
    (q1 - IQR_MULTIPLIER * iqr, q3 + IQR_MULTIPLIER * iqr)
}

fn describe(sensor: &SensorType, actual: f64, expected: f64, deviation: f64, unit: &str) -> String {
    // ---
    let direction = if actual > expected { "above" } else { "below" };
    format!(
        "{} reading of {:.2}{} is {:.1}% {} expected value of {:.2}{}",
        sensor.title(),
        actual,
        unit,
        deviation,
        direction,
        expected,
        unit
    )
}

/// Examine the newest reading of one channel.
///
/// `group` is most-recent-first and holds at least one reading.
fn check_channel(
    asset_id: &str,
    sensor: &SensorType,
    group: &[&SensorReading],
    detected_at: DateTime<Utc>,
) -> Option<Anomaly> {
    // ---
    let latest = group.first()?;
    let values: Vec<f64> = group.iter().map(|r| r.value).collect();
    let stats = SensorStats::from_values(&values)?;
    let (lower, upper) = iqr_bounds(&values);

    let z_score = if stats.std > 0.0 {
        ((latest.value - stats.mean) / stats.std).abs()
    } else {
        0.0
    };
    let is_outlier = latest.value < lower || latest.value > upper;

    if z_score <= Z_SCORE_THRESHOLD && !is_outlier {
        return None;
    }

    let deviation = match percent_deviation(latest.value, stats.mean) {
        Some(pct) => pct.abs(),
        None => {
            warn!(
                "Asset {} {} channel has zero mean; recording deviation as {}%",
                asset_id, sensor, ZERO_MEAN_DEVIATION_PERCENT
            );
            ZERO_MEAN_DEVIATION_PERCENT
        }
    };

    debug!(
        "Asset {} {}: value {} z={:.2} outlier={} deviation={:.1}%",
        asset_id, sensor, latest.value, z_score, is_outlier, deviation
    );

    Some(Anomaly {
        id: Uuid::new_v4(),
        asset_id: asset_id.to_string(),
        timestamp: latest.timestamp,
        detected_at,
        severity: classify_severity(deviation, sensor),
        metric: sensor.clone(),
        expected_value: stats.mean,
        actual_value: latest.value,
        deviation,
        description: describe(sensor, latest.value, stats.mean, deviation, &latest.unit),
        status: AnomalyStatus::Open,
    })
}

/// Flags outlier readings, stores them, and serves anomaly read queries.
#[derive(Clone)]
pub struct AnomalyDetectionService {
    // ---
    store: Arc<dyn Store>,
    settings: EngineSettings,
}

impl AnomalyDetectionService {
    // ---
    pub fn new(store: Arc<dyn Store>, settings: EngineSettings) -> Self {
        Self { store, settings }
    }

    /// Check each channel's newest reading and persist what is flagged.
    ///
    /// `asset_type` does not change the thresholds today; severity limits
    /// are per channel only.
    pub async fn detect_anomalies(
        &self,
        asset_id: &str,
        asset_type: AssetType,
    ) -> EngineResult<AnomalyDetectionResult> {
        // ---
        let result = self
            .detect(asset_id)
            .await
            .inspect_err(|e| error!("Error detecting anomalies for asset {}: {}", asset_id, e))?;

        info!(
            "Detected {} anomalies for {} {}",
            result.anomalies_detected,
            asset_type.label(),
            asset_id
        );
        if result.should_notify() {
            let critical = result
                .anomalies
                .iter()
                .filter(|a| a.severity == Severity::Critical)
                .count();
            warn!(
                "Critical anomalies detected for asset {}: {} anomalies",
                asset_id, critical
            );
        }
        Ok(result)
    }

    async fn detect(&self, asset_id: &str) -> StoreResult<AnomalyDetectionResult> {
        // ---
        let readings = self
            .store
            .recent_readings(asset_id, self.settings.reading_window)
            .await?;

        if readings.len() < MIN_READINGS {
            info!("Insufficient data for anomaly detection on asset {}", asset_id);
            return Ok(AnomalyDetectionResult::empty());
        }

        let detected_at = Utc::now();
        let anomalies: Vec<Anomaly> = group_by_sensor(&readings)
            .iter()
            .filter(|(_, group)| group.len() >= MIN_CHANNEL_READINGS)
            .filter_map(|(sensor, group)| check_channel(asset_id, sensor, group, detected_at))
            .collect();

        for anomaly in &anomalies {
            self.store.append_anomaly(anomaly).await?;
        }

        Ok(AnomalyDetectionResult {
            anomalies_detected: anomalies.len(),
            anomalies,
            total_checked: readings.len(),
        })
    }

    /// Stored anomalies for one asset, newest reading first.
    pub async fn get_anomalies_by_asset(
        &self,
        asset_id: &str,
        filter: &AnomalyFilter,
    ) -> EngineResult<Vec<Anomaly>> {
        // ---
        let query = AnomalyQuery {
            asset_id: Some(asset_id.to_string()),
            severity: filter.severity,
            start: filter.start_date,
            end: filter.end_date,
            limit: filter.limit,
            ..AnomalyQuery::default()
        };
        Ok(self.store.query_anomalies(&query).await?)
    }

    /// Open critical anomalies across all assets, newest first.
    pub async fn get_critical_anomalies(&self, limit: u32) -> EngineResult<Vec<Anomaly>> {
        // ---
        let query = AnomalyQuery {
            severity: Some(Severity::Critical),
            status: Some(AnomalyStatus::Open),
            limit: Some(limit),
            ..AnomalyQuery::default()
        };
        Ok(self.store.query_anomalies(&query).await?)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Duration;

    /// Push `values` oldest first, so the last value is the newest reading.
    fn push_series(store: &MemoryStore, asset_id: &str, sensor: SensorType, values: &[f64]) {
        // ---
        let start = Utc::now() - Duration::hours(2);
        store.push_readings(values.iter().enumerate().map(|(i, v)| SensorReading {
            asset_id: asset_id.to_string(),
            timestamp: start + Duration::minutes(i as i64),
            sensor_type: sensor.clone(),
            value: *v,
            unit: "u".to_string(),
        }));
    }

    fn service(store: Arc<MemoryStore>) -> AnomalyDetectionService {
        AnomalyDetectionService::new(store, EngineSettings::default())
    }

    fn with_latest(history: &[f64], latest: f64) -> Vec<f64> {
        // ---
        let mut values = history.to_vec();
        values.push(latest);
        values
    }

    #[tokio::test]
    async fn test_fewer_than_ten_readings_is_empty_success() {
        // ---
        let store = Arc::new(MemoryStore::new());
        push_series(&store, "a1", SensorType::Temperature, &[70.0, 70.0, 70.0, 70.0, 500.0]);
        push_series(&store, "a1", SensorType::Voltage, &[230.0, 230.0, 230.0, 230.0]);

        let result = service(store.clone())
            .detect_anomalies("a1", AssetType::Transformer)
            .await
            .unwrap();
        assert_eq!(result.anomalies_detected, 0);
        assert_eq!(result.total_checked, 0);
        assert_eq!(store.anomaly_count(), 0);
    }

    #[tokio::test]
    async fn test_temperature_spike_is_critical() {
        // ---
        let store = Arc::new(MemoryStore::new());
        push_series(
            &store,
            "a1",
            SensorType::Temperature,
            &[70.0, 72.0, 71.0, 71.0, 70.0, 200.0],
        );
        push_series(&store, "a1", SensorType::Voltage, &[230.0; 5]);

        let result = service(store.clone())
            .detect_anomalies("a1", AssetType::Transformer)
            .await
            .unwrap();

        assert_eq!(result.total_checked, 11);
        assert_eq!(result.anomalies_detected, 1);
        let anomaly = &result.anomalies[0];
        assert_eq!(anomaly.metric, SensorType::Temperature);
        assert_eq!(anomaly.severity, Severity::Critical);
        assert_eq!(anomaly.actual_value, 200.0);
        assert_eq!(anomaly.status, AnomalyStatus::Open);
        assert!(anomaly.deviation > 100.0);
        assert!(anomaly.description.starts_with("Temperature reading of 200.00u is"));
        assert!(anomaly.description.contains("above expected value of 92.33u"));
        assert!(result.should_notify());
        assert_eq!(store.anomaly_count(), 1);
    }

    #[tokio::test]
    async fn test_only_newest_reading_is_examined() {
        // ---
        let store = Arc::new(MemoryStore::new());
        // The spike is old; the newest value is ordinary.
        push_series(
            &store,
            "a1",
            SensorType::Vibration,
            &[2.0, 500.0, 2.1, 1.9, 2.0, 2.0, 2.1, 1.9, 2.0, 2.0],
        );

        let result = service(store)
            .detect_anomalies("a1", AssetType::Motor)
            .await
            .unwrap();
        assert_eq!(result.anomalies_detected, 0);
        assert_eq!(result.total_checked, 10);
    }

    #[tokio::test]
    async fn test_small_channels_are_skipped() {
        // ---
        let store = Arc::new(MemoryStore::new());
        push_series(&store, "a1", SensorType::Voltage, &[230.0; 8]);
        push_series(&store, "a1", SensorType::Current, &[10.0, 10.0, 10.0, 900.0]);

        let result = service(store)
            .detect_anomalies("a1", AssetType::Generator)
            .await
            .unwrap();
        assert_eq!(result.total_checked, 12);
        assert_eq!(result.anomalies_detected, 0);
    }

    #[tokio::test]
    async fn test_drop_below_mean_has_positive_deviation() {
        // ---
        let store = Arc::new(MemoryStore::new());
        push_series(
            &store,
            "a1",
            SensorType::Pressure,
            &with_latest(&[100.0; 9], 10.0),
        );

        let result = service(store)
            .detect_anomalies("a1", AssetType::Pump)
            .await
            .unwrap();
        let anomaly = &result.anomalies[0];
        assert!(anomaly.deviation >= 0.0);
        assert_eq!(anomaly.severity, Severity::Critical);
        assert!(anomaly.description.contains("below expected value"));
    }

    #[tokio::test]
    async fn test_small_outlier_is_low_severity() {
        // ---
        let store = Arc::new(MemoryStore::new());
        push_series(
            &store,
            "a1",
            SensorType::Temperature,
            &with_latest(&[100.0; 9], 103.0),
        );

        let result = service(store)
            .detect_anomalies("a1", AssetType::Transformer)
            .await
            .unwrap();
        assert_eq!(result.anomalies_detected, 1);
        assert_eq!(result.anomalies[0].severity, Severity::Low);
        assert!(!result.should_notify());
    }

    #[tokio::test]
    async fn test_zero_mean_channel_uses_ceiling() {
        // ---
        let store = Arc::new(MemoryStore::new());
        push_series(
            &store,
            "a1",
            SensorType::Pressure,
            &with_latest(&[-0.5; 9], 4.5),
        );

        let result = service(store)
            .detect_anomalies("a1", AssetType::Pump)
            .await
            .unwrap();
        let anomaly = &result.anomalies[0];
        assert_eq!(anomaly.expected_value, 0.0);
        assert_eq!(anomaly.deviation, ZERO_MEAN_DEVIATION_PERCENT);
        assert_eq!(anomaly.severity, Severity::Critical);
    }

    #[tokio::test]
    async fn test_non_finite_reading_is_not_flagged() {
        // ---
        let store = Arc::new(MemoryStore::new());
        let steady = [70.0, 72.0, 71.0, 71.0, 70.0, 71.0, 72.0, 70.0, 71.0, 71.0];
        push_series(
            &store,
            "a1",
            SensorType::Temperature,
            &with_latest(&steady, f64::NAN),
        );

        let result = service(store.clone())
            .detect_anomalies("a1", AssetType::Transformer)
            .await
            .unwrap();
        assert_eq!(result.total_checked, 11);
        assert_eq!(result.anomalies_detected, 0);
        assert_eq!(store.anomaly_count(), 0);
    }

    #[test]
    fn test_severity_bands() {
        // ---
        let t = SensorType::Temperature;
        assert_eq!(classify_severity(30.0, &t), Severity::Critical);
        assert_eq!(classify_severity(29.9, &t), Severity::High);
        assert_eq!(classify_severity(20.0, &t), Severity::High);
        assert_eq!(classify_severity(10.0, &t), Severity::Medium);
        assert_eq!(classify_severity(9.9, &t), Severity::Low);

        let other = SensorType::Other("flow".into());
        assert_eq!(classify_severity(37.5, &other), Severity::Critical);
        assert_eq!(classify_severity(12.4, &other), Severity::Low);
    }

    #[test]
    fn test_iqr_bounds_by_rank() {
        // ---
        let (lower, upper) = iqr_bounds(&[200.0, 70.0, 70.0, 71.0, 71.0, 72.0]);
        // sorted: 70 70 71 71 72 200 -> q1 = 70, q3 = 72
        assert_eq!(lower, 67.0);
        assert_eq!(upper, 75.0);
    }

    #[tokio::test]
    async fn test_read_queries_filter_and_limit() {
        // ---
        let store = Arc::new(MemoryStore::new());
        push_series(
            &store,
            "a1",
            SensorType::Temperature,
            &with_latest(&[100.0; 9], 300.0),
        );
        push_series(
            &store,
            "a2",
            SensorType::Temperature,
            &with_latest(&[100.0; 9], 103.0),
        );
        let svc = service(store);
        svc.detect_anomalies("a1", AssetType::Motor).await.unwrap();
        svc.detect_anomalies("a2", AssetType::Motor).await.unwrap();

        let critical = svc.get_critical_anomalies(50).await.unwrap();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].asset_id, "a1");

        let filter = AnomalyFilter {
            severity: Some(Severity::Low),
            ..AnomalyFilter::default()
        };
        assert!(svc.get_anomalies_by_asset("a1", &filter).await.unwrap().is_empty());
        let all = svc
            .get_anomalies_by_asset("a2", &AnomalyFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].severity, Severity::Low);
    }
}
