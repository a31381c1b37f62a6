//! Risk scoring: features plus asset-type thresholds into a bounded
//! composite score with an ordered, human-readable rationale.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::features::{extract_features, SensorStats};
use super::thresholds::{AssetProfile, Thresholds};
use super::{round_to, EngineSettings};
use crate::error::{EngineResult, StoreResult};
use crate::models::{AssetType, RiskFactor, RiskScore, SensorType};
use crate::store::{HistoryWindow, Store};

/// Confidence returned when an asset has no readings yet.
pub const COLD_START_CONFIDENCE: f64 = 0.3;

/// Sample count at which confidence saturates at 1.
const FULL_CONFIDENCE_SAMPLES: f64 = 100.0;

/// Number of factors cited in the explanation.
const EXPLAINED_FACTORS: usize = 3;

/// Channels in the order their factors are evaluated.
const SCORED_CHANNELS: [SensorType; 5] = [
    SensorType::Temperature,
    SensorType::Voltage,
    SensorType::Vibration,
    SensorType::Current,
    SensorType::Pressure,
];

// ---

/// Coarse label attached to a composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    // ---
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    // ---
    pub fn from_score(score: f64) -> Self {
        // ---
        if score < 30.0 {
            RiskLevel::Low
        } else if score < 60.0 {
            RiskLevel::Medium
        } else if score < 80.0 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    fn summary(&self, asset: &str) -> String {
        // ---
        match self {
            RiskLevel::Low => format!("The {asset} is operating within normal parameters."),
            RiskLevel::Medium => {
                format!("The {asset} shows some concerning indicators that warrant monitoring.")
            }
            RiskLevel::High => {
                format!("The {asset} exhibits significant risk factors requiring attention.")
            }
            RiskLevel::Critical => {
                format!("The {asset} is at critical risk and requires immediate intervention.")
            }
        }
    }
}

/// Comparison of a fresh score with the one stored before it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskChange {
    // ---
    pub previous_score: Option<f64>,
    pub delta: Option<f64>,
    /// Set when the swing exceeds the configured alert delta.
    pub should_notify: bool,
}

// ---

/// Evaluate one channel against its limit.
///
/// Temperature and current are judged on their peak, the other channels on
/// their variability. Each contribution is capped so a single runaway sensor
/// cannot saturate the composite.
fn evaluate_channel(
    sensor: &SensorType,
    stats: &SensorStats,
    limits: &Thresholds,
) -> Option<RiskFactor> {
    // ---
    let (observed, limit, cap, factor) = match sensor {
        SensorType::Temperature => (stats.max, limits.temperature_max, 40.0, "High Temperature"),
        SensorType::Voltage => (stats.std, limits.voltage_std, 30.0, "Voltage Instability"),
        SensorType::Vibration => (stats.std, limits.vibration_std, 35.0, "Excessive Vibration"),
        SensorType::Current => (stats.max, limits.current_max, 30.0, "Current Overload"),
        SensorType::Pressure => (stats.std, limits.pressure_std, 25.0, "Pressure Instability"),
        SensorType::Other(_) => return None,
    };

    if observed <= limit {
        return None;
    }

    let contribution = (((observed - limit) / limit) * 100.0).min(cap);
    let description = match sensor {
        SensorType::Temperature => {
            format!("Maximum temperature ({observed:.1}°C) exceeds safe threshold ({limit}°C)")
        }
        SensorType::Voltage => {
            format!("Voltage variability ({observed:.2}V) indicates unstable power supply")
        }
        SensorType::Vibration => {
            format!("Vibration variability ({observed:.2}) suggests mechanical issues")
        }
        SensorType::Current => {
            format!("Peak current ({observed:.1}A) exceeds rated capacity ({limit}A)")
        }
        SensorType::Pressure => {
            format!("Pressure variability ({observed:.2}) indicates flow issues")
        }
        SensorType::Other(_) => return None,
    };

    Some(RiskFactor {
        factor: factor.to_string(),
        contribution: round_to(contribution, 1),
        description,
    })
}

/// Risk factors fired by `features`, largest contribution first.
///
/// Ties keep channel order (temperature, voltage, vibration, current,
/// pressure). This is the order stored and returned with the score.
pub fn risk_factors(
    features: &BTreeMap<SensorType, SensorStats>,
    limits: &Thresholds,
) -> Vec<RiskFactor> {
    // ---
    let mut factors: Vec<RiskFactor> = SCORED_CHANNELS
        .iter()
        .filter_map(|sensor| {
            features
                .get(sensor)
                .and_then(|stats| evaluate_channel(sensor, stats, limits))
        })
        .collect();
    factors.sort_by(|a, b| b.contribution.total_cmp(&a.contribution));
    factors
}

/// Level label, one-line summary and the leading factors.
///
/// `factors` is expected ranked as [`risk_factors`] returns them.
pub fn explain(score: f64, factors: &[RiskFactor], asset_type: AssetType) -> String {
    // ---
    let level = RiskLevel::from_score(score);
    let mut explanation = format!(
        "Risk Level: {} ({:.1}/100). {}",
        level.as_str(),
        score,
        level.summary(asset_type.label())
    );

    if factors.is_empty() {
        explanation.push_str(" All monitored parameters are within acceptable ranges.");
        return explanation;
    }

    explanation.push_str("\n\nKey Risk Factors:");
    for rf in factors.iter().take(EXPLAINED_FACTORS) {
        explanation.push_str(&format!(
            "\n- {} (+{:.1} points): {}",
            rf.factor, rf.contribution, rf.description
        ));
    }
    explanation
}

// ---

/// Computes, stores and reads back per-asset risk scores.
#[derive(Clone)]
pub struct RiskScoringService {
    // ---
    store: Arc<dyn Store>,
    settings: EngineSettings,
}

impl RiskScoringService {
    // ---
    pub fn new(store: Arc<dyn Store>, settings: EngineSettings) -> Self {
        Self { store, settings }
    }

    /// Score an asset from its most recent readings and persist the result.
    ///
    /// The asset is assumed to exist. With no readings at all the type's base
    /// score is returned with low confidence and nothing is stored.
    pub async fn calculate_risk_score(
        &self,
        asset_id: &str,
        asset_type: AssetType,
    ) -> EngineResult<RiskScore> {
        // ---
        let score = self
            .score(asset_id, asset_type)
            .await
            .inspect_err(|e| error!("Error calculating risk score for asset {}: {}", asset_id, e))?;
        Ok(score)
    }

    async fn score(&self, asset_id: &str, asset_type: AssetType) -> StoreResult<RiskScore> {
        // ---
        let profile = AssetProfile::for_type(asset_type);
        let readings = self
            .store
            .recent_readings(asset_id, self.settings.reading_window)
            .await?;

        if readings.is_empty() {
            debug!("No readings for asset {}, returning baseline", asset_id);
            return Ok(RiskScore {
                asset_id: asset_id.to_string(),
                risk_score: profile.base_risk,
                timestamp: Utc::now(),
                explanation: format!(
                    "Baseline risk score for {}. No sensor data available yet.",
                    asset_type.label()
                ),
                risk_factors: Vec::new(),
                confidence: COLD_START_CONFIDENCE,
            });
        }

        let features = extract_features(&readings);
        let factors = risk_factors(&features, &profile.thresholds);
        debug!(
            "Asset {}: {} channels, {} risk factors",
            asset_id,
            features.len(),
            factors.len()
        );

        let total: f64 = factors.iter().map(|rf| rf.contribution).sum();
        let risk_score = round_to((profile.base_risk + total).clamp(0.0, 100.0), 1);
        let confidence = round_to(
            (readings.len() as f64 / FULL_CONFIDENCE_SAMPLES).min(1.0),
            2,
        );

        let result = RiskScore {
            asset_id: asset_id.to_string(),
            risk_score,
            timestamp: Utc::now(),
            explanation: explain(risk_score, &factors, asset_type),
            risk_factors: factors,
            confidence,
        };

        self.store.append_risk_score(&result).await?;
        let applied = self
            .store
            .update_current_risk_score(asset_id, result.risk_score, result.timestamp)
            .await?;
        if !applied {
            debug!(
                "Current risk score for asset {} not updated: a newer computation is recorded",
                asset_id
            );
        }

        info!("Stored risk score {} for asset {}", result.risk_score, asset_id);
        Ok(result)
    }

    /// Second most recent stored score, if at least two exist.
    pub async fn get_previous_risk_score(&self, asset_id: &str) -> EngineResult<Option<f64>> {
        // ---
        let window = HistoryWindow {
            offset: 1,
            ..HistoryWindow::latest(1)
        };
        let scores = self.store.risk_score_history(asset_id, &window).await?;
        Ok(scores.first().map(|s| s.risk_score))
    }

    /// Most recent stored score for the asset.
    pub async fn get_latest_risk_score(&self, asset_id: &str) -> EngineResult<Option<RiskScore>> {
        // ---
        let scores = self
            .store
            .risk_score_history(asset_id, &HistoryWindow::latest(1))
            .await?;
        Ok(scores.into_iter().next())
    }

    pub async fn get_risk_score_history(
        &self,
        asset_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: u32,
    ) -> EngineResult<Vec<RiskScore>> {
        // ---
        let window = HistoryWindow {
            start,
            end,
            offset: 0,
            limit,
        };
        Ok(self.store.risk_score_history(asset_id, &window).await?)
    }

    /// Compare `current` with the score stored before it.
    pub async fn assess_change(&self, current: &RiskScore) -> EngineResult<RiskChange> {
        // ---
        let previous = self.get_previous_risk_score(&current.asset_id).await?;
        let delta = previous.map(|p| (current.risk_score - p).abs());
        let should_notify = delta.is_some_and(|d| d > self.settings.risk_change_alert_delta);

        if let (true, Some(prev), Some(d)) = (should_notify, previous, delta) {
            warn!(
                "Significant risk change detected for asset {}: {} -> {} (Δ{:.1})",
                current.asset_id, prev, current.risk_score, d
            );
        }

        Ok(RiskChange {
            previous_score: previous,
            delta,
            should_notify,
        })
    }
}
