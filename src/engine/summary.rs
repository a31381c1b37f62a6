//! Executive summary: a pull-based aggregation over stored outputs.
//!
//! Nothing here calls the risk or anomaly services. The summary reads the
//! current risk scores denormalized on the registry and the open anomaly
//! rows, so stale or missing results are tolerated rather than recomputed.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info};

use super::round_to;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Anomaly, AnomalyStatus, AssetRiskSummary, ExecutiveSummary, RiskDistribution, SensorType,
    Severity, TrendDirection, TrendingIssue,
};
use crate::store::{AnomalyQuery, Store};

const TOP_RISK_ASSETS: usize = 10;
const MAX_TRENDING_ISSUES: usize = 5;
const MIN_AFFECTED_ASSETS: usize = 2;
const CRITICAL_WINDOW_DAYS: i64 = 7;
const TRENDING_WINDOW_DAYS: i64 = 30;

// ---

/// Health score: 100 minus the mean risk, to one decimal. 100 for no assets.
pub fn overall_health_score(assets: &[AssetRiskSummary]) -> f64 {
    // ---
    if assets.is_empty() {
        return 100.0;
    }
    let total: f64 = assets.iter().map(|a| a.risk_score).sum();
    round_to(100.0 - total / assets.len() as f64, 1)
}

/// Bucket assets by current risk: low <= 30 < medium <= 60 < high <= 80 < critical.
pub fn risk_distribution(assets: &[AssetRiskSummary]) -> RiskDistribution {
    // ---
    let mut distribution = RiskDistribution::default();
    for asset in assets {
        match asset.risk_score {
            s if s <= 30.0 => distribution.low += 1,
            s if s <= 60.0 => distribution.medium += 1,
            s if s <= 80.0 => distribution.high += 1,
            _ => distribution.critical += 1,
        }
    }
    distribution
}

/// Highest-risk assets first, at most `limit`.
pub fn top_risk_assets(assets: &[AssetRiskSummary], limit: usize) -> Vec<AssetRiskSummary> {
    // ---
    let mut ranked = assets.to_vec();
    ranked.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
    ranked.truncate(limit);
    ranked
}

/// Classify an issue from its detection span and occurrence count.
///
/// Anything younger than a week counts as increasing; older patterns are
/// judged by occurrences per day.
pub fn classify_trend(
    first_detected: DateTime<Utc>,
    last_detected: DateTime<Utc>,
    occurrences: usize,
) -> TrendDirection {
    // ---
    let days = (last_detected - first_detected).num_milliseconds() as f64 / 86_400_000.0;
    if days < 7.0 {
        return TrendDirection::Increasing;
    }

    let rate = occurrences as f64 / days;
    if rate > 0.33 {
        TrendDirection::Increasing
    } else if rate > 0.1 {
        TrendDirection::Stable
    } else {
        TrendDirection::Decreasing
    }
}

fn describe_issue(metric: &SensorType, affected: usize) -> String {
    // ---
    match metric {
        SensorType::Temperature => {
            format!("Elevated temperature detected across {affected} assets")
        }
        SensorType::Voltage => format!("Voltage fluctuations affecting {affected} assets"),
        SensorType::Current => format!("Current anomalies observed in {affected} assets"),
        SensorType::Vibration => format!("Abnormal vibration patterns in {affected} assets"),
        SensorType::Pressure => format!("Pressure irregularities detected in {affected} assets"),
        SensorType::Other(name) => format!("{name} issues affecting {affected} assets"),
    }
}

struct IssueGroup<'a> {
    // ---
    assets: HashSet<&'a str>,
    occurrences: usize,
    first_detected: DateTime<Utc>,
    last_detected: DateTime<Utc>,
}

/// Patterns shared by at least two assets, grouped by (metric, severity).
///
/// Ranked by affected asset count, then by occurrence count.
pub fn trending_issues(anomalies: &[Anomaly]) -> Vec<TrendingIssue> {
    // ---
    let mut groups: BTreeMap<(SensorType, Severity), IssueGroup<'_>> = BTreeMap::new();
    for anomaly in anomalies {
        let group = groups
            .entry((anomaly.metric.clone(), anomaly.severity))
            .or_insert_with(|| IssueGroup {
                assets: HashSet::new(),
                occurrences: 0,
                first_detected: anomaly.detected_at,
                last_detected: anomaly.detected_at,
            });
        group.assets.insert(anomaly.asset_id.as_str());
        group.occurrences += 1;
        group.first_detected = group.first_detected.min(anomaly.detected_at);
        group.last_detected = group.last_detected.max(anomaly.detected_at);
    }

    let mut ranked: Vec<((SensorType, Severity), IssueGroup<'_>)> = groups
        .into_iter()
        .filter(|(_, g)| g.assets.len() >= MIN_AFFECTED_ASSETS)
        .collect();
    ranked.sort_by(|(_, a), (_, b)| {
        b.assets
            .len()
            .cmp(&a.assets.len())
            .then(b.occurrences.cmp(&a.occurrences))
    });

    ranked
        .into_iter()
        .take(MAX_TRENDING_ISSUES)
        .map(|((metric, severity), group)| TrendingIssue {
            description: describe_issue(&metric, group.assets.len()),
            affected_asset_count: group.assets.len(),
            severity,
            trend: classify_trend(group.first_detected, group.last_detected, group.occurrences),
            first_detected: group.first_detected,
            last_detected: group.last_detected,
            issue_type: metric,
        })
        .collect()
}

/// Ordered recommendation lines built from fixed rules.
pub fn recommendations(
    health_score: f64,
    distribution: &RiskDistribution,
    critical_anomaly_count: usize,
    issues: &[TrendingIssue],
) -> Vec<String> {
    // ---
    let mut lines = Vec::new();

    let health_line = if health_score < 50.0 {
        "URGENT: Plant health is critically low. Immediate action required across multiple assets."
    } else if health_score < 70.0 {
        "Plant health requires attention. Schedule maintenance for high-risk assets."
    } else if health_score < 85.0 {
        "Plant health is fair. Monitor high-risk assets closely."
    } else {
        "Plant health is good. Continue regular monitoring and preventive maintenance."
    };
    lines.push(health_line.to_string());

    if distribution.critical > 0 {
        lines.push(format!(
            "{} asset(s) in critical risk state. Prioritize immediate inspection and maintenance.",
            distribution.critical
        ));
    }
    if distribution.high > 0 {
        lines.push(format!(
            "{} asset(s) at high risk. Schedule maintenance within the next week.",
            distribution.high
        ));
    }

    if critical_anomaly_count > 5 {
        lines.push(format!(
            "{critical_anomaly_count} critical anomalies detected in the past week. Review and address immediately."
        ));
    } else if critical_anomaly_count > 0 {
        lines.push(format!(
            "{critical_anomaly_count} critical anomaly(ies) require attention."
        ));
    }

    if let Some(issue) = issues
        .iter()
        .find(|i| i.trend == TrendDirection::Increasing)
    {
        lines.push(format!(
            "Trending issue: {}. Investigate root cause to prevent escalation.",
            issue.description
        ));
    }

    if lines.len() == 1 {
        lines.push(
            "Maintain current monitoring schedule and preventive maintenance practices."
                .to_string(),
        );
    }
    lines
}

// ---

/// Builds plant-level summaries from stored scores and anomalies.
#[derive(Clone)]
pub struct ExecutiveSummaryService {
    // ---
    store: Arc<dyn Store>,
}

impl ExecutiveSummaryService {
    // ---
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Generate, persist and return a fresh summary for `plant_id`.
    ///
    /// Fails with [`EngineError::NoAssets`] when the plant has no active
    /// assets. Any store failure aborts the whole generation.
    pub async fn generate_summary(&self, plant_id: &str) -> EngineResult<ExecutiveSummary> {
        // ---
        info!("Generating executive summary for plant {}", plant_id);
        let summary = self
            .generate_at(plant_id, Utc::now())
            .await
            .inspect_err(|e| {
                error!("Error generating executive summary for plant {}: {}", plant_id, e)
            })?;

        info!(
            "Executive summary generated for plant {}: Health Score {}",
            plant_id, summary.overall_health_score
        );
        Ok(summary)
    }

    async fn generate_at(
        &self,
        plant_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<ExecutiveSummary> {
        // ---
        let assets = self.store.list_assets_for_plant(plant_id).await?;
        if assets.is_empty() {
            return Err(EngineError::NoAssets {
                plant_id: plant_id.to_string(),
            });
        }

        let health = overall_health_score(&assets);
        let distribution = risk_distribution(&assets);

        let critical = self
            .store
            .query_anomalies(&AnomalyQuery {
                plant_id: Some(plant_id.to_string()),
                severity: Some(Severity::Critical),
                status: Some(AnomalyStatus::Open),
                detected_since: Some(now - Duration::days(CRITICAL_WINDOW_DAYS)),
                ..AnomalyQuery::default()
            })
            .await?;

        let open_recent = self
            .store
            .query_anomalies(&AnomalyQuery {
                plant_id: Some(plant_id.to_string()),
                status: Some(AnomalyStatus::Open),
                detected_since: Some(now - Duration::days(TRENDING_WINDOW_DAYS)),
                ..AnomalyQuery::default()
            })
            .await?;

        let issues = trending_issues(&open_recent);
        debug!(
            "Plant {}: {} assets, {} critical anomalies, {} trending issues",
            plant_id,
            assets.len(),
            critical.len(),
            issues.len()
        );

        let summary = ExecutiveSummary {
            plant_id: plant_id.to_string(),
            generated_at: now,
            overall_health_score: health,
            total_assets: assets.len(),
            risk_distribution: distribution,
            critical_anomaly_count: critical.len(),
            top_risk_assets: top_risk_assets(&assets, TOP_RISK_ASSETS),
            recommendations: recommendations(health, &distribution, critical.len(), &issues),
            trending_issues: issues,
        };

        self.store.append_executive_summary(&summary).await?;
        Ok(summary)
    }

    /// Previously generated summaries, newest first.
    pub async fn get_summary_history(
        &self,
        plant_id: &str,
        limit: u32,
    ) -> EngineResult<Vec<ExecutiveSummary>> {
        // ---
        Ok(self
            .store
            .executive_summary_history(plant_id, limit)
            .await?)
    }
}
