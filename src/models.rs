//! Data models shared by the engine, the store and the HTTP routes.
//!
//! String-typed columns coming out of the time-series store are lifted into
//! typed enumerations here, so the scoring tables in `engine::thresholds`
//! are keyed by `AssetType`/`SensorType` and checked by the compiler.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---

/// Status value that removes an asset from plant-level aggregation.
pub const DECOMMISSIONED: &str = "decommissioned";

/// Returned when a stored or requested enum label is not recognised.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    // ---
    pub kind: &'static str,
    pub value: String,
}

// ---

/// Physical quantity measured by a sensor channel.
///
/// Unknown channel names are kept as `Other` rather than rejected; they get
/// default anomaly thresholds and never contribute a risk factor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SensorType {
    // ---
    Temperature,
    Vibration,
    Voltage,
    Current,
    Pressure,
    Other(String),
}

impl SensorType {
    // ---
    pub fn as_str(&self) -> &str {
        // ---
        match self {
            SensorType::Temperature => "temperature",
            SensorType::Vibration => "vibration",
            SensorType::Voltage => "voltage",
            SensorType::Current => "current",
            SensorType::Pressure => "pressure",
            SensorType::Other(name) => name,
        }
    }

    /// Channel name with the first letter upper-cased, for descriptions.
    pub fn title(&self) -> String {
        // ---
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl From<&str> for SensorType {
    fn from(value: &str) -> Self {
        // ---
        match value {
            "temperature" => SensorType::Temperature,
            "vibration" => SensorType::Vibration,
            "voltage" => SensorType::Voltage,
            "current" => SensorType::Current,
            "pressure" => SensorType::Pressure,
            other => SensorType::Other(other.to_string()),
        }
    }
}

impl From<String> for SensorType {
    fn from(value: String) -> Self {
        SensorType::from(value.as_str())
    }
}

impl From<SensorType> for String {
    fn from(value: SensorType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---

/// Equipment class used to select base risk and thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AssetType {
    // ---
    Transformer,
    Motor,
    Generator,
    Pump,
    /// Anything the registry reports that has no dedicated profile.
    Unclassified,
}

impl AssetType {
    // ---
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            AssetType::Transformer => "transformer",
            AssetType::Motor => "motor",
            AssetType::Generator => "generator",
            AssetType::Pump => "pump",
            AssetType::Unclassified => "unclassified",
        }
    }

    /// Noun used in generated explanations ("The motor is ...").
    pub fn label(&self) -> &'static str {
        // ---
        match self {
            AssetType::Unclassified => "asset",
            other => other.as_str(),
        }
    }
}

impl From<&str> for AssetType {
    fn from(value: &str) -> Self {
        // ---
        match value.trim().to_ascii_lowercase().as_str() {
            "transformer" => AssetType::Transformer,
            "motor" => AssetType::Motor,
            "generator" => AssetType::Generator,
            "pump" => AssetType::Pump,
            _ => AssetType::Unclassified,
        }
    }
}

impl From<String> for AssetType {
    fn from(value: String) -> Self {
        AssetType::from(value.as_str())
    }
}

impl From<AssetType> for String {
    fn from(value: AssetType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---

/// Anomaly severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    // ---
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    // ---
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl FromStr for Severity {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(UnknownVariant {
                kind: "severity",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of an anomaly record. The engine only ever writes `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyStatus {
    // ---
    Open,
    Acknowledged,
    Resolved,
}

impl AnomalyStatus {
    // ---
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            AnomalyStatus::Open => "open",
            AnomalyStatus::Acknowledged => "acknowledged",
            AnomalyStatus::Resolved => "resolved",
        }
    }
}

impl FromStr for AnomalyStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s {
            "open" => Ok(AnomalyStatus::Open),
            "acknowledged" => Ok(AnomalyStatus::Acknowledged),
            "resolved" => Ok(AnomalyStatus::Resolved),
            other => Err(UnknownVariant {
                kind: "anomaly status",
                value: other.to_string(),
            }),
        }
    }
}

/// Direction of a plant-wide anomaly pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    // ---
    Increasing,
    Stable,
    Decreasing,
}

// ---

/// One raw sample from the time-series store. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    // ---
    pub asset_id: String,
    pub timestamp: DateTime<Utc>,
    pub sensor_type: SensorType,
    pub value: f64,
    pub unit: String,
}

/// Asset registry entry, including the denormalized current risk score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    // ---
    pub id: String,
    pub name: String,
    pub asset_type: AssetType,
    pub plant_id: String,
    pub location: Option<String>,
    pub status: String,
    pub current_risk_score: Option<f64>,
    /// Computation time of the score held in `current_risk_score`.
    pub risk_scored_at: Option<DateTime<Utc>>,
}

impl Asset {
    // ---
    pub fn is_decommissioned(&self) -> bool {
        self.status == DECOMMISSIONED
    }
}

/// A bounded, named contribution to a composite risk score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactor {
    // ---
    pub factor: String,
    pub contribution: f64,
    pub description: String,
}

/// Composite risk assessment for one asset at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskScore {
    // ---
    pub asset_id: String,
    /// Always within `[0, 100]`.
    pub risk_score: f64,
    pub timestamp: DateTime<Utc>,
    pub explanation: String,
    pub risk_factors: Vec<RiskFactor>,
    /// Always within `[0, 1]`.
    pub confidence: f64,
}

/// A single flagged outlier reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    // ---
    pub id: Uuid,
    pub asset_id: String,
    /// Time of the anomalous reading.
    pub timestamp: DateTime<Utc>,
    /// Time of the check that flagged it.
    pub detected_at: DateTime<Utc>,
    pub severity: Severity,
    pub metric: SensorType,
    pub expected_value: f64,
    pub actual_value: f64,
    /// Absolute percent deviation from `expected_value`; never negative.
    pub deviation: f64,
    pub description: String,
    pub status: AnomalyStatus,
}

/// Outcome of one `detect_anomalies` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyDetectionResult {
    // ---
    pub anomalies: Vec<Anomaly>,
    pub total_checked: usize,
    pub anomalies_detected: usize,
}

impl AnomalyDetectionResult {
    // ---
    pub fn empty() -> Self {
        Self {
            anomalies: Vec::new(),
            total_checked: 0,
            anomalies_detected: 0,
        }
    }

    /// True when the caller should raise a notification.
    pub fn should_notify(&self) -> bool {
        self.anomalies
            .iter()
            .any(|a| a.severity == Severity::Critical)
    }
}

/// Per-asset row used by the executive summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRiskSummary {
    // ---
    pub asset_id: String,
    pub asset_name: String,
    pub asset_type: AssetType,
    /// Current risk score, 0 when the asset has never been scored.
    pub risk_score: f64,
    pub status: String,
    pub location: String,
}

/// Asset counts per risk tier. Buckets always sum to the asset count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskDistribution {
    // ---
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl RiskDistribution {
    // ---
    pub fn total(&self) -> usize {
        self.low + self.medium + self.high + self.critical
    }
}

/// An anomaly pattern recurring across two or more assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingIssue {
    // ---
    pub issue_type: SensorType,
    pub description: String,
    pub affected_asset_count: usize,
    pub severity: Severity,
    pub trend: TrendDirection,
    pub first_detected: DateTime<Utc>,
    pub last_detected: DateTime<Utc>,
}

/// Plant-level health report, regenerated on every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutiveSummary {
    // ---
    pub plant_id: String,
    pub generated_at: DateTime<Utc>,
    pub overall_health_score: f64,
    pub total_assets: usize,
    pub risk_distribution: RiskDistribution,
    pub critical_anomaly_count: usize,
    pub top_risk_assets: Vec<AssetRiskSummary>,
    pub trending_issues: Vec<TrendingIssue>,
    pub recommendations: Vec<String>,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_sensor_type_parsing() {
        // ---
        assert_eq!(SensorType::from("temperature"), SensorType::Temperature);
        assert_eq!(SensorType::from("pressure"), SensorType::Pressure);
        assert_eq!(
            SensorType::from("humidity"),
            SensorType::Other("humidity".to_string())
        );
        assert_eq!(SensorType::Other("humidity".into()).as_str(), "humidity");
    }

    #[test]
    fn test_sensor_type_title() {
        // ---
        assert_eq!(SensorType::Vibration.title(), "Vibration");
        assert_eq!(SensorType::Other("flow".into()).title(), "Flow");
        assert_eq!(SensorType::Other(String::new()).title(), "");
    }

    #[test]
    fn test_asset_type_falls_back_to_unclassified() {
        // ---
        assert_eq!(AssetType::from("Motor"), AssetType::Motor);
        assert_eq!(AssetType::from(" pump "), AssetType::Pump);
        assert_eq!(AssetType::from("compressor"), AssetType::Unclassified);
        assert_eq!(AssetType::Unclassified.label(), "asset");
        assert_eq!(AssetType::Generator.label(), "generator");
    }

    #[test]
    fn test_severity_ordering_and_parsing() {
        // ---
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!("high".parse::<Severity>().unwrap(), Severity::High);
        assert!("severe".parse::<Severity>().is_err());
    }

    #[test]
    fn test_enums_serialize_as_lowercase_strings() {
        // ---
        let json = serde_json::to_string(&SensorType::Current).unwrap();
        assert_eq!(json, "\"current\"");
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let parsed: AssetType = serde_json::from_str("\"turbine\"").unwrap();
        assert_eq!(parsed, AssetType::Unclassified);
    }

    #[test]
    fn test_should_notify_only_on_critical() {
        // ---
        let mut result = AnomalyDetectionResult::empty();
        assert!(!result.should_notify());

        result.anomalies.push(Anomaly {
            id: Uuid::new_v4(),
            asset_id: "asset-1".into(),
            timestamp: Utc::now(),
            detected_at: Utc::now(),
            severity: Severity::High,
            metric: SensorType::Temperature,
            expected_value: 70.0,
            actual_value: 90.0,
            deviation: 28.5,
            description: String::new(),
            status: AnomalyStatus::Open,
        });
        assert!(!result.should_notify());

        result.anomalies[0].severity = Severity::Critical;
        assert!(result.should_notify());
    }
}
