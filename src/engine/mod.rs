//! Asset health engine gateway (EMBP).
//!
//! Three services computed bottom-up per request:
//! - [`RiskScoringService`] – features plus thresholds into a 0–100 score
//! - [`AnomalyDetectionService`] – z-score / IQR check of each channel
//! - [`ExecutiveSummaryService`] – plant roll-up over the stored outputs
//!
//! None of them keeps state between calls; everything is read from and
//! written to the [`Store`] they are built with.

use std::sync::Arc;

use crate::store::Store;

mod anomaly;
mod features;
mod risk;
mod summary;
mod thresholds;

pub use anomaly::{classify_severity, AnomalyDetectionService, AnomalyFilter};
pub use features::{extract_features, SensorStats};
pub use risk::{RiskChange, RiskLevel, RiskScoringService, COLD_START_CONFIDENCE};
pub use summary::ExecutiveSummaryService;
pub use thresholds::{AssetProfile, Thresholds};

// ---

/// Tunables shared by the services.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    // ---
    /// Most recent readings fetched per risk or anomaly call.
    pub reading_window: u32,
    /// Score swing above which a recalculation should trigger a notification.
    pub risk_change_alert_delta: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            reading_window: 100,
            risk_change_alert_delta: 20.0,
        }
    }
}

/// The three services wired to one store.
#[derive(Clone)]
pub struct Engine {
    // ---
    pub risk: RiskScoringService,
    pub anomalies: AnomalyDetectionService,
    pub summaries: ExecutiveSummaryService,
    store: Arc<dyn Store>,
}

impl Engine {
    // ---
    pub fn new(store: Arc<dyn Store>, settings: EngineSettings) -> Self {
        // ---
        Self {
            risk: RiskScoringService::new(store.clone(), settings),
            anomalies: AnomalyDetectionService::new(store.clone(), settings),
            summaries: ExecutiveSummaryService::new(store.clone()),
            store,
        }
    }

    /// The store the services read from and write to.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}

/// Round half away from zero to `decimals` places.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    // ---
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_round_to() {
        // ---
        assert_eq!(round_to(59.96, 1), 60.0);
        assert_eq!(round_to(0.123, 2), 0.12);
        assert_eq!(round_to(-2.25, 1), -2.3);
        assert_eq!(round_to(40.0, 1), 40.0);
    }
}
