//! Feature extraction: per-channel summary statistics over a reading window.

use std::collections::BTreeMap;

use crate::models::{SensorReading, SensorType};

// ---

/// Summary statistics for one sensor channel. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorStats {
    // ---
    pub mean: f64,
    /// Population standard deviation (divides by n).
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    /// Least-squares slope of value against position in the window.
    ///
    /// Position 0 is the most recent reading, so a positive slope means the
    /// values were higher in the past, i.e. the channel is falling in time.
    pub trend: f64,
    /// `std / mean`, or 0 when the mean is 0.
    pub cv: f64,
}

impl SensorStats {
    /// Statistics over `values`, or `None` for an empty slice.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        // ---
        if values.is_empty() {
            return None;
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let cv = if mean != 0.0 { std / mean } else { 0.0 };

        Some(Self {
            mean,
            std,
            min,
            max,
            range: max - min,
            trend: slope(values),
            cv,
        })
    }
}

/// Closed-form simple linear regression slope over x = 0..n-1.
fn slope(values: &[f64]) -> f64 {
    // ---
    if values.len() < 2 {
        return 0.0;
    }

    let n = values.len() as f64;
    let sum_x = n * (n - 1.0) / 2.0;
    let sum_x2 = n * (n - 1.0) * (2.0 * n - 1.0) / 6.0;
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, v)| i as f64 * v).sum();

    (n * sum_xy - sum_x * sum_y) / (n * sum_x2 - sum_x * sum_x)
}

/// Group readings per channel, preserving the input order within each group.
///
/// Non-finite values (NaN, ±inf) are dropped here so no statistic derived
/// from a group can be NaN. A channel with only such values is absent.
pub fn group_by_sensor(readings: &[SensorReading]) -> BTreeMap<SensorType, Vec<&SensorReading>> {
    // ---
    let mut grouped: BTreeMap<SensorType, Vec<&SensorReading>> = BTreeMap::new();
    for reading in readings.iter().filter(|r| r.value.is_finite()) {
        grouped
            .entry(reading.sensor_type.clone())
            .or_default()
            .push(reading);
    }
    grouped
}

/// Per-channel statistics for a most-recent-first window of readings.
///
/// Only channels present in `readings` appear in the result; an empty window
/// yields an empty map.
pub fn extract_features(readings: &[SensorReading]) -> BTreeMap<SensorType, SensorStats> {
    // ---
    group_by_sensor(readings)
        .into_iter()
        .filter_map(|(sensor, group)| {
            let values: Vec<f64> = group.iter().map(|r| r.value).collect();
            SensorStats::from_values(&values).map(|stats| (sensor, stats))
        })
        .collect()
}
