//! Per-asset-type scoring profiles and per-channel anomaly limits.
//!
//! Every table here is an exhaustive `match` on a typed enumeration, so a
//! new `AssetType` or `SensorType` variant cannot be added without deciding
//! its limits.

use crate::models::{AssetType, SensorType};

// ---

/// Threshold set used by risk scoring. Every field is always populated;
/// asset types that do not define a limit inherit the channel default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    // ---
    /// Upper bound on peak temperature, °C.
    pub temperature_max: f64,
    /// Upper bound on voltage standard deviation, V.
    pub voltage_std: f64,
    /// Upper bound on vibration standard deviation.
    pub vibration_std: f64,
    /// Upper bound on peak current, A.
    pub current_max: f64,
    /// Upper bound on pressure standard deviation.
    pub pressure_std: f64,
}

/// Limits applied when an asset type does not define its own.
pub const DEFAULT_THRESHOLDS: Thresholds = Thresholds {
    temperature_max: 80.0,
    voltage_std: 5.0,
    vibration_std: 2.0,
    current_max: 100.0,
    pressure_std: 5.0,
};

/// Base risk and thresholds for one asset type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssetProfile {
    // ---
    /// Score returned on cold start and used as the floor of the composite.
    pub base_risk: f64,
    pub thresholds: Thresholds,
}

impl AssetProfile {
    // ---
    pub fn for_type(asset_type: AssetType) -> Self {
        // ---
        match asset_type {
            AssetType::Transformer => AssetProfile {
                base_risk: 20.0,
                thresholds: Thresholds {
                    temperature_max: 80.0,
                    voltage_std: 5.0,
                    current_max: 100.0,
                    ..DEFAULT_THRESHOLDS
                },
            },
            AssetType::Motor => AssetProfile {
                base_risk: 25.0,
                thresholds: Thresholds {
                    temperature_max: 90.0,
                    vibration_std: 2.0,
                    current_max: 150.0,
                    ..DEFAULT_THRESHOLDS
                },
            },
            AssetType::Generator => AssetProfile {
                base_risk: 30.0,
                thresholds: Thresholds {
                    temperature_max: 85.0,
                    voltage_std: 3.0,
                    current_max: 200.0,
                    ..DEFAULT_THRESHOLDS
                },
            },
            AssetType::Pump => AssetProfile {
                base_risk: 15.0,
                thresholds: Thresholds {
                    temperature_max: 75.0,
                    vibration_std: 1.5,
                    pressure_std: 5.0,
                    ..DEFAULT_THRESHOLDS
                },
            },
            // Unknown equipment scores like a transformer on the default base.
            AssetType::Unclassified => AssetProfile {
                base_risk: 20.0,
                thresholds: AssetProfile::for_type(AssetType::Transformer).thresholds,
            },
        }
    }
}

/// Percent deviation at which an anomaly on this channel is rated `High`.
///
/// `Critical` starts at 1.5x this value, `Medium` at 0.5x.
pub fn critical_deviation_percent(sensor: &SensorType) -> f64 {
    // ---
    match sensor {
        SensorType::Temperature => 20.0,
        SensorType::Vibration => 50.0,
        SensorType::Voltage => 15.0,
        SensorType::Current => 25.0,
        SensorType::Pressure => 30.0,
        SensorType::Other(_) => 25.0,
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_base_risk_per_type() {
        // ---
        assert_eq!(AssetProfile::for_type(AssetType::Transformer).base_risk, 20.0);
        assert_eq!(AssetProfile::for_type(AssetType::Motor).base_risk, 25.0);
        assert_eq!(AssetProfile::for_type(AssetType::Generator).base_risk, 30.0);
        assert_eq!(AssetProfile::for_type(AssetType::Pump).base_risk, 15.0);
        assert_eq!(AssetProfile::for_type(AssetType::Unclassified).base_risk, 20.0);
    }

    #[test]
    fn test_undefined_limits_inherit_defaults() {
        // ---
        // Transformers define no vibration limit; motors define no voltage limit.
        let transformer = AssetProfile::for_type(AssetType::Transformer).thresholds;
        assert_eq!(transformer.vibration_std, DEFAULT_THRESHOLDS.vibration_std);

        let motor = AssetProfile::for_type(AssetType::Motor).thresholds;
        assert_eq!(motor.voltage_std, DEFAULT_THRESHOLDS.voltage_std);
        assert_eq!(motor.current_max, 150.0);

        let pump = AssetProfile::for_type(AssetType::Pump).thresholds;
        assert_eq!(pump.vibration_std, 1.5);
        assert_eq!(pump.current_max, DEFAULT_THRESHOLDS.current_max);
    }

    #[test]
    fn test_unclassified_uses_transformer_limits() {
        // ---
        assert_eq!(
            AssetProfile::for_type(AssetType::Unclassified).thresholds,
            AssetProfile::for_type(AssetType::Transformer).thresholds
        );
    }

    #[test]
    fn test_critical_deviation_table() {
        // ---
        assert_eq!(critical_deviation_percent(&SensorType::Temperature), 20.0);
        assert_eq!(critical_deviation_percent(&SensorType::Vibration), 50.0);
        assert_eq!(critical_deviation_percent(&SensorType::Voltage), 15.0);
        assert_eq!(critical_deviation_percent(&SensorType::Current), 25.0);
        assert_eq!(critical_deviation_percent(&SensorType::Pressure), 30.0);
        assert_eq!(
            critical_deviation_percent(&SensorType::Other("flow".into())),
            25.0
        );
    }
}
