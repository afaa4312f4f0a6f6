//! Persisted service configuration
//!
//! The service config selects the model config, optionally forces an EC
//! backend, and stores the per-fan target speeds and temperature sources.
//! It is the only configuration the daemon writes back: target speeds are
//! mirrored into it whenever a client changes a fan mode.

use std::fs;
use std::path::Path;

use nf_error::{Error, Result};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::types::{EcKind, TemperatureAlgorithm};

// ============================================================================
// Target speeds
// ============================================================================

/// Per-fan target stored in `TargetFanSpeeds`
///
/// On disk this is a bare float where `-1` selects auto mode; in memory the
/// sentinel is kept out of the type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetSpeed {
    Auto,
    Fixed(f32),
}

impl TargetSpeed {
    /// The float written to the config file
    pub fn as_sentinel(self) -> f32 {
        match self {
            Self::Auto => -1.0,
            Self::Fixed(percent) => percent,
        }
    }
}

impl Serialize for TargetSpeed {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f32(self.as_sentinel())
    }
}

impl<'de> Deserialize<'de> for TargetSpeed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)? as f32;
        if value > 100.0 {
            warn!("TargetFanSpeeds: value {value} cannot be greater than 100.0, clamping");
            Ok(Self::Fixed(100.0))
        } else if value >= 0.0 {
            Ok(Self::Fixed(value))
        } else {
            if value != -1.0 {
                warn!("TargetFanSpeeds: please use `-1' for selecting auto mode (got {value})");
            }
            Ok(Self::Auto)
        }
    }
}

// ============================================================================
// Service configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Name of the model config file (without `.json`) to load
    #[serde(rename = "SelectedConfigId")]
    pub selected_config_id: String,

    /// Forces a specific EC backend instead of auto-detection
    #[serde(
        rename = "EmbeddedControllerType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub embedded_controller_type: Option<EcKind>,

    /// One entry per fan; missing entries leave fans in auto mode
    #[serde(
        rename = "TargetFanSpeeds",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub target_fan_speeds: Vec<TargetSpeed>,

    #[serde(
        rename = "FanTemperatureSources",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub fan_temperature_sources: Vec<FanTemperatureSource>,
}

/// Binds a set of sensors and an aggregation algorithm to one fan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FanTemperatureSource {
    #[serde(rename = "FanIndex")]
    pub fan_index: usize,

    #[serde(rename = "TemperatureAlgorithmType", default)]
    pub algorithm: TemperatureAlgorithm,

    /// hwmon chip names or sensor labels; empty means all sensors
    #[serde(rename = "Sensors", default, skip_serializing_if = "Vec::is_empty")]
    pub sensors: Vec<String>,
}

impl ServiceConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents)
            .map_err(|e| Error::from(e).context(path.display().to_string()))
    }

    pub fn store(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents).map_err(|source| Error::FileWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "SelectedConfigId": "Acme Laptop 15",
        "EmbeddedControllerType": "ec_sys",
        "TargetFanSpeeds": [50.0, -1.0],
        "FanTemperatureSources": [
            { "FanIndex": 0, "TemperatureAlgorithmType": "Max", "Sensors": ["coretemp"] }
        ]
    }"#;

    #[test]
    fn test_parse_sample() {
        let config: ServiceConfig = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(config.selected_config_id, "Acme Laptop 15");
        assert_eq!(config.embedded_controller_type, Some(EcKind::EcSysfs));
        assert_eq!(
            config.target_fan_speeds,
            vec![TargetSpeed::Fixed(50.0), TargetSpeed::Auto]
        );
        assert_eq!(config.fan_temperature_sources.len(), 1);
        assert_eq!(
            config.fan_temperature_sources[0].algorithm,
            TemperatureAlgorithm::Max
        );
    }

    #[test]
    fn test_round_trip() {
        let config: ServiceConfig = serde_json::from_str(SAMPLE).unwrap();
        let serialized = serde_json::to_string(&config).unwrap();
        let reparsed: ServiceConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(config, reparsed);
    }

    #[test]
    fn test_target_speed_clamping() {
        let config: ServiceConfig = serde_json::from_str(
            r#"{ "SelectedConfigId": "x", "TargetFanSpeeds": [150.0, -3.0, 0.0] }"#,
        )
        .unwrap();
        assert_eq!(
            config.target_fan_speeds,
            vec![
                TargetSpeed::Fixed(100.0),
                TargetSpeed::Auto,
                TargetSpeed::Fixed(0.0)
            ]
        );
    }

    #[test]
    fn test_legacy_ec_type_alias_read_canonical_write() {
        let config: ServiceConfig = serde_json::from_str(
            r#"{ "SelectedConfigId": "x", "EmbeddedControllerType": "ec_sys_linux" }"#,
        )
        .unwrap();
        assert_eq!(config.embedded_controller_type, Some(EcKind::EcSysfs));

        let out = serde_json::to_string(&config).unwrap();
        assert!(out.contains(r#""EmbeddedControllerType":"ec_sys""#));
    }

    #[test]
    fn test_empty_sections_omitted_when_writing() {
        let config = ServiceConfig {
            selected_config_id: "x".to_string(),
            embedded_controller_type: None,
            target_fan_speeds: Vec::new(),
            fan_temperature_sources: Vec::new(),
        };
        let out = serde_json::to_string(&config).unwrap();
        assert_eq!(out, r#"{"SelectedConfigId":"x"}"#);
    }

    #[test]
    fn test_store_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notefan.json");

        let config: ServiceConfig = serde_json::from_str(SAMPLE).unwrap();
        config.store(&path).unwrap();

        let loaded = ServiceConfig::load(&path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_auto_sentinel_written_as_minus_one() {
        let config = ServiceConfig {
            selected_config_id: "x".to_string(),
            embedded_controller_type: None,
            target_fan_speeds: vec![TargetSpeed::Auto, TargetSpeed::Fixed(42.0)],
            fan_temperature_sources: Vec::new(),
        };
        let json: serde_json::Value = serde_json::to_value(&config).unwrap();
        assert_eq!(json["TargetFanSpeeds"][0], -1.0);
        assert_eq!(json["TargetFanSpeeds"][1], 42.0);
    }
}
