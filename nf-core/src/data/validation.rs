//! Model-config validation and default substitution
//!
//! Validation normalizes a parsed [`ModelConfig`] in place: default display
//! names and reset values are filled in, fans without thresholds get a
//! default table, and cross-field constraints are checked. Findings that a
//! config author should fix but that do not endanger the hardware are
//! logged at warn level instead of failing the load.

use nf_error::{Error, Result, ResultExt};
use tracing::warn;

use super::types::{FanConfiguration, ModelConfig, TemperatureThreshold};

/// Default threshold table for fans without `TemperatureThresholds`
pub const DEFAULT_TEMPERATURE_THRESHOLDS: [TemperatureThreshold; 6] = [
    TemperatureThreshold { up_threshold: 60, down_threshold: 0, fan_speed: 0.0 },
    TemperatureThreshold { up_threshold: 63, down_threshold: 48, fan_speed: 10.0 },
    TemperatureThreshold { up_threshold: 66, down_threshold: 55, fan_speed: 20.0 },
    TemperatureThreshold { up_threshold: 68, down_threshold: 59, fan_speed: 50.0 },
    TemperatureThreshold { up_threshold: 71, down_threshold: 63, fan_speed: 70.0 },
    TemperatureThreshold { up_threshold: 75, down_threshold: 67, fan_speed: 100.0 },
];

/// Threshold table substituted when `LegacyTemperatureThresholdsBehaviour`
/// is enabled
pub const LEGACY_TEMPERATURE_THRESHOLDS: [TemperatureThreshold; 6] = [
    TemperatureThreshold { up_threshold: 0, down_threshold: 0, fan_speed: 0.0 },
    TemperatureThreshold { up_threshold: 60, down_threshold: 48, fan_speed: 10.0 },
    TemperatureThreshold { up_threshold: 63, down_threshold: 55, fan_speed: 20.0 },
    TemperatureThreshold { up_threshold: 66, down_threshold: 59, fan_speed: 50.0 },
    TemperatureThreshold { up_threshold: 68, down_threshold: 63, fan_speed: 70.0 },
    TemperatureThreshold { up_threshold: 71, down_threshold: 67, fan_speed: 100.0 },
];

impl ModelConfig {
    /// Validate and normalize the configuration.
    pub fn validate(&mut self) -> Result<()> {
        if self.ec_poll_interval == 0 {
            return Err(Error::config("EcPollInterval: must be a positive value"));
        }

        for cfg in &mut self.register_write_configurations {
            if !cfg.reset_required {
                cfg.reset_value = 0;
            }
        }

        let legacy = self.legacy_temperature_thresholds_behaviour;
        let critical = self.critical_temperature;

        for (index, fan) in self.fan_configurations.iter_mut().enumerate() {
            validate_fan(fan, index, legacy, critical)
                .with_context(|| format!("FanConfigurations[{index}]"))?;
        }

        Ok(())
    }
}

fn validate_fan(
    fan: &mut FanConfiguration,
    index: usize,
    legacy: bool,
    critical_temperature: i32,
) -> Result<()> {
    if fan.fan_display_name.is_none() {
        fan.fan_display_name = Some(format!("Fan #{index}"));
    }

    if !fan.reset_required {
        fan.fan_speed_reset_value = 0;
    }

    if fan.min_speed_value == fan.max_speed_value {
        return Err(Error::config(
            "MinSpeedValue and MaxSpeedValue cannot be the same",
        ));
    }

    if fan.independent_read_min_max_values
        && fan.min_speed_value_read == fan.max_speed_value_read
    {
        return Err(Error::config(
            "MinSpeedValueRead and MaxSpeedValueRead cannot be the same",
        ));
    }

    for (i, o) in fan.fan_speed_percentage_overrides.iter().enumerate() {
        if !(0.0..=100.0).contains(&o.fan_speed_percentage) {
            return Err(Error::config("FanSpeedPercentage: value out of range")
                .context(format!("FanSpeedPercentageOverrides[{i}]")));
        }
    }

    if fan.temperature_thresholds.is_empty() {
        fan.temperature_thresholds = if legacy {
            LEGACY_TEMPERATURE_THRESHOLDS.to_vec()
        } else {
            DEFAULT_TEMPERATURE_THRESHOLDS.to_vec()
        };
    }

    let mut has_zero_speed = false;
    let mut has_full_speed = false;

    for (i, threshold) in fan.temperature_thresholds.iter().enumerate() {
        let context = || format!("TemperatureThresholds[{i}]");

        if !(0.0..=100.0).contains(&threshold.fan_speed) {
            return Err(Error::config("FanSpeed: value out of range").context(context()));
        }

        has_zero_speed |= threshold.fan_speed == 0.0;
        has_full_speed |= threshold.fan_speed == 100.0;

        if threshold.up_threshold < threshold.down_threshold {
            return Err(
                Error::config("UpThreshold cannot be less than DownThreshold").context(context())
            );
        }

        if threshold.up_threshold > critical_temperature {
            warn!(
                "FanConfigurations[{index}]: {}: UpThreshold cannot be greater than CriticalTemperature",
                context()
            );
        }

        for other in &fan.temperature_thresholds[..i] {
            if other.up_threshold == threshold.up_threshold {
                return Err(Error::config("Duplicate UpThreshold").context(context()));
            }
        }
    }

    if !has_zero_speed {
        warn!("FanConfigurations[{index}]: No threshold with FanSpeed == 0 found");
    }
    if !has_full_speed {
        warn!("FanConfigurations[{index}]: No threshold with FanSpeed == 100 found");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::FanSpeedPercentageOverride;

    fn model_with_fan(fan: FanConfiguration) -> ModelConfig {
        serde_json::from_str::<ModelConfig>(r#"{ "CriticalTemperature": 75 }"#)
            .map(|mut m| {
                m.fan_configurations.push(fan);
                m
            })
            .unwrap()
    }

    fn basic_fan() -> FanConfiguration {
        serde_json::from_str(r#"{ "MinSpeedValue": 0, "MaxSpeedValue": 255 }"#).unwrap()
    }

    #[test]
    fn test_default_display_name_assigned() {
        let mut model = model_with_fan(basic_fan());
        model.validate().unwrap();
        assert_eq!(model.fan_configurations[0].display_name(), "Fan #0");
    }

    #[test]
    fn test_explicit_display_name_kept() {
        let mut fan = basic_fan();
        fan.fan_display_name = Some("CPU Fan".to_string());
        let mut model = model_with_fan(fan);
        model.validate().unwrap();
        assert_eq!(model.fan_configurations[0].display_name(), "CPU Fan");
    }

    #[test]
    fn test_min_equals_max_rejected() {
        let mut fan = basic_fan();
        fan.min_speed_value = 100;
        fan.max_speed_value = 100;
        let mut model = model_with_fan(fan);
        let err = model.validate().unwrap_err().to_string();
        assert!(err.contains("MinSpeedValue and MaxSpeedValue cannot be the same"));
        assert!(err.contains("FanConfigurations[0]"));
    }

    #[test]
    fn test_independent_read_range_must_differ() {
        let mut fan = basic_fan();
        fan.independent_read_min_max_values = true;
        fan.min_speed_value_read = 40;
        fan.max_speed_value_read = 40;
        let mut model = model_with_fan(fan);
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_default_thresholds_substituted() {
        let mut model = model_with_fan(basic_fan());
        model.validate().unwrap();
        assert_eq!(
            model.fan_configurations[0].temperature_thresholds,
            DEFAULT_TEMPERATURE_THRESHOLDS.to_vec()
        );
    }

    #[test]
    fn test_legacy_thresholds_substituted_verbatim() {
        let mut model = model_with_fan(basic_fan());
        model.legacy_temperature_thresholds_behaviour = true;
        model.validate().unwrap();
        assert_eq!(
            model.fan_configurations[0].temperature_thresholds,
            LEGACY_TEMPERATURE_THRESHOLDS.to_vec()
        );
    }

    #[test]
    fn test_duplicate_up_threshold_rejected() {
        let mut fan = basic_fan();
        fan.temperature_thresholds = vec![
            TemperatureThreshold { up_threshold: 60, down_threshold: 50, fan_speed: 0.0 },
            TemperatureThreshold { up_threshold: 60, down_threshold: 55, fan_speed: 100.0 },
        ];
        let mut model = model_with_fan(fan);
        let err = model.validate().unwrap_err().to_string();
        assert!(err.contains("Duplicate UpThreshold"));
    }

    #[test]
    fn test_up_below_down_rejected() {
        let mut fan = basic_fan();
        fan.temperature_thresholds = vec![TemperatureThreshold {
            up_threshold: 50,
            down_threshold: 60,
            fan_speed: 100.0,
        }];
        let mut model = model_with_fan(fan);
        let err = model.validate().unwrap_err().to_string();
        assert!(err.contains("UpThreshold cannot be less than DownThreshold"));
    }

    #[test]
    fn test_reset_values_forced_to_zero_without_reset_required() {
        let mut fan = basic_fan();
        fan.fan_speed_reset_value = 255;
        let mut model = model_with_fan(fan);
        model.register_write_configurations = vec![serde_json::from_str(
            r#"{ "Register": 147, "Value": 20, "ResetValue": 40 }"#,
        )
        .unwrap()];
        model.validate().unwrap();
        assert_eq!(model.fan_configurations[0].fan_speed_reset_value, 0);
        assert_eq!(model.register_write_configurations[0].reset_value, 0);
    }

    #[test]
    fn test_reset_value_kept_when_reset_required() {
        let mut fan = basic_fan();
        fan.reset_required = true;
        fan.fan_speed_reset_value = 255;
        let mut model = model_with_fan(fan);
        model.validate().unwrap();
        assert_eq!(model.fan_configurations[0].fan_speed_reset_value, 255);
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let mut model = model_with_fan(basic_fan());
        model.ec_poll_interval = 0;
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_override_percentage_out_of_range_rejected() {
        let mut fan = basic_fan();
        fan.fan_speed_percentage_overrides = vec![FanSpeedPercentageOverride {
            fan_speed_percentage: 120.0,
            fan_speed_value: 0,
            target_operation: Default::default(),
        }];
        let mut model = model_with_fan(fan);
        assert!(model.validate().is_err());
    }
}
