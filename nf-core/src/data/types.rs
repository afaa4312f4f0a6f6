//! Per-model configuration schema
//!
//! A model config describes one notebook model: how fast to poll, which EC
//! registers drive which fan, how raw register values map to speed
//! percentages, and which extra register pokes the EC needs. Field names
//! mirror the on-disk JSON schema; unknown keys are rejected.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use nf_error::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::constants::defaults;

// ============================================================================
// Enums
// ============================================================================

/// How a register write combines with the register's current value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegisterWriteMode {
    Set,
    And,
    Or,
}

impl Default for RegisterWriteMode {
    fn default() -> Self {
        Self::Set
    }
}

/// When a register write configuration is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegisterWriteOccasion {
    OnInitialization,
    OnWriteFanSpeed,
}

impl Default for RegisterWriteOccasion {
    fn default() -> Self {
        Self::OnInitialization
    }
}

/// Which direction(s) a fan speed percentage override applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverrideTargetOperation {
    Read,
    Write,
    ReadWrite,
}

impl OverrideTargetOperation {
    pub fn applies_to_read(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    pub fn applies_to_write(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

impl Default for OverrideTargetOperation {
    fn default() -> Self {
        Self::ReadWrite
    }
}

/// How multiple sensor readings are folded into one fan temperature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureAlgorithm {
    Average,
    Min,
    Max,
}

impl Default for TemperatureAlgorithm {
    fn default() -> Self {
        Self::Average
    }
}

/// Selectable embedded controller backends
///
/// The canonical on-disk strings are `ec_sys`, `acpi_ec`, `dev_port` and
/// `dummy`; the aliases were written by older releases and are still
/// accepted on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EcKind {
    #[serde(rename = "ec_sys", alias = "ec_sys_linux")]
    EcSysfs,
    #[serde(rename = "acpi_ec", alias = "ec_acpi")]
    EcAcpi,
    #[serde(rename = "dev_port", alias = "ec_linux")]
    EcDevPort,
    #[serde(rename = "dummy")]
    EcDummy,
}

impl EcKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EcSysfs => "ec_sys",
            Self::EcAcpi => "acpi_ec",
            Self::EcDevPort => "dev_port",
            Self::EcDummy => "dummy",
        }
    }
}

impl fmt::Display for EcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EcKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ec_sys" | "ec_sys_linux" => Ok(Self::EcSysfs),
            "acpi_ec" | "ec_acpi" => Ok(Self::EcAcpi),
            "dev_port" | "ec_linux" => Ok(Self::EcDevPort),
            "dummy" => Ok(Self::EcDummy),
            other => Err(Error::config(format!(
                "Invalid value for EmbeddedControllerType: '{other}'"
            ))),
        }
    }
}

// ============================================================================
// Model configuration
// ============================================================================

/// Top-level per-model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    #[serde(rename = "NotebookModel", default)]
    pub notebook_model: String,

    #[serde(rename = "Author", default)]
    pub author: String,

    /// Control loop tick interval in milliseconds
    #[serde(rename = "EcPollInterval", default = "default_poll_interval")]
    pub ec_poll_interval: u32,

    /// Temperature (°C) at which all fans are forced to 100%
    #[serde(rename = "CriticalTemperature", default = "default_critical_temperature")]
    pub critical_temperature: i32,

    /// Speeds are 16-bit little-endian values at register and register+1
    #[serde(rename = "ReadWriteWords", default)]
    pub read_write_words: bool,

    /// Selects the legacy default threshold table for fans without thresholds
    #[serde(rename = "LegacyTemperatureThresholdsBehaviour", default)]
    pub legacy_temperature_thresholds_behaviour: bool,

    #[serde(rename = "FanConfigurations", default)]
    pub fan_configurations: Vec<FanConfiguration>,

    #[serde(rename = "RegisterWriteConfigurations", default)]
    pub register_write_configurations: Vec<RegisterWriteConfiguration>,
}

fn default_poll_interval() -> u32 {
    defaults::EC_POLL_INTERVAL_MS
}

fn default_critical_temperature() -> i32 {
    defaults::CRITICAL_TEMPERATURE
}

impl ModelConfig {
    /// Parse a model config from a JSON file.
    ///
    /// The result still has to be passed through
    /// [`validate`](Self::validate) before use.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents)
            .map_err(|e| Error::from(e).context(path.display().to_string()))
    }
}

/// Configuration of a single fan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FanConfiguration {
    /// Filled with `Fan #<index>` during validation when absent
    #[serde(rename = "FanDisplayName", default, skip_serializing_if = "Option::is_none")]
    pub fan_display_name: Option<String>,

    #[serde(rename = "ReadRegister", default)]
    pub read_register: u8,

    #[serde(rename = "WriteRegister", default)]
    pub write_register: u8,

    #[serde(rename = "MinSpeedValue", default)]
    pub min_speed_value: u16,

    #[serde(rename = "MaxSpeedValue", default = "default_max_speed_value")]
    pub max_speed_value: u16,

    #[serde(rename = "IndependentReadMinMaxValues", default)]
    pub independent_read_min_max_values: bool,

    #[serde(rename = "MinSpeedValueRead", default)]
    pub min_speed_value_read: u16,

    #[serde(rename = "MaxSpeedValueRead", default)]
    pub max_speed_value_read: u16,

    #[serde(rename = "ResetRequired", default)]
    pub reset_required: bool,

    /// Forced to 0 during validation when `ResetRequired` is false
    #[serde(rename = "FanSpeedResetValue", default)]
    pub fan_speed_reset_value: u16,

    /// Empty tables are replaced with a default table during validation
    #[serde(rename = "TemperatureThresholds", default)]
    pub temperature_thresholds: Vec<TemperatureThreshold>,

    #[serde(rename = "FanSpeedPercentageOverrides", default)]
    pub fan_speed_percentage_overrides: Vec<FanSpeedPercentageOverride>,
}

fn default_max_speed_value() -> u16 {
    defaults::MAX_SPEED_VALUE
}

impl FanConfiguration {
    /// Display name; validation guarantees it is present
    pub fn display_name(&self) -> &str {
        self.fan_display_name.as_deref().unwrap_or("Fan")
    }

    /// Minimum raw value used when decoding the current speed
    pub fn read_min(&self) -> u16 {
        if self.independent_read_min_max_values {
            self.min_speed_value_read
        } else {
            self.min_speed_value
        }
    }

    /// Maximum raw value used when decoding the current speed
    pub fn read_max(&self) -> u16 {
        if self.independent_read_min_max_values {
            self.max_speed_value_read
        } else {
            self.max_speed_value
        }
    }
}

/// One step of a fan's hysteretic threshold curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemperatureThreshold {
    /// Temperature (°C) at which this step engages while heating up
    #[serde(rename = "UpThreshold")]
    pub up_threshold: i32,

    /// Temperature (°C) below which this step disengages while cooling down
    #[serde(rename = "DownThreshold", default)]
    pub down_threshold: i32,

    /// Fan speed percentage while this step is selected
    #[serde(rename = "FanSpeed")]
    pub fan_speed: f32,
}

/// Exact raw-value mapping for a specific speed percentage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FanSpeedPercentageOverride {
    #[serde(rename = "FanSpeedPercentage")]
    pub fan_speed_percentage: f32,

    #[serde(rename = "FanSpeedValue")]
    pub fan_speed_value: u16,

    #[serde(rename = "TargetOperation", default)]
    pub target_operation: OverrideTargetOperation,
}

/// A register poke applied at initialization and/or before fan speed writes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterWriteConfiguration {
    #[serde(rename = "Register")]
    pub register: u8,

    #[serde(rename = "Value")]
    pub value: u8,

    /// Forced to 0 during validation when `ResetRequired` is false
    #[serde(rename = "ResetValue", default)]
    pub reset_value: u8,

    #[serde(rename = "ResetRequired", default)]
    pub reset_required: bool,

    #[serde(rename = "WriteMode", default)]
    pub write_mode: RegisterWriteMode,

    #[serde(rename = "ResetWriteMode", default)]
    pub reset_write_mode: RegisterWriteMode,

    #[serde(rename = "WriteOccasion", default)]
    pub write_occasion: RegisterWriteOccasion,

    #[serde(rename = "Description", default)]
    pub description: String,
}
