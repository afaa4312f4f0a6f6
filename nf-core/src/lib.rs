//! notefan Core Library
//!
//! Model-specific fan control for notebooks with fan registers exposed by
//! the embedded controller (EC).
//!
//! # Features
//!
//! - **EC access**: Pluggable register backends (debugfs, ACPI, port I/O)
//!   with auto-detection and a tracing wrapper
//! - **Fan model**: Speed encoding/decoding with percentage overrides,
//!   deferred register writes, critical-temperature override
//! - **Control engine**: Hysteretic threshold curves, exponential
//!   temperature smoothing, multi-sensor aggregation
//! - **Configuration**: JSON model configs and the persisted service config
//!
//! # Module Structure
//!
//! - `data/` - Configuration types, parsing, validation
//! - `hw/` - Hardware interaction (EC backends, hwmon sensors)
//! - `engine/` - Fan state machine, threshold manager, filters, register writes

// Grouped modules
pub mod data;
pub mod engine;
pub mod hw;

// Standalone modules
pub mod constants;

// Re-export primary types from data/
pub use data::{
    EcKind, FanConfiguration, FanSpeedPercentageOverride, FanTemperatureSource, ModelConfig,
    OverrideTargetOperation, RegisterWriteConfiguration, RegisterWriteMode, RegisterWriteOccasion,
    ServiceConfig, TargetSpeed, TemperatureAlgorithm, TemperatureThreshold,
};

// Re-export engine types
pub use engine::{Fan, FanMode, FanTemperatureControl, TemperatureFilter, ThresholdManager};

// Re-export hardware types
pub use hw::{EmbeddedController, Sensor, SensorHub};

// Re-export error types
pub use nf_error::{Error, Result};
