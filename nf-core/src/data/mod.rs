//! Configuration data model
//!
//! - `types` - the per-model configuration schema
//! - `service` - the persisted service configuration
//! - `validation` - cross-field validation and default substitution

pub mod service;
pub mod types;
pub mod validation;

pub use service::{FanTemperatureSource, ServiceConfig, TargetSpeed};
pub use types::{
    EcKind, FanConfiguration, FanSpeedPercentageOverride, ModelConfig, OverrideTargetOperation,
    RegisterWriteConfiguration, RegisterWriteMode, RegisterWriteOccasion, TemperatureAlgorithm,
    TemperatureThreshold,
};
