//! Fan control engine
//!
//! - `thresholds` - hysteretic threshold curve selection
//! - `filter` - exponential temperature smoothing
//! - `fan` - per-fan state machine and speed encoding
//! - `control` - sensor aggregation feeding each fan
//! - `registers` - Set/And/Or register write configurations

pub mod control;
pub mod fan;
pub mod filter;
pub mod registers;
pub mod thresholds;

pub use control::FanTemperatureControl;
pub use fan::{Fan, FanMode};
pub use filter::TemperatureFilter;
pub use thresholds::ThresholdManager;
