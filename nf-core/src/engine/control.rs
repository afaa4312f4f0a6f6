//! Per-fan temperature aggregation
//!
//! Each fan is fed by a set of hwmon sensors folded into a single reading
//! (average, minimum, or maximum), smoothed by the temperature filter, and
//! handed to the fan's state machine. A fan without a configured source
//! uses every discovered sensor with the average algorithm.

use std::time::Duration;

use nf_error::{Error, Result};
use tracing::{info, warn};

use super::fan::Fan;
use super::filter::TemperatureFilter;
use crate::data::{FanTemperatureSource, TemperatureAlgorithm};
use crate::hw::SensorHub;

pub struct FanTemperatureControl {
    pub fan: Fan,
    algorithm: TemperatureAlgorithm,
    sensor_indices: Vec<usize>,
    filter: TemperatureFilter,
    temperature: f64,
}

impl FanTemperatureControl {
    pub fn new(fan: Fan, poll_interval: Duration) -> Self {
        Self {
            fan,
            algorithm: TemperatureAlgorithm::Average,
            sensor_indices: Vec::new(),
            filter: TemperatureFilter::new(poll_interval, poll_interval),
            temperature: 0.0,
        }
    }

    /// Default binding: every discovered sensor, averaged.
    pub fn use_all_sensors(&mut self, hub: &SensorHub) {
        self.set_sources(TemperatureAlgorithm::Average, hub.all_indices());
    }

    pub fn set_sources(&mut self, algorithm: TemperatureAlgorithm, sensor_indices: Vec<usize>) {
        self.algorithm = algorithm;
        self.sensor_indices = sensor_indices;
        self.filter.reset();
    }

    /// Read, aggregate, filter, and feed the fan's state machine.
    ///
    /// Individual sensor failures are tolerated with a warning; the update
    /// fails only when no sensor delivered a reading.
    pub fn update(&mut self, hub: &SensorHub) -> Result<()> {
        let mut readings = Vec::with_capacity(self.sensor_indices.len());

        for &index in &self.sensor_indices {
            match hub.read(index) {
                Ok(value) => readings.push(value),
                Err(e) => warn!(
                    "fan '{}': sensor read failed: {e}",
                    self.fan.display_name()
                ),
            }
        }

        if readings.is_empty() {
            return Err(Error::sensor(format!(
                "all temperature sensors failed for fan '{}'",
                self.fan.display_name()
            )));
        }

        let aggregated = aggregate(self.algorithm, &readings);
        self.temperature = self.filter.filter(aggregated);
        self.fan.set_temperature(self.temperature);
        Ok(())
    }

    /// Filtered temperature driving this fan
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Bind configured temperature sources to their fans.
    ///
    /// Fans not named by any source keep their defaults.
    pub fn set_by_config(
        controls: &mut [FanTemperatureControl],
        sources: &[FanTemperatureSource],
        hub: &SensorHub,
    ) -> Result<()> {
        for source in sources {
            let fan_count = controls.len();
            let control = controls.get_mut(source.fan_index).ok_or_else(|| {
                Error::config(format!(
                    "FanTemperatureSources: FanIndex {} out of range (have {} fans)",
                    source.fan_index, fan_count
                ))
            })?;

            let indices = if source.sensors.is_empty() {
                hub.all_indices()
            } else {
                hub.indices_matching(&source.sensors)
            };

            if indices.is_empty() {
                return Err(Error::sensor(format!(
                    "FanTemperatureSources: no sensors matching {:?}",
                    source.sensors
                )));
            }

            info!(
                "fan '{}': {:?} over {} sensor(s)",
                control.fan.display_name(),
                source.algorithm,
                indices.len()
            );
            control.set_sources(source.algorithm, indices);
        }

        Ok(())
    }
}

fn aggregate(algorithm: TemperatureAlgorithm, readings: &[f64]) -> f64 {
    match algorithm {
        TemperatureAlgorithm::Average => {
            readings.iter().sum::<f64>() / readings.len() as f64
        }
        TemperatureAlgorithm::Min => readings.iter().copied().fold(f64::INFINITY, f64::min),
        TemperatureAlgorithm::Max => readings.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}
