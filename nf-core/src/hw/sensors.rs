//! hwmon temperature sensor enumeration
//!
//! Walks `/sys/class/hwmon/hwmon*`, collecting every `tempN_input` together
//! with its chip name (the `name` file) and, when present, its
//! `tempN_label`. Values are millidegrees Celsius.

use std::fs;
use std::path::{Path, PathBuf};

use nf_error::{Error, Result};
use tracing::{debug, info};

use crate::constants::paths;

/// One temperature input below a hwmon chip
#[derive(Debug, Clone)]
pub struct Sensor {
    /// Chip name from the hwmon `name` file (e.g. `coretemp`)
    pub chip: String,
    /// Channel label from `tempN_label`, when the driver provides one
    pub label: Option<String>,
    /// Full path of the `tempN_input` file
    pub input_path: PathBuf,
}

impl Sensor {
    /// Whether this sensor is addressed by `name` in a temperature source
    pub fn matches(&self, name: &str) -> bool {
        self.chip == name || self.label.as_deref() == Some(name)
    }

    /// Current reading in degrees Celsius
    pub fn read_celsius(&self) -> Result<f64> {
        let contents = fs::read_to_string(&self.input_path)
            .map_err(|e| Error::sensor(format!("{}: {e}", self.input_path.display())))?;
        let millidegrees: f64 = contents
            .trim()
            .parse()
            .map_err(|e| Error::sensor(format!("{}: {e}", self.input_path.display())))?;
        Ok(millidegrees / 1000.0)
    }
}

/// All temperature sensors discovered on the system
pub struct SensorHub {
    sensors: Vec<Sensor>,
}

impl SensorHub {
    pub fn discover() -> Result<Self> {
        Self::discover_at(Path::new(paths::HWMON_BASE))
    }

    /// Enumerate sensors below an arbitrary hwmon-shaped tree
    pub fn discover_at(root: &Path) -> Result<Self> {
        let mut sensors = Vec::new();

        let entries = fs::read_dir(root)
            .map_err(|e| Error::sensor(format!("{}: {e}", root.display())))?;

        for entry in entries.flatten() {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }

            let chip = fs::read_to_string(dir.join("name"))
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|_| "unknown".to_string());

            let Ok(files) = fs::read_dir(&dir) else {
                continue;
            };

            for file in files.flatten() {
                let file_name = file.file_name();
                let file_name = file_name.to_string_lossy();
                if !file_name.starts_with("temp") || !file_name.ends_with("_input") {
                    continue;
                }

                let label_file = file_name.replace("_input", "_label");
                let label = fs::read_to_string(dir.join(label_file))
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty());

                debug!(
                    "found sensor {} ({:?}) at {}",
                    chip,
                    label,
                    file.path().display()
                );

                sensors.push(Sensor {
                    chip: chip.clone(),
                    label,
                    input_path: file.path(),
                });
            }
        }

        if sensors.is_empty() {
            return Err(Error::sensor(format!(
                "no hwmon temperature sensors found below {}",
                root.display()
            )));
        }

        // hwmon enumeration order is not stable across boots
        sensors.sort_by(|a, b| a.input_path.cmp(&b.input_path));

        info!("discovered {} temperature sensors", sensors.len());
        Ok(Self { sensors })
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Sensor> {
        self.sensors.get(index)
    }

    /// Read the sensor at `index` in degrees Celsius
    pub fn read(&self, index: usize) -> Result<f64> {
        self.sensors
            .get(index)
            .ok_or_else(|| Error::sensor(format!("no sensor with index {index}")))?
            .read_celsius()
    }

    /// Indices of every discovered sensor
    pub fn all_indices(&self) -> Vec<usize> {
        (0..self.sensors.len()).collect()
    }

    /// Indices of sensors whose chip name or label matches any of `names`
    pub fn indices_matching(&self, names: &[String]) -> Vec<usize> {
        self.sensors
            .iter()
            .enumerate()
            .filter(|(_, sensor)| names.iter().any(|name| sensor.matches(name)))
            .map(|(index, _)| index)
            .collect()
    }
}
