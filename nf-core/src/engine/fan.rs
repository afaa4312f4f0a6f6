//! Per-fan state machine
//!
//! A [`Fan`] owns one fan's configuration, its mode (auto or fixed), the
//! critical-temperature override, and the mapping between speed percentages
//! and raw register values. Register writes are buffered in
//! `pending_write` and pushed to the EC by [`Fan::ec_flush`], so a control
//! tick computes everything first and touches the hardware last.

use nf_error::{Error, Result};
use tracing::warn;

use super::thresholds::ThresholdManager;
use crate::data::FanConfiguration;
use crate::hw::EmbeddedController;

/// Speed forced while the critical temperature is exceeded
const CRITICAL_SPEED: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanMode {
    Auto,
    Fixed,
}

pub struct Fan {
    config: FanConfiguration,
    critical_temperature: f64,
    read_write_words: bool,

    mode: FanMode,
    is_critical: bool,
    requested_speed: f32,
    target_speed: f32,
    current_speed: f32,
    auto_speed: f32,
    pending_write: Option<u16>,

    thresholds: ThresholdManager,
}

impl Fan {
    /// Build a fan from its validated configuration.
    pub fn new(
        config: FanConfiguration,
        critical_temperature: i32,
        read_write_words: bool,
    ) -> Result<Self> {
        if config.temperature_thresholds.is_empty() {
            return Err(Error::config(format!(
                "fan '{}' has no temperature thresholds",
                config.display_name()
            )));
        }

        let thresholds = ThresholdManager::new(config.temperature_thresholds.clone());
        let auto_speed = thresholds.current().fan_speed;

        Ok(Self {
            config,
            critical_temperature: critical_temperature as f64,
            read_write_words,
            mode: FanMode::Auto,
            is_critical: false,
            requested_speed: 0.0,
            target_speed: 0.0,
            current_speed: 0.0,
            auto_speed,
            pending_write: None,
            thresholds,
        })
    }

    // ========================================================================
    // Mode changes
    // ========================================================================

    /// Hand control back to the threshold curve.
    ///
    /// The target is recomputed on the next temperature update.
    pub fn set_auto_speed(&mut self) {
        self.mode = FanMode::Auto;
    }

    /// Pin the fan to a fixed speed percentage.
    pub fn set_fixed_speed(&mut self, percent: f32) {
        let percent = if (0.0..=100.0).contains(&percent) {
            percent
        } else {
            warn!(
                "fan '{}': fixed speed {percent} out of range, clamping",
                self.config.display_name()
            );
            percent.clamp(0.0, 100.0)
        };

        self.mode = FanMode::Fixed;
        self.requested_speed = percent;
        self.refresh_target();
    }

    /// Feed the latest (filtered) temperature into the state machine.
    pub fn set_temperature(&mut self, temperature: f64) {
        self.is_critical = temperature >= self.critical_temperature;

        if matches!(self.mode, FanMode::Auto) && !self.is_critical {
            self.auto_speed = self.thresholds.select(temperature).fan_speed;
        }

        self.refresh_target();
    }

    fn refresh_target(&mut self) {
        self.target_speed = if self.is_critical {
            CRITICAL_SPEED
        } else {
            match self.mode {
                FanMode::Auto => self.auto_speed,
                FanMode::Fixed => self.requested_speed,
            }
        };
        self.pending_write = Some(self.encode(self.target_speed));
    }

    // ========================================================================
    // EC access
    // ========================================================================

    /// Push the buffered register value to the EC, if any.
    pub fn ec_flush(&mut self, ec: &mut dyn EmbeddedController) -> Result<()> {
        if let Some(value) = self.pending_write {
            self.write_raw(ec, value)?;
            self.pending_write = None;
        }
        Ok(())
    }

    /// Read the raw register value back and decode it into a percentage.
    pub fn update_current_speed(&mut self, ec: &mut dyn EmbeddedController) -> Result<()> {
        let raw = if self.read_write_words {
            ec.read_word(self.config.read_register)?
        } else {
            ec.read_byte(self.config.read_register)? as u16
        };
        self.current_speed = self.decode(raw);
        Ok(())
    }

    /// Restore the firmware's reset value, for fans that need it on exit.
    pub fn ec_reset(&mut self, ec: &mut dyn EmbeddedController) -> Result<()> {
        if self.config.reset_required {
            self.write_raw(ec, self.config.fan_speed_reset_value)?;
        }
        Ok(())
    }

    fn write_raw(&self, ec: &mut dyn EmbeddedController, value: u16) -> Result<()> {
        if self.read_write_words {
            ec.write_word(self.config.write_register, value)
        } else {
            ec.write_byte(self.config.write_register, value as u8)
        }
    }

    // ========================================================================
    // Speed encoding
    // ========================================================================

    /// Map a speed percentage to the raw register value.
    fn encode(&self, percent: f32) -> u16 {
        for o in &self.config.fan_speed_percentage_overrides {
            if o.target_operation.applies_to_write() && o.fan_speed_percentage == percent {
                return o.fan_speed_value;
            }
        }

        let min = self.config.min_speed_value as f32;
        let max = self.config.max_speed_value as f32;
        let raw = min + (percent / 100.0) * (max - min);
        raw.round().clamp(min.min(max), min.max(max)) as u16
    }

    /// Map a raw register value back to a speed percentage.
    fn decode(&self, raw: u16) -> f32 {
        for o in &self.config.fan_speed_percentage_overrides {
            if o.target_operation.applies_to_read() && o.fan_speed_value == raw {
                return o.fan_speed_percentage;
            }
        }

        let min = self.config.read_min() as f32;
        let max = self.config.read_max() as f32;
        (((raw as f32) - min) / (max - min) * 100.0).clamp(0.0, 100.0)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn display_name(&self) -> &str {
        self.config.display_name()
    }

    pub fn mode(&self) -> FanMode {
        self.mode
    }

    pub fn is_auto(&self) -> bool {
        matches!(self.mode, FanMode::Auto)
    }

    pub fn is_critical(&self) -> bool {
        self.is_critical
    }

    pub fn requested_speed(&self) -> f32 {
        self.requested_speed
    }

    pub fn target_speed(&self) -> f32 {
        self.target_speed
    }

    pub fn current_speed(&self) -> f32 {
        self.current_speed
    }

    /// Number of distinct raw steps between minimum and maximum speed
    pub fn speed_steps(&self) -> u16 {
        self.config.max_speed_value.abs_diff(self.config.min_speed_value)
    }
}
