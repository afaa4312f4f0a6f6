//! Hysteretic threshold curve selection
//!
//! A threshold table maps temperature bands to fan speeds with separate
//! engage (`UpThreshold`) and release (`DownThreshold`) temperatures per
//! step, so the selected step only changes when the temperature leaves the
//! current band. This keeps the fan from oscillating around a single
//! boundary temperature.

use crate::data::TemperatureThreshold;

pub struct ThresholdManager {
    /// Sorted ascending by `UpThreshold`
    thresholds: Vec<TemperatureThreshold>,
    current: usize,
}

impl ThresholdManager {
    /// Build a manager over a non-empty threshold table.
    ///
    /// The table is sorted by `UpThreshold`; selection starts at the lowest
    /// step.
    pub fn new(mut thresholds: Vec<TemperatureThreshold>) -> Self {
        debug_assert!(!thresholds.is_empty());
        thresholds.sort_by_key(|t| t.up_threshold);
        Self {
            thresholds,
            current: 0,
        }
    }

    /// Advance or retreat the selected step for `temperature` and return it.
    pub fn select(&mut self, temperature: f64) -> &TemperatureThreshold {
        // Climb past every step whose UpThreshold has been reached.
        let mut next = self.current;
        for (index, threshold) in self.thresholds.iter().enumerate().skip(self.current + 1) {
            if temperature >= threshold.up_threshold as f64 {
                next = index;
            }
        }

        if next == self.current && temperature < self.thresholds[self.current].down_threshold as f64
        {
            // Fell out of the current band: back to the highest step whose
            // UpThreshold is still reached, or the lowest step.
            next = self
                .thresholds
                .iter()
                .rposition(|t| temperature >= t.up_threshold as f64)
                .unwrap_or(0);
        }

        self.current = next;
        &self.thresholds[self.current]
    }

    /// The step selected by the last `select` call
    pub fn current(&self) -> &TemperatureThreshold {
        &self.thresholds[self.current]
    }

    pub fn reset(&mut self) {
        self.current = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threshold(up: i32, down: i32, speed: f32) -> TemperatureThreshold {
        TemperatureThreshold {
            up_threshold: up,
            down_threshold: down,
            fan_speed: speed,
        }
    }

    fn two_step() -> ThresholdManager {
        ThresholdManager::new(vec![threshold(60, 48, 10.0), threshold(65, 55, 50.0)])
    }

    #[test]
    fn test_starts_at_lowest_step() {
        let manager = two_step();
        assert_eq!(manager.current().fan_speed, 10.0);
    }

    #[test]
    fn test_advance_hold_retreat() {
        let mut manager = two_step();
        assert_eq!(manager.select(50.0).fan_speed, 10.0);
        assert_eq!(manager.select(66.0).fan_speed, 50.0);
        // Inside the band: 55 <= t < 65 keeps the upper step selected
        assert_eq!(manager.select(58.0).fan_speed, 50.0);
        assert_eq!(manager.select(55.0).fan_speed, 50.0);
        // Below the release temperature the selection falls back
        assert_eq!(manager.select(54.0).fan_speed, 10.0);
    }

    #[test]
    fn test_multi_step_jump() {
        let mut manager = ThresholdManager::new(vec![
            threshold(0, 0, 0.0),
            threshold(60, 50, 40.0),
            threshold(70, 62, 100.0),
        ]);
        // A large jump climbs multiple steps in one tick
        assert_eq!(manager.select(85.0).fan_speed, 100.0);
        // And falls back across multiple steps likewise
        assert_eq!(manager.select(30.0).fan_speed, 0.0);
    }

    #[test]
    fn test_full_sweep_over_simple_table() {
        let mut manager =
            ThresholdManager::new(vec![threshold(0, 0, 0.0), threshold(60, 50, 100.0)]);
        let speeds: Vec<f32> = [30.0, 65.0, 55.0, 45.0]
            .iter()
            .map(|&t| manager.select(t).fan_speed)
            .collect();
        assert_eq!(speeds, vec![0.0, 100.0, 100.0, 0.0]);
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let mut manager = ThresholdManager::new(vec![
            threshold(70, 62, 100.0),
            threshold(0, 0, 0.0),
            threshold(60, 50, 40.0),
        ]);
        assert_eq!(manager.current().fan_speed, 0.0);
        assert_eq!(manager.select(61.0).fan_speed, 40.0);
    }

    #[test]
    fn test_reset_returns_to_lowest() {
        let mut manager = two_step();
        manager.select(80.0);
        assert_eq!(manager.current().fan_speed, 50.0);
        manager.reset();
        assert_eq!(manager.current().fan_speed, 10.0);
    }
}
