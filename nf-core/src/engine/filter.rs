//! Exponential temperature smoothing
//!
//! First-order low-pass over the aggregated sensor readings, so short
//! temperature spikes do not bounce the fan speed around. The coefficient
//! is derived from the sampling interval and the time constant as
//! `alpha = 1 - exp(-dt/tau)`; with `tau` equal to the poll interval, one
//! interval absorbs ~63% of a step.

use std::time::Duration;

pub struct TemperatureFilter {
    alpha: f64,
    state: Option<f64>,
}

impl TemperatureFilter {
    /// Filter with time constant `time_constant`, sampled every
    /// `sample_interval`.
    pub fn new(time_constant: Duration, sample_interval: Duration) -> Self {
        let tau = time_constant.as_secs_f64().max(f64::EPSILON);
        let dt = sample_interval.as_secs_f64();
        Self {
            alpha: 1.0 - (-dt / tau).exp(),
            state: None,
        }
    }

    /// Feed one sample and return the filtered value.
    ///
    /// The first sample initializes the filter.
    pub fn filter(&mut self, sample: f64) -> f64 {
        let value = match self.state {
            None => sample,
            Some(previous) => previous + self.alpha * (sample - previous),
        };
        self.state = Some(value);
        value
    }

    /// Last filtered value, if any sample has been seen
    pub fn value(&self) -> Option<f64> {
        self.state
    }

    /// Drop the history; the next sample re-initializes the filter.
    pub fn reset(&mut self) {
        self.state = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_second_filter() -> TemperatureFilter {
        TemperatureFilter::new(Duration::from_secs(1), Duration::from_secs(1))
    }

    #[test]
    fn test_first_sample_passes_through() {
        let mut filter = one_second_filter();
        assert_eq!(filter.filter(42.5), 42.5);
        assert_eq!(filter.value(), Some(42.5));
    }

    #[test]
    fn test_step_response_after_one_interval() {
        let mut filter = one_second_filter();
        filter.filter(0.0);
        let value = filter.filter(100.0);
        // 1 - e^-1 of the step within one sample interval
        assert!((value - 63.212).abs() < 0.01, "got {value}");
    }

    #[test]
    fn test_converges_to_constant_input() {
        let mut filter = one_second_filter();
        filter.filter(20.0);
        let mut value = 0.0;
        for _ in 0..50 {
            value = filter.filter(80.0);
        }
        assert!((value - 80.0).abs() < 0.01);
    }

    #[test]
    fn test_reset_reinitializes() {
        let mut filter = one_second_filter();
        filter.filter(90.0);
        filter.reset();
        assert_eq!(filter.value(), None);
        assert_eq!(filter.filter(30.0), 30.0);
    }

    #[test]
    fn test_faster_sampling_smooths_harder() {
        let mut slow = TemperatureFilter::new(Duration::from_secs(1), Duration::from_secs(1));
        let mut fast = TemperatureFilter::new(Duration::from_secs(1), Duration::from_millis(100));
        slow.filter(0.0);
        fast.filter(0.0);
        assert!(fast.filter(100.0) < slow.filter(100.0));
    }
}
