//! Online statistics.

/// Running count, sum, extremes, mean and variance of a stream of values.
///
/// Uses Welford's update so the variance stays accurate over arbitrarily
/// long streams. Has no identity and can be used on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct StatAccumulator {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    mean: f64,
    m2: f64,
}

impl StatAccumulator {
    pub fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            mean: 0.0,
            m2: 0.0,
        }
    }

    /// Folds one value in.
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Smallest value, `+inf` when empty.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Largest value, `-inf` when empty.
    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance, 0 for fewer than two values.
    pub fn variance(&self) -> f64 {
        if self.count <= 1 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// Population variance, 0 when empty.
    pub fn variance_n(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    /// Square root of the population variance.
    pub fn standard_deviation(&self) -> f64 {
        self.variance_n().sqrt()
    }
}

impl Default for StatAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_accumulator() {
        let stat = StatAccumulator::new();
        assert_eq!(stat.count(), 0);
        assert_eq!(stat.mean(), 0.0);
        assert_eq!(stat.variance(), 0.0);
        assert_eq!(stat.variance_n(), 0.0);
        assert!(stat.min().is_infinite());
    }

    #[test]
    fn single_value_has_zero_variance() {
        let mut stat = StatAccumulator::new();
        stat.add(7.0);
        assert_eq!(stat.mean(), 7.0);
        assert_eq!(stat.variance(), 0.0);
        assert_eq!(stat.variance_n(), 0.0);
    }

    #[test]
    fn known_series() {
        let mut stat = StatAccumulator::new();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stat.add(v);
        }
        assert_eq!(stat.count(), 8);
        assert!(close(stat.sum(), 40.0));
        assert!(close(stat.mean(), 5.0));
        assert!(close(stat.variance_n(), 4.0));
        assert!(close(stat.standard_deviation(), 2.0));
        assert!(close(stat.variance(), 32.0 / 7.0));
        assert_eq!(stat.min(), 2.0);
        assert_eq!(stat.max(), 9.0);
    }

    #[test]
    fn stays_stable_with_large_offset() {
        let mut stat = StatAccumulator::new();
        for v in [1e9 + 4.0, 1e9 + 7.0, 1e9 + 13.0, 1e9 + 16.0] {
            stat.add(v);
        }
        assert!(close(stat.variance(), 30.0));
    }
}
