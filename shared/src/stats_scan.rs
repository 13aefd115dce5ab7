//! RunningStats - incremental statistics over pixel values
//!
//! Accumulates count, sum, sum of squares, min and max in a single pass so that
//! region statistics can be built while iterating a masked image without
//! materialising the selected values. Mean and population standard deviation
//! are derived from the accumulated moments.

use thiserror::Error;

/// Error types for RunningStats operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("No data provided (empty selection)")]
    NoData,
}

/// Single pass accumulator of min, max, sum and sum of squares.
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    min_value: Option<f64>,
    max_value: Option<f64>,
    sum: f64,
    sum_sq: f64,
    count: usize,
}

impl RunningStats {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Build statistics from an iterator of values
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut stats = Self::new();
        for value in values {
            stats.push(value);
        }
        stats
    }

    /// Add a single value. NaN values are ignored.
    pub fn push(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }

        self.sum += value;
        self.sum_sq += value * value;
        self.count += 1;

        match (self.min_value, self.max_value) {
            (Some(min), Some(max)) => {
                if value < min {
                    self.min_value = Some(value);
                }
                if value > max {
                    self.max_value = Some(value);
                }
            }
            _ => {
                self.min_value = Some(value);
                self.max_value = Some(value);
            }
        }
    }

    /// Get the count of values accumulated
    pub fn count(&self) -> usize {
        self.count
    }

    /// Get the minimum value
    pub fn min(&self) -> Result<f64, StatsError> {
        self.min_value.ok_or(StatsError::NoData)
    }

    /// Get the maximum value
    pub fn max(&self) -> Result<f64, StatsError> {
        self.max_value.ok_or(StatsError::NoData)
    }

    /// Get the sum of all values (0 for an empty accumulator)
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Get the arithmetic mean
    pub fn mean(&self) -> Result<f64, StatsError> {
        if self.count == 0 {
            Err(StatsError::NoData)
        } else {
            Ok(self.sum / self.count as f64)
        }
    }

    /// Population variance from the accumulated moments.
    ///
    /// Clamped at zero to absorb rounding in the `E[x^2] - E[x]^2` form.
    pub fn variance(&self) -> Result<f64, StatsError> {
        let mean = self.mean()?;
        let n = self.count as f64;
        Ok((self.sum_sq / n - mean * mean).max(0.0))
    }

    /// Population standard deviation
    pub fn std_dev(&self) -> Result<f64, StatsError> {
        Ok(self.variance()?.sqrt())
    }

    /// Combine with another accumulator
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if let (Some(min), Some(max)) = (other.min_value, other.max_value) {
            self.min_value = Some(self.min_value.map_or(min, |m| m.min(min)));
            self.max_value = Some(self.max_value.map_or(max, |m| m.max(max)));
        }
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
        self.count += other.count;
    }
}
