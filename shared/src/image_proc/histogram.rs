//! Fixed-bin intensity histograms.
//!
//! Integer images (8/16-bit) map each value directly onto its own bin. Float
//! images are binned over an explicit `[min, max]` range with a fixed number of
//! bins; the value-to-bin conversion rounds half up so that a value exactly
//! between two bin centres always lands in the upper bin.
//!
//! The histogram is the input to the auto-threshold family in
//! [`crate::image_proc::thresholding`] and provides cumulative queries (mean,
//! standard deviation, percentile) used for background estimation.

use thiserror::Error;

/// Default number of bins used for float data
pub const FLOAT_HISTOGRAM_BINS: usize = 65536;

/// Errors raised while building a histogram
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HistogramError {
    #[error("No values were supplied to the histogram")]
    Empty,
    #[error("Histogram must have at least one bin")]
    ZeroBins,
    #[error("Invalid histogram range [{0}, {1}]")]
    InvalidRange(f64, f64),
    #[error("Unsupported integer bit depth {0}")]
    UnsupportedBitDepth(u32),
}

/// Round half up to the nearest integer (`0.5 -> 1`, `-0.5 -> 0`).
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Integer count histogram with a linear value mapping.
///
/// Bin `i` represents the value `min_value + i * bin_width`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    counts: Vec<u64>,
    min_value: f64,
    bin_width: f64,
}

impl Histogram {
    /// Build a histogram with one bin per integer value for the given bit depth.
    ///
    /// Values are rounded half up and clamped into `[0, 2^bits - 1]`.
    ///
    /// # Errors
    /// * `UnsupportedBitDepth` unless `bit_depth` is 8 or 16
    /// * `Empty` if no values were supplied
    pub fn integer<I>(values: I, bit_depth: u32) -> Result<Self, HistogramError>
    where
        I: IntoIterator<Item = f64>,
    {
        let bins = match bit_depth {
            8 => 256,
            16 => 65536,
            other => return Err(HistogramError::UnsupportedBitDepth(other)),
        };
        let top = (bins - 1) as f64;

        let mut counts = vec![0u64; bins];
        for value in values {
            let bin = round_half_up(value).clamp(0.0, top) as usize;
            counts[bin] += 1;
        }

        Self::from_counts(counts, 0.0, 1.0)
    }

    /// Build a histogram over an explicit value range.
    ///
    /// The first bin is centred on `min` and the last bin on `max`. A degenerate
    /// range (`min == max`) collapses all values into bin 0.
    pub fn from_range<I>(values: I, min: f64, max: f64, bins: usize) -> Result<Self, HistogramError>
    where
        I: IntoIterator<Item = f64>,
    {
        if bins == 0 {
            return Err(HistogramError::ZeroBins);
        }
        if !min.is_finite() || !max.is_finite() || max < min {
            return Err(HistogramError::InvalidRange(min, max));
        }

        let bin_width = if max > min && bins > 1 {
            (max - min) / (bins - 1) as f64
        } else {
            1.0
        };

        let mut histogram = Self {
            counts: vec![0u64; bins],
            min_value: min,
            bin_width,
        };
        for value in values {
            if value.is_nan() {
                continue;
            }
            let bin = histogram.bin_of(value);
            histogram.counts[bin] += 1;
        }

        if histogram.total() == 0 {
            return Err(HistogramError::Empty);
        }
        Ok(histogram)
    }

    /// Wrap pre-computed counts.
    pub fn from_counts(
        counts: Vec<u64>,
        min_value: f64,
        bin_width: f64,
    ) -> Result<Self, HistogramError> {
        if counts.is_empty() {
            return Err(HistogramError::ZeroBins);
        }
        if counts.iter().all(|&c| c == 0) {
            return Err(HistogramError::Empty);
        }
        Ok(Self {
            counts,
            min_value,
            bin_width,
        })
    }

    /// Raw bin counts
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Number of bins
    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    /// Value width of one bin
    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    /// Total number of values in the histogram
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// First occupied bin
    pub fn min_bin(&self) -> Option<usize> {
        self.counts.iter().position(|&c| c > 0)
    }

    /// Last occupied bin
    pub fn max_bin(&self) -> Option<usize> {
        self.counts.iter().rposition(|&c| c > 0)
    }

    /// Value represented by a bin
    pub fn value_of(&self, bin: usize) -> f64 {
        self.min_value + bin as f64 * self.bin_width
    }

    /// Bin holding a value (round half up, clamped to the histogram range)
    pub fn bin_of(&self, value: f64) -> usize {
        let top = (self.counts.len() - 1) as f64;
        round_half_up((value - self.min_value) / self.bin_width).clamp(0.0, top) as usize
    }

    /// Mean of the binned values
    pub fn mean(&self) -> f64 {
        let total = self.total() as f64;
        let sum: f64 = self
            .counts
            .iter()
            .enumerate()
            .map(|(bin, &count)| self.value_of(bin) * count as f64)
            .sum();
        sum / total
    }

    /// Population standard deviation of the binned values
    pub fn std_dev(&self) -> f64 {
        let total = self.total() as f64;
        if total < 2.0 {
            return 0.0;
        }
        let mean = self.mean();
        let sum_sq: f64 = self
            .counts
            .iter()
            .enumerate()
            .map(|(bin, &count)| {
                let d = self.value_of(bin) - mean;
                d * d * count as f64
            })
            .sum();
        (sum_sq / total).sqrt()
    }

    /// Value of the first bin at which the cumulative count reaches `fraction` of the total.
    pub fn percentile(&self, fraction: f64) -> f64 {
        let fraction = fraction.clamp(0.0, 1.0);
        let target = fraction * self.total() as f64;
        let mut cumulative = 0u64;
        for (bin, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if count > 0 && cumulative as f64 >= target {
                return self.value_of(bin);
            }
        }
        self.value_of(self.max_bin().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(0.5), 1.0);
        assert_eq!(round_half_up(1.49), 1.0);
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-0.5), 0.0);
        assert_eq!(round_half_up(-1.5), -1.0);
    }

    #[test]
    fn test_integer_histogram() {
        let hist = Histogram::integer([0.0, 1.0, 1.0, 255.0, 300.0], 8).unwrap();

        assert_eq!(hist.bins(), 256);
        assert_eq!(hist.total(), 5);
        assert_eq!(hist.counts()[1], 2);
        assert_eq!(hist.counts()[255], 2); // 300 clamps into the top bin
        assert_eq!(hist.min_bin(), Some(0));
        assert_eq!(hist.max_bin(), Some(255));
    }

    #[test]
    fn test_unsupported_bit_depth() {
        assert_eq!(
            Histogram::integer([1.0], 12),
            Err(HistogramError::UnsupportedBitDepth(12))
        );
    }

    #[test]
    fn test_empty_histogram() {
        assert_eq!(
            Histogram::integer(std::iter::empty(), 16),
            Err(HistogramError::Empty)
        );
    }

    #[test]
    fn test_float_range_rounds_half_up() {
        // 11 bins over [0, 1] -> width 0.1; 0.05 sits exactly between bins 0 and 1
        let hist = Histogram::from_range([0.05, 0.04, 1.0], 0.0, 1.0, 11).unwrap();
        assert_relative_eq!(hist.bin_width(), 0.1);
        assert_eq!(hist.counts()[0], 1);
        assert_eq!(hist.counts()[1], 1);
        assert_eq!(hist.counts()[10], 1);
        assert_relative_eq!(hist.value_of(10), 1.0);
    }

    #[test]
    fn test_degenerate_range() {
        let hist = Histogram::from_range([3.0, 3.0], 3.0, 3.0, 16).unwrap();
        assert_eq!(hist.counts()[0], 2);
        assert_relative_eq!(hist.value_of(0), 3.0);
    }

    #[test]
    fn test_invalid_range() {
        assert!(matches!(
            Histogram::from_range([1.0], 2.0, 1.0, 4),
            Err(HistogramError::InvalidRange(_, _))
        ));
        assert_eq!(
            Histogram::from_range([1.0], 0.0, 1.0, 0),
            Err(HistogramError::ZeroBins)
        );
    }

    #[test]
    fn test_mean_std_percentile() {
        let hist = Histogram::integer([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 8).unwrap();
        assert_relative_eq!(hist.mean(), 5.0);
        assert_relative_eq!(hist.std_dev(), 2.0);
        assert_relative_eq!(hist.percentile(0.5), 4.0);
        assert_relative_eq!(hist.percentile(1.0), 9.0);
        assert_relative_eq!(hist.percentile(0.0), 2.0);
    }
}
