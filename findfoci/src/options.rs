//! Processing and output options.
//!
//! [`FindFociProcessorOptions`] controls the search itself; [`FindFociOptions`]
//! controls what is produced besides the ranked result list. Both serialise to
//! JSON with `#[serde(default)]`, so a partial document only overrides the
//! fields it names.
//!
//! Out-of-range numeric parameters are never rejected. [`FindFociProcessorOptions::normalised`]
//! clamps them into their valid ranges and the processor always works on the
//! normalised copy.

use serde::{Deserialize, Serialize};
use shared::image_proc::{Connectivity, ThresholdMethod};
use std::path::Path;

use crate::error::Result;

/// How the background level is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackgroundMethod {
    /// Background is zero
    None,
    /// Background is the background parameter
    Absolute,
    /// Background is the auto-threshold of the background region histogram
    AutoThreshold,
    /// Background is the mean of the background region
    Mean,
    /// Background is mean + parameter * standard deviation
    StdDevAboveMean,
    /// Background is the minimum of the mask region (or image)
    MinMaskOrRoi,
}

/// Which pixels feed the background statistics when a mask is supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatisticsMethod {
    All,
    Inside,
    Outside,
}

/// Lowest value a region may grow down to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchMethod {
    AboveBackground,
    FractionOfPeakMinusBackground,
    HalfPeakValue,
}

/// Minimum height of a peak above its highest saddle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeakMethod {
    Absolute,
    Relative,
    RelativeAboveBackground,
}

/// Ranking key for the result list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortMethod {
    Intensity,
    Count,
    MaxValue,
    AverageIntensity,
    IntensityMinusBackground,
    AverageIntensityMinusBackground,
    X,
    Y,
    Z,
    SaddleHeight,
    CountAboveSaddle,
    IntensityAboveSaddle,
    AbsoluteHeight,
    RelativeHeightAboveBackground,
    PeakId,
    Xyz,
    IntensityMinusMin,
    AverageIntensityMinusMin,
}

impl SortMethod {
    /// Whether results are ordered by ascending key
    pub fn is_ascending(&self) -> bool {
        matches!(
            self,
            SortMethod::X | SortMethod::Y | SortMethod::Z | SortMethod::Xyz | SortMethod::PeakId
        )
    }
}

/// How the reported centre of each peak is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CentreMethod {
    MaxValueSearch,
    MaxValueOriginal,
    CentreOfMassSearch,
    CentreOfMassOriginal,
    GaussianSearch,
    GaussianOriginal,
}

impl CentreMethod {
    /// Whether the centre is measured on the unblurred input
    pub fn uses_original(&self) -> bool {
        matches!(
            self,
            CentreMethod::MaxValueOriginal
                | CentreMethod::CentreOfMassOriginal
                | CentreMethod::GaussianOriginal
        )
    }
}

/// Output mask produced alongside the results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaskMethod {
    None,
    Peaks,
    Threshold,
    PeaksAboveSaddle,
    ThresholdedPeaksAboveSaddle,
    FractionOfIntensity,
    FractionOfHeight,
}

/// Search options for [`crate::FindFociProcessor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindFociProcessorOptions {
    pub background_method: BackgroundMethod,
    /// Absolute level or standard deviation multiplier, depending on the method
    pub background_parameter: f64,
    pub threshold_method: ThresholdMethod,
    pub statistics_method: StatisticsMethod,
    pub search_method: SearchMethod,
    pub search_parameter: f64,
    /// Minimum pixel count of a peak
    pub min_size: usize,
    /// Maximum pixel count of a peak (0 = unbounded)
    pub max_size: usize,
    /// Count only pixels above the highest saddle toward the minimum size
    pub minimum_above_saddle: bool,
    /// Restrict the above-saddle count to pixels connected to the maximum
    pub contiguous_above_saddle: bool,
    pub remove_edge_maxima: bool,
    pub peak_method: PeakMethod,
    pub peak_parameter: f64,
    pub sort_method: SortMethod,
    /// Maximum number of results (0 = unlimited)
    pub max_peaks: usize,
    pub centre_method: CentreMethod,
    pub centre_parameter: f64,
    /// Sigma of the Gaussian pre-blur (0 = none)
    pub gaussian_blur: f64,
    /// Fraction used by the fraction-based output masks
    pub fraction_parameter: f64,
}

impl Default for FindFociProcessorOptions {
    fn default() -> Self {
        Self {
            background_method: BackgroundMethod::AutoThreshold,
            background_parameter: 3.0,
            threshold_method: ThresholdMethod::Otsu,
            statistics_method: StatisticsMethod::All,
            search_method: SearchMethod::AboveBackground,
            search_parameter: 0.3,
            min_size: 5,
            max_size: 0,
            minimum_above_saddle: true,
            contiguous_above_saddle: true,
            remove_edge_maxima: false,
            peak_method: PeakMethod::RelativeAboveBackground,
            peak_parameter: 0.5,
            sort_method: SortMethod::Intensity,
            max_peaks: 1000,
            centre_method: CentreMethod::MaxValueSearch,
            centre_parameter: 2.0,
            gaussian_blur: 0.0,
            fraction_parameter: 0.5,
        }
    }
}

fn non_negative(name: &str, value: f64) -> f64 {
    let clamped = if value.is_nan() { 0.0 } else { value.max(0.0) };
    if clamped != value {
        log::debug!("Clamped {name} from {value} to {clamped}");
    }
    clamped
}

fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, json)?;
    Ok(())
}

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let json = std::fs::read_to_string(path)?;
    let value = serde_json::from_str(&json)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(value)
}

impl FindFociProcessorOptions {
    /// Copy with every numeric parameter clamped into its valid range.
    pub fn normalised(&self) -> Self {
        let mut out = self.clone();
        out.background_parameter = non_negative("background_parameter", self.background_parameter);
        out.search_parameter = non_negative("search_parameter", self.search_parameter);
        if out.search_method == SearchMethod::FractionOfPeakMinusBackground
            && out.search_parameter > 1.0
        {
            log::debug!("Clamped search_parameter from {} to 1", out.search_parameter);
            out.search_parameter = 1.0;
        }
        out.peak_parameter = non_negative("peak_parameter", self.peak_parameter);
        out.centre_parameter = non_negative("centre_parameter", self.centre_parameter);
        out.gaussian_blur = non_negative("gaussian_blur", self.gaussian_blur);

        let fraction = if self.fraction_parameter.is_nan() {
            0.5
        } else {
            self.fraction_parameter.clamp(f64::MIN_POSITIVE, 1.0)
        };
        if fraction != self.fraction_parameter {
            log::debug!(
                "Clamped fraction_parameter from {} to {fraction}",
                self.fraction_parameter
            );
        }
        out.fraction_parameter = fraction;
        out
    }

    /// Save to JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        save_json(self, path)
    }

    /// Load from JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        load_json(path)
    }
}

/// Output options: masks, label buffer and object assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindFociOptions {
    pub mask_method: MaskMethod,
    /// Write [`crate::mask::MAXIMA_MARKER`] at each result centre in the mask
    pub mark_maxima_in_mask: bool,
    /// Return the final per-pixel peak id buffer
    pub keep_label_buffer: bool,
    /// Fill each result's object id from the connected objects of the mask
    pub assign_objects: bool,
    pub object_connectivity: Connectivity,
}

impl Default for FindFociOptions {
    fn default() -> Self {
        Self {
            mask_method: MaskMethod::None,
            mark_maxima_in_mask: false,
            keep_label_buffer: false,
            assign_objects: false,
            object_connectivity: Connectivity::Eight,
        }
    }
}

impl FindFociOptions {
    /// Save to JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        save_json(self, path)
    }

    /// Load from JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        load_json(path)
    }
}
