//! Shared domain types.
//!
//! These types are intentionally kept lightweight and (where useful)
//! serializable so they can be:
//!
//! - passed explicitly between pipeline stages
//! - exported to JSON/CSV
//! - reloaded later for prediction with a saved model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::raster::RasterField;

/// Surface reflectance bands carried by every source image.
pub const REFLECTANCE_BANDS: [&str; 6] = ["blue", "green", "red", "nir", "swir1", "swir2"];

/// Default name of the predicted band on every valid time step.
pub const DEFAULT_OUTPUT_BAND: &str = "LST";

/// Axis-aligned region bounds in map units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }
}

/// Raster geometry: size, resolution, placement and CRS.
///
/// `origin_x/origin_y` is the top-left corner; rows grow southwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub width: usize,
    pub height: usize,
    /// Pixel size in map units.
    pub scale: f64,
    pub origin_x: f64,
    pub origin_y: f64,
    pub crs: String,
}

impl GridSpec {
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            min_x: self.origin_x,
            min_y: self.origin_y - self.height as f64 * self.scale,
            max_x: self.origin_x + self.width as f64 * self.scale,
            max_y: self.origin_y,
        }
    }

    /// Map coordinates of a pixel centre.
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        let x = self.origin_x + (col as f64 + 0.5) * self.scale;
        let y = self.origin_y - (row as f64 + 0.5) * self.scale;
        (x, y)
    }
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, AppError> {
        if end < start {
            return Err(AppError::invalid_input(format!(
                "Invalid date range: end {end} is before start {start}."
            )));
        }
        Ok(Self { start, end })
    }

    /// Every day in the range, ascending.
    pub fn days(&self) -> Vec<NaiveDate> {
        self.start.iter_days().take_while(|d| *d <= self.end).collect()
    }

    pub fn day_count(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    /// Half-open fetch window covering the whole range.
    pub fn window(&self) -> DateWindow {
        DateWindow {
            start: self.start,
            end: self.end.succ_opt().unwrap_or(NaiveDate::MAX),
        }
    }
}

/// Half-open fetch window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// The window of a single day.
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date.succ_opt().unwrap_or(NaiveDate::MAX),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

/// Partition rule used by the stratified sampler.
///
/// Pixels are assigned to `bins` equal-width classes over the finite range of
/// `band` (an ancillary layer of the feature stack, typically `elevation`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StratumRule {
    pub band: String,
    pub bins: usize,
}

/// Hyper-parameters of the bagged regression-tree ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Features tried per split. `None` means `ceil(sqrt(k))`.
    pub features_per_split: Option<usize>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 50,
            max_depth: 12,
            min_samples_leaf: 2,
            features_per_split: None,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults) and passed explicitly to every
/// stage; nothing in the crate reads ambient state.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub region: GridSpec,
    /// Window used for the training composite and the reference label.
    pub training: DateRange,
    /// Days to predict.
    pub prediction: DateRange,
    pub candidates: Vec<String>,
    /// Final predictor count `K`.
    pub top_k: usize,
    pub sample_count: usize,
    pub strata: StratumRule,
    /// Probability that a sample lands in the training subset.
    pub split_ratio: f64,
    pub forest: ForestParams,
    pub seed: u64,
    /// Scenes with a larger cloud cover (percent) are not fetched.
    pub max_cloud_cover: f64,
    /// Optional |r| threshold for redundancy pruning of the shortlist.
    pub redundancy_threshold: Option<f64>,
    pub output_band: String,
}

/// Scene cloud-cover thresholds are percentages.
pub fn check_cloud_cover(max_cloud_cover: f64) -> Result<(), AppError> {
    if !(0.0..=100.0).contains(&max_cloud_cover) {
        return Err(AppError::invalid_input(format!(
            "Cloud cover threshold must lie in [0, 100], got {max_cloud_cover}."
        )));
    }
    Ok(())
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.region.width == 0 || self.region.height == 0 {
            return Err(AppError::invalid_input("Region must have a non-zero size."));
        }
        if !(self.region.scale.is_finite() && self.region.scale > 0.0) {
            return Err(AppError::invalid_input("Region scale must be finite and > 0."));
        }
        if self.candidates.is_empty() {
            return Err(AppError::invalid_input("At least one candidate feature is required."));
        }
        if self.top_k == 0 {
            return Err(AppError::invalid_input("Predictor count K must be >= 1."));
        }
        if self.sample_count == 0 {
            return Err(AppError::invalid_input("Sample count must be > 0."));
        }
        if self.strata.bins == 0 {
            return Err(AppError::invalid_input("Stratum bin count must be >= 1."));
        }
        if !(self.split_ratio > 0.0 && self.split_ratio < 1.0) {
            return Err(AppError::invalid_input(format!(
                "Split ratio must lie in (0, 1), got {}.",
                self.split_ratio
            )));
        }
        if self.forest.n_trees == 0 {
            return Err(AppError::invalid_input("Ensemble size must be >= 1."));
        }
        if self.forest.min_samples_leaf == 0 {
            return Err(AppError::invalid_input("Minimum leaf size must be >= 1."));
        }
        check_cloud_cover(self.max_cloud_cover)?;
        if let Some(t) = self.redundancy_threshold {
            if !(t > 0.0 && t <= 1.0) {
                return Err(AppError::invalid_input("Redundancy threshold must lie in (0, 1]."));
            }
        }
        if self.output_band.trim().is_empty() {
            return Err(AppError::invalid_input("Output band name must not be empty."));
        }
        Ok(())
    }
}

/// One sampled pixel joined to its feature and label values.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub row: usize,
    pub col: usize,
    /// Pixel-centre map coordinates.
    pub x: f64,
    pub y: f64,
    pub stratum: u32,
    /// One value per `SampleSet::feature_names` entry.
    pub features: Vec<f64>,
    pub label: f64,
}

/// Per-stratum bookkeeping from a sampling run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StratumAllocation {
    pub class: u32,
    /// Eligible pixels in the class.
    pub pixel_count: usize,
    pub requested: usize,
    pub drawn: usize,
}

/// Ordered collection of samples plus the column names they carry.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSet {
    pub feature_names: Vec<String>,
    pub label_name: String,
    pub samples: Vec<Sample>,
    pub allocations: Vec<StratumAllocation>,
}

impl SampleSet {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    /// All values of one feature column, in sample order.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.feature_index(name)?;
        Some(self.samples.iter().map(|s| s.features[idx]).collect())
    }

    pub fn labels(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.label).collect()
    }
}

/// Univariate association of one feature with the label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScore {
    pub name: String,
    /// Pearson correlation coefficient.
    pub r: f64,
    /// Coefficient of determination (`r²`).
    pub r2: f64,
}

/// A candidate that could not be ranked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedFeature {
    pub name: String,
    pub reason: String,
}

/// Candidates ordered by descending `r²`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRanking {
    pub scores: Vec<FeatureScore>,
    pub excluded: Vec<ExcludedFeature>,
}

/// Outcome of predicting one day.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeStep {
    Valid {
        date: NaiveDate,
        field: RasterField,
        source_image_count: usize,
    },
    /// No usable source imagery for the day.
    NoData { date: NaiveDate },
}

impl TimeStep {
    pub fn date(&self) -> NaiveDate {
        match self {
            TimeStep::Valid { date, .. } | TimeStep::NoData { date } => *date,
        }
    }

    pub fn source_image_count(&self) -> usize {
        match self {
            TimeStep::Valid {
                source_image_count, ..
            } => *source_image_count,
            TimeStep::NoData { .. } => 0,
        }
    }

    pub fn field(&self) -> Option<&RasterField> {
        match self {
            TimeStep::Valid { field, .. } => Some(field),
            TimeStep::NoData { .. } => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, TimeStep::Valid { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn date_range_days_are_inclusive_and_ordered() {
        let range = DateRange::new(d(2023, 2, 27), d(2023, 3, 2)).unwrap();
        let days = range.days();
        assert_eq!(days.len(), 4);
        assert_eq!(range.day_count(), 4);
        assert_eq!(days[0], d(2023, 2, 27));
        assert_eq!(days[3], d(2023, 3, 2));
        assert!(days.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn date_range_rejects_reversed_bounds() {
        let err = DateRange::new(d(2023, 3, 2), d(2023, 3, 1)).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn day_window_is_half_open() {
        let w = DateWindow::day(d(2023, 7, 1));
        assert!(w.contains(d(2023, 7, 1)));
        assert!(!w.contains(d(2023, 7, 2)));
        assert!(!w.contains(d(2023, 6, 30)));
    }

    #[test]
    fn grid_bounds_and_pixel_centres() {
        let grid = GridSpec {
            width: 4,
            height: 2,
            scale: 30.0,
            origin_x: 1000.0,
            origin_y: 2000.0,
            crs: "EPSG:32633".to_string(),
        };
        let b = grid.bounds();
        assert_eq!(b.min_x, 1000.0);
        assert_eq!(b.max_x, 1120.0);
        assert_eq!(b.min_y, 1940.0);
        assert_eq!(b.max_y, 2000.0);
        assert_eq!(grid.pixel_center(1, 2), (1075.0, 1955.0));
    }

    #[test]
    fn cloud_threshold_is_a_percentage() {
        assert!(check_cloud_cover(0.0).is_ok());
        assert!(check_cloud_cover(100.0).is_ok());
        assert_eq!(check_cloud_cover(150.0).unwrap_err().exit_code(), 2);
        assert_eq!(check_cloud_cover(-1.0).unwrap_err().exit_code(), 2);
        assert!(check_cloud_cover(f64::NAN).is_err());
    }

    #[test]
    fn no_data_step_reports_zero_images() {
        let step = TimeStep::NoData { date: d(2023, 7, 3) };
        assert_eq!(step.source_image_count(), 0);
        assert!(step.field().is_none());
        assert!(!step.is_valid());
    }
}
