//! Per-day inference.
//!
//! Each requested day moves from pending to exactly one of:
//! - `TimeStep::NoData`: the source returned no usable image (or failed)
//! - `TimeStep::Valid`: composite -> feature stack -> model prediction
//!
//! Days share nothing but read-only inputs and are evaluated in parallel.

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::data::{CloudMask, ImageSource, SourceImage, TerrainLayers};
use crate::domain::{Bounds, DateWindow, TimeStep};
use crate::error::AppError;
use crate::features::{FEATURE_BANDS, build_feature_stack};
use crate::model::RegressionModel;
use crate::raster::{RasterField, median_composite};

/// Read-only inputs shared by every day of an inference run.
pub struct InferenceEngine<'a> {
    pub source: &'a dyn ImageSource,
    pub mask: &'a dyn CloudMask,
    pub terrain: &'a TerrainLayers,
    pub model: &'a RegressionModel,
    pub bounds: Bounds,
    pub max_cloud_cover: f64,
    pub output_band: String,
}

impl InferenceEngine<'_> {
    /// Predict every day in `days`, preserving their order.
    ///
    /// The model's feature list is checked against the stack layout before any
    /// day is touched; a mismatch aborts the run.
    pub fn run(&self, days: &[NaiveDate]) -> Result<Vec<TimeStep>, AppError> {
        self.model.check_features(&FEATURE_BANDS)?;
        if !self.terrain.grid().bounds().intersects(&self.bounds) {
            return Err(AppError::invalid_input("Terrain layers do not cover the requested region."));
        }

        let steps: Vec<TimeStep> = days
            .par_iter()
            .map(|&date| self.predict_day(date))
            .collect::<Result<_, _>>()?;

        let valid = steps.iter().filter(|s| s.is_valid()).count();
        info!(days = steps.len(), valid, no_data = steps.len() - valid, "inference finished");
        Ok(steps)
    }

    /// Evaluate one day.
    ///
    /// A failed fetch degrades to `NoData`. Structural failures (grid or
    /// feature mismatch) are returned as errors tagged with the date.
    pub fn predict_day(&self, date: NaiveDate) -> Result<TimeStep, AppError> {
        let window = DateWindow::day(date);
        let images = match self.source.fetch(&self.bounds, &window, self.max_cloud_cover) {
            Ok(images) => images,
            Err(err) => {
                warn!(%date, error = %err, "fetch failed; day marked as no data");
                return Ok(TimeStep::NoData { date });
            }
        };

        if images.is_empty() {
            debug!(%date, "no source imagery");
            return Ok(TimeStep::NoData { date });
        }

        let masked: Vec<SourceImage> = images.iter().map(|image| self.mask.mask_clouds(image)).collect();
        let source_image_count = masked.len();

        let field = self.predict_images(&masked).map_err(|err| {
            AppError::new(err.exit_code(), format!("{date}: {}", err.message()))
        })?;
        debug!(%date, images = source_image_count, "day predicted");

        Ok(TimeStep::Valid {
            date,
            field,
            source_image_count,
        })
    }

    fn predict_images(&self, images: &[SourceImage]) -> Result<RasterField, AppError> {
        let composite = median_composite(images)?;
        let stack = build_feature_stack(&composite, self.terrain)?;
        self.model.predict_stack(&stack, &self.output_band)
    }
}
