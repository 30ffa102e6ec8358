//! Ordered per-day prediction series.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::TimeStep;
use crate::error::AppError;
use crate::raster::RasterField;

/// Exactly one `TimeStep` per requested day, ascending by date.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionSeries {
    steps: Vec<TimeStep>,
}

/// Per-day quality summary of a series entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesRow {
    pub date: NaiveDate,
    pub valid: bool,
    pub source_image_count: usize,
    /// Pixels with a finite prediction.
    pub valid_pixels: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl PredictionSeries {
    /// Order `steps` by date and check them against `requested`.
    ///
    /// Errors if a requested day has no entry, a day appears twice, or an
    /// entry falls outside the request.
    pub fn assemble(mut steps: Vec<TimeStep>, requested: &[NaiveDate]) -> Result<Self, AppError> {
        steps.sort_by_key(|s| s.date());

        let mut expected: Vec<NaiveDate> = requested.to_vec();
        expected.sort_unstable();
        expected.dedup();

        if let Some(pair) = steps.windows(2).find(|w| w[0].date() == w[1].date()) {
            return Err(AppError::computation(format!(
                "Series has more than one entry for {}.",
                pair[0].date()
            )));
        }
        for day in &expected {
            if steps.binary_search_by_key(day, |s| s.date()).is_err() {
                return Err(AppError::computation(format!("Series has no entry for {day}.")));
            }
        }
        if steps.len() != expected.len() {
            let extra = steps
                .iter()
                .map(|s| s.date())
                .find(|d| expected.binary_search(d).is_err());
            return Err(AppError::computation(match extra {
                Some(d) => format!("Series entry {d} was not requested."),
                None => "Series length does not match the requested days.".to_string(),
            }));
        }

        Ok(Self { steps })
    }

    /// Every entry, `NoData` placeholders included.
    pub fn entries(&self) -> &[TimeStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Valid entries only, as `(date, field, source image count)`.
    pub fn valid(&self) -> impl Iterator<Item = (NaiveDate, &RasterField, usize)> + '_ {
        self.steps.iter().filter_map(|step| match step {
            TimeStep::Valid {
                date,
                field,
                source_image_count,
            } => Some((*date, field, *source_image_count)),
            TimeStep::NoData { .. } => None,
        })
    }

    pub fn valid_count(&self) -> usize {
        self.valid().count()
    }

    /// Per-day QA rows for the prediction band `band`.
    pub fn rows(&self, band: &str) -> Vec<SeriesRow> {
        self.steps
            .iter()
            .map(|step| {
                let stats = step.field().and_then(|f| f.stats(band));
                SeriesRow {
                    date: step.date(),
                    valid: step.is_valid(),
                    source_image_count: step.source_image_count(),
                    valid_pixels: stats.map_or(0, |s| s.count),
                    mean: stats.map(|s| s.mean),
                    min: stats.map(|s| s.min),
                    max: stats.map(|s| s.max),
                }
            })
            .collect()
    }
}
