//! Immutable multi-band raster fields.
//!
//! Bands are stored as `height x width` matrices (row-major in spirit: index
//! `(row, col)`), with `NaN` marking missing pixels.

use nalgebra::DMatrix;

use crate::domain::GridSpec;
use crate::error::AppError;

/// One named band of a raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub name: String,
    pub values: DMatrix<f64>,
}

impl Band {
    pub fn new(name: impl Into<String>, values: DMatrix<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Summary statistics over the finite pixels of a band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandStats {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// A grid of values over a region, with one or more named bands.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterField {
    grid: GridSpec,
    bands: Vec<Band>,
}

impl RasterField {
    /// Build a field, checking band shapes and name uniqueness.
    pub fn new(grid: GridSpec, bands: Vec<Band>) -> Result<Self, AppError> {
        if bands.is_empty() {
            return Err(AppError::computation("A raster field needs at least one band."));
        }
        for (i, band) in bands.iter().enumerate() {
            if band.values.nrows() != grid.height || band.values.ncols() != grid.width {
                return Err(AppError::computation(format!(
                    "Band '{}' is {}x{}, expected {}x{}.",
                    band.name,
                    band.values.nrows(),
                    band.values.ncols(),
                    grid.height,
                    grid.width
                )));
            }
            if bands[..i].iter().any(|b| b.name == band.name) {
                return Err(AppError::computation(format!(
                    "Duplicate band name '{}'.",
                    band.name
                )));
            }
        }
        Ok(Self { grid, bands })
    }

    /// Convenience constructor for a single-band field.
    pub fn single(grid: GridSpec, name: impl Into<String>, values: DMatrix<f64>) -> Result<Self, AppError> {
        Self::new(grid, vec![Band::new(name, values)])
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn band(&self, name: &str) -> Option<&DMatrix<f64>> {
        self.bands.iter().find(|b| b.name == name).map(|b| &b.values)
    }

    pub fn require_band(&self, name: &str) -> Result<&DMatrix<f64>, AppError> {
        self.band(name).ok_or_else(|| {
            AppError::computation(format!(
                "Band '{name}' not found (available: {}).",
                self.band_names().join(", ")
            ))
        })
    }

    /// Stats over finite pixels, or `None` if the band is missing or fully masked.
    pub fn stats(&self, name: &str) -> Option<BandStats> {
        let band = self.band(name)?;
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &v in band.iter() {
            if !v.is_finite() {
                continue;
            }
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        if count == 0 {
            return None;
        }
        Some(BandStats {
            count,
            mean: sum / count as f64,
            min,
            max,
        })
    }
}

/// Coarse reference target: a single-band field.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelField {
    field: RasterField,
}

impl LabelField {
    pub fn new(field: RasterField) -> Result<Self, AppError> {
        if field.bands().len() != 1 {
            return Err(AppError::invalid_input(format!(
                "Label field must have exactly one band, got {}.",
                field.bands().len()
            )));
        }
        Ok(Self { field })
    }

    pub fn name(&self) -> &str {
        &self.field.bands()[0].name
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.field.bands()[0].values
    }

    pub fn field(&self) -> &RasterField {
        &self.field
    }
}
