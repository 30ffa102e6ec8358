//! Feature stack derivation.
//!
//! `build_feature_stack` is the only place predictor bands are derived. The
//! training composite and every per-day composite go through it, so the band
//! set seen by the model at fit time and at prediction time cannot drift.

use nalgebra::DMatrix;

use crate::data::TerrainLayers;
use crate::error::AppError;
use crate::raster::{Band, RasterField};

/// Predictor bands, in stack order.
///
/// - `red`, `nir`: surface reflectance
/// - `ndvi`: (nir - red) / (nir + red)
/// - `ndwi`: (green - nir) / (green + nir)
/// - `ndbi`: (swir1 - nir) / (swir1 + nir)
/// - `elevation`, `tpi`, `slope`: terrain collaborator layers
pub const FEATURE_BANDS: [&str; 8] = ["red", "nir", "ndvi", "ndwi", "ndbi", "elevation", "tpi", "slope"];

/// A raster whose bands are exactly `FEATURE_BANDS`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureStack {
    field: RasterField,
}

impl FeatureStack {
    pub fn field(&self) -> &RasterField {
        &self.field
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.field.band_names()
    }

    pub fn band(&self, name: &str) -> Option<&DMatrix<f64>> {
        self.field.band(name)
    }

    /// Resolve `names` to bands, in order.
    ///
    /// A missing name is a configuration error: the model would otherwise be
    /// fed the wrong column.
    pub fn select(&self, names: &[String]) -> Result<Vec<&DMatrix<f64>>, AppError> {
        names
            .iter()
            .map(|name| {
                self.field.band(name).ok_or_else(|| {
                    AppError::computation(format!(
                        "Feature mismatch: band '{name}' is not in the feature stack [{}].",
                        self.band_names().join(", ")
                    ))
                })
            })
            .collect()
    }
}

/// Derive the predictor stack from a reflectance composite and terrain layers.
pub fn build_feature_stack(composite: &RasterField, terrain: &TerrainLayers) -> Result<FeatureStack, AppError> {
    if composite.grid() != terrain.grid() {
        return Err(AppError::computation(
            "Composite and terrain layers do not share the same grid.",
        ));
    }

    let green = composite.require_band("green")?;
    let red = composite.require_band("red")?;
    let nir = composite.require_band("nir")?;
    let swir1 = composite.require_band("swir1")?;

    let bands = vec![
        Band::new("red", red.clone()),
        Band::new("nir", nir.clone()),
        Band::new("ndvi", normalized_difference(nir, red)),
        Band::new("ndwi", normalized_difference(green, nir)),
        Band::new("ndbi", normalized_difference(swir1, nir)),
        Band::new("elevation", terrain.elevation().clone()),
        Band::new("tpi", terrain.tpi().clone()),
        Band::new("slope", terrain.slope().clone()),
    ];

    Ok(FeatureStack {
        field: RasterField::new(composite.grid().clone(), bands)?,
    })
}

/// `(a - b) / (a + b)` per pixel; missing where an input is missing or the
/// denominator vanishes.
pub fn normalized_difference(a: &DMatrix<f64>, b: &DMatrix<f64>) -> DMatrix<f64> {
    a.zip_map(b, |x, y| {
        let denom = x + y;
        if !(x.is_finite() && y.is_finite()) || denom.abs() < 1e-12 {
            f64::NAN
        } else {
            (x - y) / denom
        }
    })
}
