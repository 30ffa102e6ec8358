//! Temporal compositing of source images.

use nalgebra::DMatrix;

use crate::data::SourceImage;
use crate::error::AppError;
use crate::raster::{Band, RasterField};

/// Per-pixel median across images, band by band.
///
/// Only finite observations contribute; a pixel with none stays `NaN`. All
/// images must share the grid and band list of the first one.
pub fn median_composite(images: &[SourceImage]) -> Result<RasterField, AppError> {
    let Some(first) = images.first() else {
        return Err(AppError::computation("Cannot composite an empty image set."));
    };
    let grid = first.field.grid().clone();
    let names: Vec<String> = first.field.band_names().iter().map(|s| s.to_string()).collect();

    for image in &images[1..] {
        if image.field.grid() != &grid {
            return Err(AppError::computation(format!(
                "Image '{}' does not share the composite grid.",
                image.id
            )));
        }
        if image.field.band_names() != first.field.band_names() {
            return Err(AppError::computation(format!(
                "Image '{}' has bands [{}], expected [{}].",
                image.id,
                image.field.band_names().join(", "),
                names.join(", ")
            )));
        }
    }

    let mut bands = Vec::with_capacity(names.len());
    let mut stack = Vec::with_capacity(images.len());
    for name in &names {
        let layers: Vec<&DMatrix<f64>> = images
            .iter()
            .map(|img| img.field.require_band(name))
            .collect::<Result<_, _>>()?;
        let values = DMatrix::from_fn(grid.height, grid.width, |r, c| {
            stack.clear();
            stack.extend(layers.iter().map(|m| m[(r, c)]).filter(|v| v.is_finite()));
            median_mut(&mut stack).unwrap_or(f64::NAN)
        });
        bands.push(Band::new(name.clone(), values));
    }

    RasterField::new(grid, bands)
}

pub(crate) fn median_mut(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}
