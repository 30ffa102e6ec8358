//! Collaborator interfaces for imagery, cloud masking and terrain.
//!
//! The pipeline never talks to an archive directly. It asks an `ImageSource`
//! for the scenes of a window, passes each through a `CloudMask`, and reads
//! static `TerrainLayers` fetched once per region.

use chrono::NaiveDate;
use nalgebra::DMatrix;

use crate::domain::{Bounds, DateWindow, GridSpec};
use crate::error::AppError;
use crate::raster::{Band, RasterField};

/// Name of the per-pixel cloud flag band (non-zero = clouded).
pub const QA_BAND: &str = "qa";

/// Band names of `TerrainLayers`.
pub const ELEVATION_BAND: &str = "elevation";
pub const SLOPE_BAND: &str = "slope";
pub const TPI_BAND: &str = "tpi";

/// One raw multi-band acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    pub id: String,
    pub date: NaiveDate,
    /// Scene-level cloud cover in percent.
    pub cloud_cover: f64,
    pub field: RasterField,
}

/// Query interface of the raw raster archive.
///
/// Implementations own storage and retry logic. An `Err` for one window is
/// treated by the inference engine as "no imagery", never as fatal.
pub trait ImageSource: Sync {
    fn fetch(
        &self,
        bounds: &Bounds,
        window: &DateWindow,
        max_cloud_cover: f64,
    ) -> Result<Vec<SourceImage>, AppError>;
}

/// Pure per-image filter that sets clouded pixels to missing.
pub trait CloudMask: Sync {
    fn mask_clouds(&self, image: &SourceImage) -> SourceImage;
}

/// Masks pixels flagged in a QA band and drops the band afterwards.
#[derive(Debug, Clone)]
pub struct QaBandMask {
    pub band: String,
}

impl Default for QaBandMask {
    fn default() -> Self {
        Self {
            band: QA_BAND.to_string(),
        }
    }
}

impl CloudMask for QaBandMask {
    fn mask_clouds(&self, image: &SourceImage) -> SourceImage {
        let Some(qa) = image.field.band(&self.band) else {
            return image.clone();
        };

        let bands: Vec<Band> = image
            .field
            .bands()
            .iter()
            .filter(|b| b.name != self.band)
            .map(|b| {
                let values = b.values.zip_map(qa, |v, flag| if flag != 0.0 { f64::NAN } else { v });
                Band::new(b.name.clone(), values)
            })
            .collect();

        // A QA-only image has nothing left to mask; keep it untouched.
        match RasterField::new(image.field.grid().clone(), bands) {
            Ok(field) => SourceImage {
                field,
                ..image.clone()
            },
            Err(_) => image.clone(),
        }
    }
}

/// Static terrain derivatives for the region.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainLayers {
    field: RasterField,
}

impl TerrainLayers {
    pub fn new(
        grid: GridSpec,
        elevation: DMatrix<f64>,
        slope: DMatrix<f64>,
        tpi: DMatrix<f64>,
    ) -> Result<Self, AppError> {
        let field = RasterField::new(
            grid,
            vec![
                Band::new(ELEVATION_BAND, elevation),
                Band::new(SLOPE_BAND, slope),
                Band::new(TPI_BAND, tpi),
            ],
        )?;
        Ok(Self { field })
    }

    pub fn grid(&self) -> &GridSpec {
        self.field.grid()
    }

    pub fn elevation(&self) -> &DMatrix<f64> {
        &self.field.bands()[0].values
    }

    pub fn slope(&self) -> &DMatrix<f64> {
        &self.field.bands()[1].values
    }

    pub fn tpi(&self) -> &DMatrix<f64> {
        &self.field.bands()[2].values
    }

    pub fn field(&self) -> &RasterField {
        &self.field
    }
}
