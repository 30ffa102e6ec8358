//! Seeded synthetic study region: terrain, daily scenes and a coarse LST label.
//!
//! The world is a small landscape of hills, a lake, a town and vegetation
//! patches. Every scene and every label value is a pure function of the world
//! seed and the date, so repeated fetches return identical imagery.
//!
//! Surface temperature follows a simple energy-balance caricature: warmer on
//! bare and built-up ground, cooler over vegetation and water, with a lapse
//! rate on elevation and a seasonal cycle.

use chrono::{Datelike, NaiveDate};
use nalgebra::DMatrix;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::data::source::{ImageSource, QA_BAND, SourceImage, TerrainLayers};
use crate::domain::{Bounds, DateRange, DateWindow, GridSpec, REFLECTANCE_BANDS};
use crate::error::AppError;
use crate::math::seed::derive_seed;
use crate::raster::{Band, LabelField, RasterField};

/// Environmental lapse rate (°C per metre).
const LAPSE_RATE: f64 = 0.0065;

/// Reference elevation (m) for the lapse-rate correction.
const BASE_ELEVATION: f64 = 300.0;

/// Endmember reflectances in `REFLECTANCE_BANDS` order.
const VEGETATION: [f64; 6] = [0.03, 0.08, 0.04, 0.45, 0.20, 0.10];
const SOIL: [f64; 6] = [0.10, 0.14, 0.18, 0.25, 0.32, 0.26];
const URBAN: [f64; 6] = [0.12, 0.13, 0.15, 0.20, 0.28, 0.25];
const WATER: [f64; 6] = [0.06, 0.07, 0.05, 0.02, 0.01, 0.005];

/// Parameters of the synthetic world.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    pub region: GridSpec,
    pub seed: u64,
    /// Acquisitions per day when the day is not a gap.
    pub scenes_per_day: usize,
    /// Probability that a day has no acquisitions at all.
    pub gap_probability: f64,
    /// Days that never have acquisitions.
    pub missing_days: Vec<NaiveDate>,
    /// Upper bound of scene cloud cover (percent).
    pub max_scene_cloud: f64,
    /// Block size (pixels) of the coarse label.
    pub label_factor: usize,
}

/// Static land-cover fractions used to render scenes.
#[derive(Debug, Clone)]
struct LandCover {
    vegetation: DMatrix<f64>,
    urban: DMatrix<f64>,
    water: DMatrix<f64>,
}

#[derive(Debug, Clone)]
pub struct SyntheticWorld {
    config: WorldConfig,
    terrain: TerrainLayers,
    cover: LandCover,
}

impl SyntheticWorld {
    pub fn generate(config: WorldConfig) -> Result<Self, AppError> {
        let grid = &config.region;
        if grid.width < 3 || grid.height < 3 {
            return Err(AppError::invalid_input("Synthetic region must be at least 3x3 pixels."));
        }
        if !(0.0..1.0).contains(&config.gap_probability) {
            return Err(AppError::invalid_input("Gap probability must lie in [0, 1)."));
        }
        if !(0.0..=100.0).contains(&config.max_scene_cloud) {
            return Err(AppError::invalid_input("Scene cloud cover must lie in [0, 100]."));
        }
        if config.label_factor == 0 {
            return Err(AppError::invalid_input("Label block size must be >= 1."));
        }

        let mut rng = StdRng::seed_from_u64(stream_seed(config.seed, "terrain", None, 0));
        let elevation = generate_elevation(grid, &mut rng);
        let slope = slope_degrees(&elevation, grid.scale);
        let tpi = topographic_position(&elevation);
        let terrain = TerrainLayers::new(grid.clone(), elevation, slope, tpi)?;

        let cover = generate_land_cover(grid, terrain.elevation(), &mut rng);

        Ok(Self {
            config,
            terrain,
            cover,
        })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn terrain(&self) -> &TerrainLayers {
        &self.terrain
    }

    /// Whether the archive has any acquisition on `date`.
    pub fn has_acquisitions(&self, date: NaiveDate) -> bool {
        if self.config.scenes_per_day == 0 || self.config.missing_days.contains(&date) {
            return false;
        }
        if self.config.gap_probability <= 0.0 {
            return true;
        }
        let mut rng = StdRng::seed_from_u64(stream_seed(self.config.seed, "gap", Some(date), 0));
        rng.r#gen::<f64>() >= self.config.gap_probability
    }

    /// Render acquisition `pass` of `date` (reflectance bands + QA flags).
    pub fn scene(&self, date: NaiveDate, pass: usize) -> Result<SourceImage, AppError> {
        let grid = &self.config.region;
        let mut rng = StdRng::seed_from_u64(stream_seed(self.config.seed, "scene", Some(date), pass));
        let noise = Normal::new(0.0, 0.004)
            .map_err(|e| AppError::computation(format!("Noise distribution error: {e}")))?;

        let cloud_cover = rng.gen_range(0.0..=self.config.max_scene_cloud);
        let qa = cloud_blob(grid, cloud_cover, &mut rng);
        let green_up = seasonal_vegetation(date);

        let mut bands: Vec<DMatrix<f64>> = (0..REFLECTANCE_BANDS.len())
            .map(|_| DMatrix::zeros(grid.height, grid.width))
            .collect();
        for r in 0..grid.height {
            for c in 0..grid.width {
                let refl = self.mixed_reflectance(r, c, green_up);
                for (b, band) in bands.iter_mut().enumerate() {
                    band[(r, c)] = (refl[b] + noise.sample(&mut rng)).clamp(0.0, 1.0);
                }
            }
        }

        let mut out: Vec<Band> = REFLECTANCE_BANDS
            .iter()
            .zip(bands)
            .map(|(name, values)| Band::new(*name, values))
            .collect();
        out.push(Band::new(QA_BAND, qa));

        Ok(SourceImage {
            id: format!("SYN_{}_{pass}", date.format("%Y%m%d")),
            date,
            cloud_cover,
            field: RasterField::new(grid.clone(), out)?,
        })
    }

    /// Noise-free surface temperature (°C) on `date`.
    pub fn true_lst(&self, date: NaiveDate) -> DMatrix<f64> {
        let grid = &self.config.region;
        let green_up = seasonal_vegetation(date);
        let season = seasonal_temperature(date);
        let elevation = self.terrain.elevation();
        let slope = self.terrain.slope();

        DMatrix::from_fn(grid.height, grid.width, |r, c| {
            let refl = self.mixed_reflectance(r, c, green_up);
            let ndvi = (refl[3] - refl[2]) / (refl[3] + refl[2]);
            season - LAPSE_RATE * (elevation[(r, c)] - BASE_ELEVATION) - 12.0 * ndvi
                + 6.0 * self.cover.urban[(r, c)]
                - 8.0 * self.cover.water[(r, c)]
                - 0.05 * slope[(r, c)]
        })
    }

    /// Mean true LST over `range`, block-averaged to the coarse label grid and
    /// painted back onto the fine grid.
    pub fn reference_label(&self, range: &DateRange, name: &str) -> Result<LabelField, AppError> {
        let grid = &self.config.region;
        let days = range.days();
        let mut sum = DMatrix::<f64>::zeros(grid.height, grid.width);
        for &day in &days {
            sum += self.true_lst(day);
        }
        let mean = sum / days.len() as f64;

        let f = self.config.label_factor;
        let mut coarse = DMatrix::<f64>::zeros(grid.height, grid.width);
        for br in (0..grid.height).step_by(f) {
            for bc in (0..grid.width).step_by(f) {
                let r1 = (br + f).min(grid.height);
                let c1 = (bc + f).min(grid.width);
                let block = mean.view((br, bc), (r1 - br, c1 - bc));
                let value = block.mean();
                coarse.view_mut((br, bc), (r1 - br, c1 - bc)).fill(value);
            }
        }

        LabelField::new(RasterField::single(grid.clone(), name, coarse)?)
    }

    fn mixed_reflectance(&self, r: usize, c: usize, green_up: f64) -> [f64; 6] {
        let w = self.cover.water[(r, c)];
        let u = self.cover.urban[(r, c)];
        let v = (self.cover.vegetation[(r, c)] * green_up).min(1.0 - u);
        let s = (1.0 - u - v).max(0.0);

        let mut out = [0.0; 6];
        for b in 0..6 {
            let land = v * VEGETATION[b] + u * URBAN[b] + s * SOIL[b];
            out[b] = w * WATER[b] + (1.0 - w) * land;
        }
        out
    }
}

impl ImageSource for SyntheticWorld {
    fn fetch(
        &self,
        bounds: &Bounds,
        window: &DateWindow,
        max_cloud_cover: f64,
    ) -> Result<Vec<SourceImage>, AppError> {
        if !self.config.region.bounds().intersects(bounds) {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        let mut day = window.start;
        while window.contains(day) {
            if self.has_acquisitions(day) {
                for pass in 0..self.config.scenes_per_day {
                    let image = self.scene(day, pass)?;
                    if image.cloud_cover <= max_cloud_cover {
                        out.push(image);
                    }
                }
            }
            day = match day.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        Ok(out)
    }
}

fn stream_seed(seed: u64, tag: &str, date: Option<NaiveDate>, pass: usize) -> u64 {
    let day = date.map_or(0, |d| d.num_days_from_ce() as u64);
    derive_seed(seed, tag, &[day, pass as u64])
}

/// Hills on a gently tilted plain.
fn generate_elevation(grid: &GridSpec, rng: &mut StdRng) -> DMatrix<f64> {
    let w = grid.width as f64;
    let h = grid.height as f64;
    let hills: Vec<(f64, f64, f64, f64)> = (0..4)
        .map(|_| {
            (
                rng.gen_range(0.0..h),
                rng.gen_range(0.0..w),
                rng.gen_range(80.0..400.0),
                rng.gen_range(0.1..0.3) * w.max(h),
            )
        })
        .collect();

    DMatrix::from_fn(grid.height, grid.width, |r, c| {
        let (rf, cf) = (r as f64, c as f64);
        let tilt = 40.0 * (rf / h) + 20.0 * (cf / w);
        let relief: f64 = hills
            .iter()
            .map(|&(hr, hc, amp, radius)| {
                let d2 = (rf - hr).powi(2) + (cf - hc).powi(2);
                amp * (-d2 / (2.0 * radius * radius)).exp()
            })
            .sum();
        BASE_ELEVATION + tilt + relief
    })
}

/// Slope in degrees from central differences (edge-clamped).
fn slope_degrees(elevation: &DMatrix<f64>, scale: f64) -> DMatrix<f64> {
    let (rows, cols) = elevation.shape();
    DMatrix::from_fn(rows, cols, |r, c| {
        let up = elevation[(r.saturating_sub(1), c)];
        let down = elevation[((r + 1).min(rows - 1), c)];
        let left = elevation[(r, c.saturating_sub(1))];
        let right = elevation[(r, (c + 1).min(cols - 1))];
        let dz_dy = (down - up) / (2.0 * scale);
        let dz_dx = (right - left) / (2.0 * scale);
        (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan().to_degrees()
    })
}

/// Elevation minus the mean of its 3x3 neighbourhood.
fn topographic_position(elevation: &DMatrix<f64>) -> DMatrix<f64> {
    let (rows, cols) = elevation.shape();
    DMatrix::from_fn(rows, cols, |r, c| {
        let mut sum = 0.0;
        let mut n = 0.0;
        for rr in r.saturating_sub(1)..=(r + 1).min(rows - 1) {
            for cc in c.saturating_sub(1)..=(c + 1).min(cols - 1) {
                sum += elevation[(rr, cc)];
                n += 1.0;
            }
        }
        elevation[(r, c)] - sum / n
    })
}

fn generate_land_cover(grid: &GridSpec, elevation: &DMatrix<f64>, rng: &mut StdRng) -> LandCover {
    let w = grid.width as f64;
    let h = grid.height as f64;

    let phases: Vec<(f64, f64, f64)> = (0..3)
        .map(|_| {
            (
                rng.gen_range(0.0..std::f64::consts::TAU),
                rng.gen_range(1.0..4.0),
                rng.gen_range(1.0..4.0),
            )
        })
        .collect();
    let town = (rng.gen_range(0.2..0.8) * h, rng.gen_range(0.2..0.8) * w);
    let town_radius = 0.15 * w.min(h);

    let (e_min, e_max) = elevation
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let lake_level = e_min + 0.04 * (e_max - e_min);

    let water = elevation.map(|e| if e <= lake_level { 1.0 } else { 0.0 });
    let urban = DMatrix::from_fn(grid.height, grid.width, |r, c| {
        let d2 = (r as f64 - town.0).powi(2) + (c as f64 - town.1).powi(2);
        (0.9 * (-d2 / (2.0 * town_radius * town_radius)).exp()).min(0.9)
    });
    let vegetation = DMatrix::from_fn(grid.height, grid.width, |r, c| {
        let (u, v) = (r as f64 / h, c as f64 / w);
        let texture: f64 = phases
            .iter()
            .map(|&(phase, fu, fv)| (std::f64::consts::TAU * (fu * u + fv * v) + phase).sin())
            .sum::<f64>()
            / 3.0;
        let upland = (elevation[(r, c)] - e_min) / (e_max - e_min).max(1e-9);
        let score = 1.5 * texture + 1.0 - 1.2 * upland;
        let veg = 1.0 / (1.0 + (-score).exp());
        (veg * (1.0 - urban[(r, c)])).clamp(0.0, 1.0)
    });

    LandCover {
        vegetation,
        urban,
        water,
    }
}

/// A disc of clouded pixels covering roughly `cover_pct` of the region.
fn cloud_blob(grid: &GridSpec, cover_pct: f64, rng: &mut StdRng) -> DMatrix<f64> {
    let area = cover_pct / 100.0 * grid.pixel_count() as f64;
    let radius = (area / std::f64::consts::PI).sqrt();
    let cr = rng.gen_range(0.0..grid.height as f64);
    let cc = rng.gen_range(0.0..grid.width as f64);
    DMatrix::from_fn(grid.height, grid.width, |r, c| {
        let d2 = (r as f64 + 0.5 - cr).powi(2) + (c as f64 + 0.5 - cc).powi(2);
        if radius > 0.0 && d2 <= radius * radius { 1.0 } else { 0.0 }
    })
}

/// Vegetation vigour multiplier, peaking in early summer.
fn seasonal_vegetation(date: NaiveDate) -> f64 {
    let doy = date.ordinal() as f64;
    0.8 + 0.2 * (std::f64::consts::TAU * (doy - 80.0) / 365.25).sin()
}

/// Base air-surface temperature (°C) with an annual cycle.
fn seasonal_temperature(date: NaiveDate) -> f64 {
    let doy = date.ordinal() as f64;
    22.0 + 12.0 * (std::f64::consts::TAU * (doy - 110.0) / 365.25).sin()
}
