//! Stratified point sampling over the feature stack.
//!
//! Steps:
//! 1. classify every pixel into an equal-width bin of the stratum band
//! 2. keep pixels where every feature and the label are finite
//! 3. split the requested total across classes in proportion to their area
//!    (largest-remainder rounding, so allocations sum to the total)
//! 4. draw without replacement inside each class from a class-specific RNG
//!
//! Every random draw is derived from the caller's seed, so identical inputs
//! always yield the identical `SampleSet`.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use tracing::debug;

use crate::domain::{Sample, SampleSet, StratumAllocation, StratumRule};
use crate::error::AppError;
use crate::math::seed::derive_seed;
use crate::features::FeatureStack;
use crate::raster::LabelField;

/// Per-pixel class ids in row-major order (`row * width + col`).
///
/// Pixels with a missing stratum value are `None`.
pub fn classify_strata(stack: &FeatureStack, rule: &StratumRule) -> Result<Vec<Option<u32>>, AppError> {
    if rule.bins == 0 {
        return Err(AppError::invalid_input("Stratum bin count must be >= 1."));
    }
    let band = stack.field().require_band(&rule.band)?;
    let (rows, cols) = band.shape();

    let (lo, hi) = band
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    let mut out = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            let v = band[(r, c)];
            if !v.is_finite() {
                out.push(None);
                continue;
            }
            let class = if hi > lo {
                let u = (v - lo) / (hi - lo);
                ((u * rule.bins as f64) as usize).min(rule.bins - 1)
            } else {
                0
            };
            out.push(Some(class as u32));
        }
    }
    Ok(out)
}

/// Draw a class-balanced `SampleSet` of roughly `total` points.
///
/// Fewer points are returned when the region has fewer eligible pixels. A
/// class with no eligible pixels contributes nothing.
pub fn stratified_sample(
    stack: &FeatureStack,
    label: &LabelField,
    rule: &StratumRule,
    total: usize,
    seed: u64,
) -> Result<SampleSet, AppError> {
    let grid = stack.field().grid();
    if label.field().grid() != grid {
        return Err(AppError::computation("Label and feature stack do not share the same grid."));
    }

    let classes = classify_strata(stack, rule)?;
    let feature_names: Vec<String> = stack.band_names().iter().map(|s| s.to_string()).collect();
    let layers: Vec<_> = stack.field().bands().iter().map(|b| &b.values).collect();
    let label_values = label.values();

    // Eligible pixel indices per class.
    let mut pools: Vec<Vec<usize>> = vec![Vec::new(); rule.bins];
    for (idx, class) in classes.iter().enumerate() {
        let Some(class) = class else { continue };
        let (r, c) = (idx / grid.width, idx % grid.width);
        let complete = label_values[(r, c)].is_finite() && layers.iter().all(|m| m[(r, c)].is_finite());
        if complete {
            pools[*class as usize].push(idx);
        }
    }

    let counts: Vec<usize> = pools.iter().map(|p| p.len()).collect();
    let requested = allocate_proportional(&counts, total);

    let mut samples = Vec::with_capacity(requested.iter().sum());
    let mut allocations = Vec::with_capacity(rule.bins);
    for (class, pool) in pools.iter().enumerate() {
        let want = requested[class];
        let take = want.min(pool.len());

        let mut rng = StdRng::seed_from_u64(class_seed(seed, class));
        let mut picked: Vec<usize> = index::sample(&mut rng, pool.len(), take)
            .into_iter()
            .map(|i| pool[i])
            .collect();
        picked.sort_unstable();

        for idx in picked {
            let (r, c) = (idx / grid.width, idx % grid.width);
            let (x, y) = grid.pixel_center(r, c);
            samples.push(Sample {
                row: r,
                col: c,
                x,
                y,
                stratum: class as u32,
                features: layers.iter().map(|m| m[(r, c)]).collect(),
                label: label_values[(r, c)],
            });
        }

        debug!(class, pixels = pool.len(), requested = want, drawn = take, "stratum sampled");
        allocations.push(StratumAllocation {
            class: class as u32,
            pixel_count: pool.len(),
            requested: want,
            drawn: take,
        });
    }

    Ok(SampleSet {
        feature_names,
        label_name: label.name().to_string(),
        samples,
        allocations,
    })
}

/// Split `total` across classes proportionally to `counts`.
///
/// Uses largest-remainder rounding (ties to the lower class id) and never
/// assigns to an empty class.
pub fn allocate_proportional(counts: &[usize], total: usize) -> Vec<usize> {
    let area: usize = counts.iter().sum();
    if area == 0 || total == 0 {
        return vec![0; counts.len()];
    }
    let total = total.min(area);

    let quotas: Vec<f64> = counts
        .iter()
        .map(|&c| total as f64 * c as f64 / area as f64)
        .collect();
    let mut out: Vec<usize> = quotas.iter().map(|q| q.floor() as usize).collect();
    let mut remaining = total - out.iter().sum::<usize>();

    let mut order: Vec<usize> = (0..counts.len()).filter(|&i| counts[i] > 0).collect();
    order.sort_by(|&a, &b| {
        let ra = quotas[a] - quotas[a].floor();
        let rb = quotas[b] - quotas[b].floor();
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal).then(a.cmp(&b))
    });
    for i in order {
        if remaining == 0 {
            break;
        }
        if out[i] < counts[i] {
            out[i] += 1;
            remaining -= 1;
        }
    }
    out
}

fn class_seed(seed: u64, class: usize) -> u64 {
    derive_seed(seed, "stratum", &[class as u64])
}
