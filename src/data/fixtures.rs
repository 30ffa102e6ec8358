//! Shared test fixtures.

use chrono::NaiveDate;

use crate::data::source::{CloudMask, ImageSource, QaBandMask};
use crate::data::synthetic::{SyntheticWorld, WorldConfig};
use crate::domain::{DateRange, ForestParams, GridSpec, PipelineConfig, StratumRule};
use crate::features::{FEATURE_BANDS, build_feature_stack};
use crate::model::{RegressionModel, train_model};
use crate::raster::median_composite;
use crate::sampling::stratified_sample;

pub(crate) fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 7, d).unwrap()
}

pub(crate) fn region() -> GridSpec {
    GridSpec {
        width: 24,
        height: 20,
        scale: 30.0,
        origin_x: 500_000.0,
        origin_y: 4_500_000.0,
        crs: "EPSG:32633".to_string(),
    }
}

pub(crate) fn world(missing_days: Vec<NaiveDate>) -> SyntheticWorld {
    SyntheticWorld::generate(WorldConfig {
        region: region(),
        seed: 11,
        scenes_per_day: 2,
        gap_probability: 0.0,
        missing_days,
        max_scene_cloud: 20.0,
        label_factor: 4,
    })
    .unwrap()
}

pub(crate) fn config() -> PipelineConfig {
    PipelineConfig {
        region: region(),
        training: DateRange::new(day(1), day(10)).unwrap(),
        prediction: DateRange::new(day(11), day(15)).unwrap(),
        candidates: FEATURE_BANDS.iter().map(|s| s.to_string()).collect(),
        top_k: 4,
        sample_count: 200,
        strata: StratumRule {
            band: "elevation".to_string(),
            bins: 4,
        },
        split_ratio: 0.7,
        forest: ForestParams {
            n_trees: 8,
            max_depth: 8,
            min_samples_leaf: 2,
            features_per_split: None,
        },
        seed: 42,
        max_cloud_cover: 100.0,
        redundancy_threshold: None,
        output_band: "LST".to_string(),
    }
}

/// Model trained on the fixture world's training window with four predictors.
pub(crate) fn trained_model(world: &SyntheticWorld) -> RegressionModel {
    let config = config();
    let mask = QaBandMask::default();
    let images: Vec<_> = world
        .fetch(&config.region.bounds(), &config.training.window(), config.max_cloud_cover)
        .unwrap()
        .iter()
        .map(|image| mask.mask_clouds(image))
        .collect();
    let stack = build_feature_stack(&median_composite(&images).unwrap(), world.terrain()).unwrap();
    let label = world.reference_label(&config.training, &config.output_band).unwrap();
    let samples = stratified_sample(&stack, &label, &config.strata, config.sample_count, config.seed).unwrap();
    let features: Vec<String> = ["ndvi", "elevation", "ndbi", "tpi"].iter().map(|s| s.to_string()).collect();
    train_model(&samples, &features, &config.forest, config.split_ratio, config.seed)
        .unwrap()
        .model
}
