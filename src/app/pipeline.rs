//! Shared pipeline logic used by the `run`, `rank` and `predict` commands.
//!
//! Keeping the workflow in one place avoids duplicating it across commands:
//! training composite -> feature stack -> stratified sample -> ranking ->
//! selection -> training -> per-day inference -> series assembly
//!
//! The commands then only decide what to print or export.

use tracing::info;

use crate::data::{CloudMask, ImageSource, SourceImage, TerrainLayers};
use crate::domain::{DateRange, FeatureRanking, GridSpec, PipelineConfig, SampleSet};
use crate::error::AppError;
use crate::features::{FeatureStack, build_feature_stack};
use crate::inference::InferenceEngine;
use crate::model::{RegressionModel, TrainedModel, train_model};
use crate::raster::{LabelField, median_composite};
use crate::sampling::stratified_sample;
use crate::selection::{FeatureSelection, rank_features, select_features};
use crate::series::PredictionSeries;

/// External collaborators of a run.
pub struct RunInputs<'a> {
    pub source: &'a dyn ImageSource,
    pub mask: &'a dyn CloudMask,
    pub terrain: &'a TerrainLayers,
}

/// Outputs of sampling and ranking the training window.
#[derive(Debug, Clone)]
pub struct RankOutput {
    /// Source images in the training composite.
    pub image_count: usize,
    pub stack: FeatureStack,
    pub samples: SampleSet,
    pub ranking: FeatureRanking,
    pub selection: FeatureSelection,
}

/// All computed outputs of a full run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub rank: RankOutput,
    pub trained: TrainedModel,
    pub series: PredictionSeries,
}

/// Composite the training window and derive its feature stack.
///
/// A training window without imagery is fatal: nothing can be sampled.
pub fn training_stack(config: &PipelineConfig, inputs: &RunInputs<'_>) -> Result<(FeatureStack, usize), AppError> {
    let bounds = config.region.bounds();
    let images = inputs
        .source
        .fetch(&bounds, &config.training.window(), config.max_cloud_cover)?;
    if images.is_empty() {
        return Err(AppError::insufficient_data(format!(
            "No source imagery in the training window {} .. {}.",
            config.training.start, config.training.end
        )));
    }

    let masked: Vec<SourceImage> = images.iter().map(|image| inputs.mask.mask_clouds(image)).collect();
    let composite = median_composite(&masked)?;
    let stack = build_feature_stack(&composite, inputs.terrain)?;
    info!(images = masked.len(), "training composite built");
    Ok((stack, masked.len()))
}

/// Sample the training stack against `label` and rank the candidate features.
pub fn run_rank(config: &PipelineConfig, inputs: &RunInputs<'_>, label: &LabelField) -> Result<RankOutput, AppError> {
    config.validate()?;
    let (stack, image_count) = training_stack(config, inputs)?;

    let samples = stratified_sample(&stack, label, &config.strata, config.sample_count, config.seed)?;
    if samples.is_empty() {
        return Err(AppError::insufficient_data(
            "Stratified sampling produced no samples (no pixel has finite features and label).",
        ));
    }
    info!(samples = samples.len(), strata = samples.allocations.len(), "samples drawn");

    let ranking = rank_features(&samples, &config.candidates)?;
    let selection = select_features(&ranking, &samples, config.top_k, config.redundancy_threshold)?;
    info!(selected = %selection.selected.join(","), "features selected");

    Ok(RankOutput {
        image_count,
        stack,
        samples,
        ranking,
        selection,
    })
}

/// Predict every day of `range` with `model` and assemble the series.
pub fn run_prediction(
    model: &RegressionModel,
    range: &DateRange,
    region: &GridSpec,
    max_cloud_cover: f64,
    output_band: &str,
    inputs: &RunInputs<'_>,
) -> Result<PredictionSeries, AppError> {
    let engine = InferenceEngine {
        source: inputs.source,
        mask: inputs.mask,
        terrain: inputs.terrain,
        model,
        bounds: region.bounds(),
        max_cloud_cover,
        output_band: output_band.to_string(),
    };
    let days = range.days();
    let steps = engine.run(&days)?;
    PredictionSeries::assemble(steps, &days)
}

/// Execute the full pipeline.
pub fn run_pipeline(config: &PipelineConfig, inputs: &RunInputs<'_>, label: &LabelField) -> Result<RunOutput, AppError> {
    let rank = run_rank(config, inputs, label)?;
    let trained = train_model(
        &rank.samples,
        &rank.selection.selected,
        &config.forest,
        config.split_ratio,
        config.seed,
    )?;

    let series = run_prediction(
        &trained.model,
        &config.prediction,
        &config.region,
        config.max_cloud_cover,
        &config.output_band,
        inputs,
    )?;
    info!(days = series.len(), valid = series.valid_count(), "series assembled");

    Ok(RunOutput { rank, trained, series })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{QaBandMask, SyntheticWorld, fixtures};
    use crate::domain::TimeStep;

    fn inputs<'a>(world: &'a SyntheticWorld, mask: &'a QaBandMask) -> RunInputs<'a> {
        RunInputs {
            source: world,
            mask,
            terrain: world.terrain(),
        }
    }

    #[test]
    fn five_day_run_keeps_the_gap_as_no_data() {
        let config = fixtures::config();
        let world = fixtures::world(vec![fixtures::day(13)]);
        let label = world.reference_label(&config.training, "LST").unwrap();
        let mask = QaBandMask::default();

        let out = run_pipeline(&config, &inputs(&world, &mask), &label).unwrap();

        assert_eq!(out.rank.image_count, 20);
        assert_eq!(out.rank.selection.selected.len(), config.top_k);
        assert_eq!(out.trained.model.feature_names, out.rank.selection.selected);

        let entries = out.series.entries();
        assert_eq!(entries.len(), 5);
        assert_eq!(
            entries.iter().map(|s| s.date()).collect::<Vec<_>>(),
            config.prediction.days()
        );
        assert_eq!(entries[2], TimeStep::NoData { date: fixtures::day(13) });
        assert_eq!(out.series.valid_count(), 4);
        for (date, field, count) in out.series.valid() {
            assert_ne!(date, fixtures::day(13));
            assert_eq!(count, 2);
            assert_eq!(field.band_names(), vec!["LST"]);
        }
    }

    #[test]
    fn ranking_prefers_informative_features() {
        let config = fixtures::config();
        let world = fixtures::world(vec![]);
        let label = world.reference_label(&config.training, "LST").unwrap();
        let mask = QaBandMask::default();

        let out = run_rank(&config, &inputs(&world, &mask), &label).unwrap();
        let scores = &out.ranking.scores;
        assert!(scores.windows(2).all(|w| w[0].r2 >= w[1].r2));
        assert!(scores[0].r2 > 0.1, "top r2 {}", scores[0].r2);
        assert_eq!(out.selection.shortlist.len(), (2 * config.top_k).min(scores.len()));
    }

    #[test]
    fn rerun_is_deterministic() {
        let config = fixtures::config();
        let world = fixtures::world(vec![fixtures::day(12)]);
        let label = world.reference_label(&config.training, "LST").unwrap();
        let mask = QaBandMask::default();

        let a = run_pipeline(&config, &inputs(&world, &mask), &label).unwrap();
        let b = run_pipeline(&config, &inputs(&world, &mask), &label).unwrap();
        assert_eq!(a.rank.samples, b.rank.samples);
        assert_eq!(a.rank.ranking, b.rank.ranking);
        assert_eq!(a.trained.model, b.trained.model);
        assert_eq!(a.series.rows("LST"), b.series.rows("LST"));
    }

    #[test]
    fn empty_training_window_is_fatal() {
        let config = fixtures::config();
        let world = fixtures::world(config.training.days());
        let label = world.reference_label(&config.training, "LST").unwrap();
        let mask = QaBandMask::default();

        let err = run_pipeline(&config, &inputs(&world, &mask), &label).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn unknown_candidate_is_rejected() {
        let mut config = fixtures::config();
        config.candidates.push("lst_night".to_string());
        let world = fixtures::world(vec![]);
        let label = world.reference_label(&config.training, "LST").unwrap();
        let mask = QaBandMask::default();

        let err = run_rank(&config, &inputs(&world, &mask), &label).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
