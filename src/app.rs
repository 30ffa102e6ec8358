//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - builds the synthetic region (image source, terrain, label)
//! - runs sampling, ranking, training and per-day inference
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;
use tracing::info;

use crate::cli::{Command, OutputArgs, PredictArgs, RunArgs, WorldArgs};
use crate::data::{QaBandMask, SyntheticWorld, WorldConfig};
use crate::domain::{DateRange, ForestParams, GridSpec, PipelineConfig, StratumRule, check_cloud_cover};
use crate::error::AppError;
use crate::features::FEATURE_BANDS;
use crate::series::PredictionSeries;

pub mod pipeline;

use pipeline::RunInputs;

/// Map origin of the synthetic region (UTM metres).
const ORIGIN_X: f64 = 500_000.0;
const ORIGIN_Y: f64 = 4_500_000.0;

/// Entry point for the `lst` binary.
pub fn run() -> Result<(), AppError> {
    // Clap requires a subcommand name, so bare `lst` (or `lst --flags`) is
    // rewritten to `lst run ...` before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Run(args) => handle_run(args, OutputMode::Full),
        Command::Rank(args) => handle_run(args, OutputMode::RankOnly),
        Command::Predict(args) => handle_predict(args),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Full,
    RankOnly,
}

fn handle_run(args: RunArgs, mode: OutputMode) -> Result<(), AppError> {
    let config = pipeline_config_from_args(&args)?;
    config.validate()?;

    let world = build_world(&args.world)?;
    let label = world.reference_label(&config.training, &config.output_band)?;
    let mask = QaBandMask::default();
    let inputs = RunInputs {
        source: &world,
        mask: &mask,
        terrain: world.terrain(),
    };

    if mode == OutputMode::RankOnly {
        let rank = pipeline::run_rank(&config, &inputs, &label)?;
        println!("{}", crate::report::format_samples(&rank.samples, &config.strata.band));
        println!(
            "{}",
            crate::report::format_ranking(&rank.ranking, Some(&rank.selection), &rank.samples.label_name)
        );
        return Ok(());
    }

    let run = pipeline::run_pipeline(&config, &inputs, &label)?;
    println!(
        "{}",
        crate::report::format_run_summary(&config, &run.rank.samples, &run.trained)
    );
    println!(
        "{}",
        crate::report::format_ranking(&run.rank.ranking, Some(&run.rank.selection), &run.rank.samples.label_name)
    );
    print_series(&run.series, &config.output_band, &args.output)?;

    if let Some(path) = &args.export_model {
        crate::io::write_model_json(path, &run.trained.model, &config.training, &config.output_band)?;
        info!(path = %path.display(), "model written");
    }

    Ok(())
}

fn handle_predict(args: PredictArgs) -> Result<(), AppError> {
    check_cloud_cover(args.max_cloud_cover)?;
    let doc = crate::io::read_model_json(&args.model)?;
    let range = DateRange::new(args.start, args.end)?;
    let world = build_world(&args.world)?;
    let region = world.config().region.clone();
    let mask = QaBandMask::default();
    let inputs = RunInputs {
        source: &world,
        mask: &mask,
        terrain: world.terrain(),
    };

    println!("{}", crate::report::format_model(&doc.model));
    let series = pipeline::run_prediction(
        &doc.model,
        &range,
        &region,
        args.max_cloud_cover,
        &doc.output_band,
        &inputs,
    )?;
    print_series(&series, &doc.output_band, &args.output)
}

fn print_series(series: &PredictionSeries, band: &str, output: &OutputArgs) -> Result<(), AppError> {
    let rows = series.rows(band);
    println!("{}", crate::report::format_series_table(&rows));

    if !output.no_plot {
        let plot = crate::plot::render_series_plot(&rows, band, output.plot_width, output.plot_height);
        println!("{plot}");
    }

    if let Some(path) = &output.export {
        crate::io::write_series_csv(path, &rows)?;
        info!(path = %path.display(), "series written");
    }
    Ok(())
}

fn region_from_args(args: &WorldArgs) -> GridSpec {
    GridSpec {
        width: args.region_width,
        height: args.region_height,
        scale: args.scale,
        origin_x: ORIGIN_X,
        origin_y: ORIGIN_Y,
        crs: args.crs.clone(),
    }
}

fn build_world(args: &WorldArgs) -> Result<SyntheticWorld, AppError> {
    SyntheticWorld::generate(WorldConfig {
        region: region_from_args(args),
        seed: args.world_seed,
        scenes_per_day: args.scenes_per_day,
        gap_probability: args.gap_probability,
        missing_days: args.missing_days.clone(),
        max_scene_cloud: args.max_scene_cloud,
        label_factor: args.label_factor,
    })
}

pub fn pipeline_config_from_args(args: &RunArgs) -> Result<PipelineConfig, AppError> {
    Ok(PipelineConfig {
        region: region_from_args(&args.world),
        training: DateRange::new(args.train_start, args.train_end)?,
        prediction: DateRange::new(args.start, args.end)?,
        candidates: args
            .candidates
            .clone()
            .unwrap_or_else(|| FEATURE_BANDS.iter().map(|s| s.to_string()).collect()),
        top_k: args.top_k,
        sample_count: args.sample_count,
        strata: StratumRule {
            band: args.strata_band.clone(),
            bins: args.strata_bins,
        },
        split_ratio: args.split_ratio,
        forest: ForestParams {
            n_trees: args.trees,
            max_depth: args.max_depth,
            min_samples_leaf: args.min_leaf,
            features_per_split: args.mtry,
        },
        seed: args.seed,
        max_cloud_cover: args.max_cloud_cover,
        redundancy_threshold: args.redundancy,
        output_band: args.band.clone(),
    })
}

/// Rewrite argv so `lst` defaults to `lst run`.
///
/// Rules:
/// - `lst`                      -> `lst run`
/// - `lst -k 3 ...`             -> `lst run -k 3 ...`
/// - `lst --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "run" | "rank" | "predict");
    if is_subcommand {
        return argv;
    }

    // A leading flag belongs to `run`.
    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
        return argv;
    }

    argv
}
