//! Command-line parsing for the LST downscaling pipeline.
//!
//! Argument parsing and command dispatch stay separate from the pipeline code.
//! Every flag can also be set through an `LST_*` environment variable (a `.env`
//! file in the working directory is loaded at startup).

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "lst", version, about = "Daily land-surface temperature downscaling")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Train on the training window and predict every day of the prediction range.
    Run(RunArgs),
    /// Sample the training window and print the feature ranking only.
    Rank(RunArgs),
    /// Predict the prediction range with a previously saved model.
    Predict(PredictArgs),
}

/// Synthetic region used as image source, terrain and label provider.
#[derive(Debug, Args, Clone)]
pub struct WorldArgs {
    /// Region width (pixels).
    #[arg(long = "region-width", env = "LST_REGION_WIDTH", default_value_t = 64)]
    pub region_width: usize,

    /// Region height (pixels).
    #[arg(long = "region-height", env = "LST_REGION_HEIGHT", default_value_t = 48)]
    pub region_height: usize,

    /// Pixel size (metres).
    #[arg(long, env = "LST_SCALE", default_value_t = 30.0)]
    pub scale: f64,

    /// Coordinate reference system label of the region grid.
    #[arg(long, env = "LST_CRS", default_value = "EPSG:32633")]
    pub crs: String,

    /// Seed of the synthetic world (terrain, scenes, gaps).
    #[arg(long = "world-seed", env = "LST_WORLD_SEED", default_value_t = 7)]
    pub world_seed: u64,

    /// Acquisitions per day.
    #[arg(long = "scenes-per-day", env = "LST_SCENES_PER_DAY", default_value_t = 2)]
    pub scenes_per_day: usize,

    /// Probability that a day has no acquisition at all.
    #[arg(long = "gap-prob", env = "LST_GAP_PROB", default_value_t = 0.1)]
    pub gap_probability: f64,

    /// Force a day without acquisitions (repeatable).
    #[arg(long = "missing-day", value_name = "DATE")]
    pub missing_days: Vec<NaiveDate>,

    /// Upper bound of scene cloud cover (percent) in the synthetic archive.
    #[arg(long = "max-scene-cloud", env = "LST_MAX_SCENE_CLOUD", default_value_t = 60.0)]
    pub max_scene_cloud: f64,

    /// Coarse label block size (pixels per side).
    #[arg(long = "label-factor", env = "LST_LABEL_FACTOR", default_value_t = 4)]
    pub label_factor: usize,
}

/// Terminal and file outputs.
#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long = "plot-width", default_value_t = 80)]
    pub plot_width: usize,

    /// Plot height (rows).
    #[arg(long = "plot-height", default_value_t = 20)]
    pub plot_height: usize,

    /// Export the per-day QA series to CSV.
    #[arg(long, env = "LST_EXPORT")]
    pub export: Option<PathBuf>,
}

/// Options for training and prediction.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub world: WorldArgs,

    /// First day of the training window.
    #[arg(long = "train-start", env = "LST_TRAIN_START", default_value = "2023-07-01")]
    pub train_start: NaiveDate,

    /// Last day of the training window (inclusive).
    #[arg(long = "train-end", env = "LST_TRAIN_END", default_value = "2023-07-10")]
    pub train_end: NaiveDate,

    /// First day to predict.
    #[arg(long = "start", env = "LST_START", default_value = "2023-07-11")]
    pub start: NaiveDate,

    /// Last day to predict (inclusive).
    #[arg(long = "end", env = "LST_END", default_value = "2023-07-20")]
    pub end: NaiveDate,

    /// Candidate predictors (comma separated). Defaults to every stack band.
    #[arg(long, env = "LST_CANDIDATES", value_delimiter = ',')]
    pub candidates: Option<Vec<String>>,

    /// Final predictor count K.
    #[arg(short = 'k', long = "top-k", env = "LST_TOP_K", default_value_t = 4)]
    pub top_k: usize,

    /// Total stratified sample size.
    #[arg(short = 'n', long = "samples", env = "LST_SAMPLES", default_value_t = 500)]
    pub sample_count: usize,

    /// Band used to stratify the region.
    #[arg(long = "strata-band", env = "LST_STRATA_BAND", default_value = "elevation")]
    pub strata_band: String,

    /// Number of equal-width strata.
    #[arg(long = "strata-bins", env = "LST_STRATA_BINS", default_value_t = 5)]
    pub strata_bins: usize,

    /// Fraction of samples assigned to training.
    #[arg(long = "split", env = "LST_SPLIT", default_value_t = 0.7)]
    pub split_ratio: f64,

    /// Number of trees in the ensemble.
    #[arg(long, env = "LST_TREES", default_value_t = 50)]
    pub trees: usize,

    /// Maximum tree depth.
    #[arg(long = "max-depth", env = "LST_MAX_DEPTH", default_value_t = 12)]
    pub max_depth: usize,

    /// Minimum samples per leaf.
    #[arg(long = "min-leaf", env = "LST_MIN_LEAF", default_value_t = 2)]
    pub min_leaf: usize,

    /// Features tried per split (default: ceil(sqrt(K))).
    #[arg(long, env = "LST_MTRY")]
    pub mtry: Option<usize>,

    /// Random seed for sampling, splitting and tree fitting.
    #[arg(long, env = "LST_SEED", default_value_t = 42)]
    pub seed: u64,

    /// Skip scenes with more cloud cover (percent).
    #[arg(long = "max-cloud", env = "LST_MAX_CLOUD", default_value_t = 50.0)]
    pub max_cloud_cover: f64,

    /// Drop shortlisted features whose |r| with a kept feature exceeds this.
    #[arg(long, env = "LST_REDUNDANCY")]
    pub redundancy: Option<f64>,

    /// Name of the predicted band.
    #[arg(long, env = "LST_BAND", default_value = crate::domain::DEFAULT_OUTPUT_BAND)]
    pub band: String,

    /// Save the trained model as JSON.
    #[arg(long = "export-model", env = "LST_EXPORT_MODEL")]
    pub export_model: Option<PathBuf>,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Options for predicting with a saved model.
#[derive(Debug, Args, Clone)]
pub struct PredictArgs {
    /// Model JSON produced by `lst run --export-model`.
    #[arg(long, value_name = "JSON")]
    pub model: PathBuf,

    #[command(flatten)]
    pub world: WorldArgs,

    /// First day to predict.
    #[arg(long = "start", env = "LST_START", default_value = "2023-07-11")]
    pub start: NaiveDate,

    /// Last day to predict (inclusive).
    #[arg(long = "end", env = "LST_END", default_value = "2023-07-20")]
    pub end: NaiveDate,

    /// Skip scenes with more cloud cover (percent).
    #[arg(long = "max-cloud", env = "LST_MAX_CLOUD", default_value_t = 50.0)]
    pub max_cloud_cover: f64,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "lst",
            "run",
            "-k",
            "3",
            "--candidates",
            "ndvi,elevation,tpi",
            "--missing-day",
            "2023-07-13",
            "--no-plot",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.top_k, 3);
        assert_eq!(
            args.candidates,
            Some(vec!["ndvi".to_string(), "elevation".to_string(), "tpi".to_string()])
        );
        assert_eq!(args.world.missing_days, vec![NaiveDate::from_ymd_opt(2023, 7, 13).unwrap()]);
        assert!(args.output.no_plot);
        assert_eq!(args.band, "LST");
    }

    #[test]
    fn predict_requires_model_path() {
        assert!(Cli::try_parse_from(["lst", "predict"]).is_err());
        let cli = Cli::try_parse_from(["lst", "predict", "--model", "m.json"]).unwrap();
        assert!(matches!(cli.command, Command::Predict(_)));
    }
}
