//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - geometry and calendar types (`GridSpec`, `Bounds`, `DateRange`, `DateWindow`)
//! - run configuration (`PipelineConfig`, `StratumRule`, `ForestParams`)
//! - sampling and ranking outputs (`SampleSet`, `FeatureRanking`)
//! - per-day prediction outcomes (`TimeStep`)

pub mod types;

pub use types::*;
