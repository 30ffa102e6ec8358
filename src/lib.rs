//! `lst-downscale` library crate.
//!
//! Daily land-surface temperature at fine resolution from a coarse reference
//! label and fine-scale predictors. The binary (`lst`) is a thin wrapper around
//! this library so that:
//!
//! - core logic is testable without spawning processes
//! - the pipeline stages are reusable with other image sources
//! - code stays easy to navigate as the project grows
//!
//! Stages, in pipeline order: `features` -> `sampling` -> `selection` ->
//! `model` -> `inference` -> `series`.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod features;
pub mod inference;
pub mod io;
pub mod math;
pub mod model;
pub mod plot;
pub mod raster;
pub mod report;
pub mod sampling;
pub mod selection;
pub mod series;
