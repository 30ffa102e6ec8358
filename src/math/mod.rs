//! Mathematical utilities: descriptive statistics, least squares and seed
//! derivation.

pub mod ols;
pub mod seed;
pub mod stats;

pub use ols::*;
pub use stats::*;
