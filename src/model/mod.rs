//! Regression model: a bagged CART ensemble mapping fine-scale features to LST.
//!
//! - `tree`: a single regression tree
//! - `forest`: bootstrap-aggregated trees
//! - `regression`: the model bound to its feature list (what inference sees)
//! - `trainer`: split, fit and hold-out evaluation

pub mod forest;
pub mod regression;
pub mod trainer;
pub mod tree;

pub use forest::RandomForest;
pub use regression::RegressionModel;
pub use trainer::*;
