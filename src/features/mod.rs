//! Predictor feature engineering.

pub mod stack;

pub use stack::*;
