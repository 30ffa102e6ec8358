//! Applying a trained model to each day of the prediction range.

pub mod engine;

pub use engine::*;
