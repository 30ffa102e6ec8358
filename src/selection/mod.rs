//! Feature ranking and predictor selection.

pub mod ranking;

pub use ranking::*;
