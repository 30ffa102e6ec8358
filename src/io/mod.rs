//! Input/output helpers.
//!
//! - series QA export (`export`)
//! - model JSON read/write (`model`)

pub mod export;
pub mod model;

pub use export::*;
pub use model::*;
