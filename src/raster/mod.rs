//! Raster fields and compositing.

pub mod composite;
pub mod field;

pub use composite::*;
pub use field::*;
