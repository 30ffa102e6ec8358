//! Imagery, cloud-mask and terrain collaborators.
//!
//! - `source`: the collaborator traits and raw image types
//! - `synthetic`: a seeded synthetic region implementing them

pub mod source;
pub mod synthetic;

#[cfg(test)]
pub(crate) mod fixtures;

pub use source::*;
pub use synthetic::*;
