//! Spatially representative point sampling.

pub mod stratified;

pub use stratified::*;
