//! Assembly of per-day outcomes into a date-ordered series.

pub mod assembler;

pub use assembler::*;
