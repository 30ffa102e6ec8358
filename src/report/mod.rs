//! Reporting utilities: formatted terminal output for runs and rankings.

pub mod format;

pub use format::*;
