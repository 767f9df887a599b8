//! Analysis modules.
//!
//! Aggregation of the raw catalog sources and filtering of suggestions.

pub mod aggregator;

pub use aggregator::*;
