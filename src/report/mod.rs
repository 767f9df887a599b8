//! Report generation.
//!
//! Markdown and JSON rendering of a finished pipeline run.

pub mod generator;

pub use generator::*;
