//! Target-aligned feature preparation
//!
//! # Pipeline
//!
//! 1. **Names**: a names file is parsed into a [`Schema`]: the target plus
//!    every column with its declared type and category vocabulary
//! 2. **Statistics**: one pass over a labeled data file accumulates raw
//!    moments and per-category target counts into [`Statistics`]
//! 3. **Transform**: the statistics pick one [`Rule`] per column; the
//!    resulting [`Transform`] rewrites rows and the names description so
//!    every modeled column is numeric and non-negatively correlated with
//!    the target
//!
//! There are no silent fallbacks. A short row, an undeclared category or a
//! constant feature is an error, never a default value.
//!
//! # Modules
//!
//! - [`line`]: comment/terminator grammar shared by names and data files
//! - [`names`]: names-file parser and writer
//! - [`stats`]: single-pass statistics accumulator
//! - [`transform`]: rule derivation and application
//! - [`error`]: error taxonomy

pub mod error;
pub mod line;
pub mod names;
pub mod stats;
pub mod transform;

pub use error::{FeatureError, Result};
pub use line::MISSING;
pub use names::{Feature, FeatureType, Schema, DEFAULT_TARGET_NAME};
pub use stats::{
    accumulate, accumulate_path, Accumulator, CategoricalSummary, CategoryStats, FeatureStats,
    Moments, NumericSummary, Statistics, Summary, TargetEncoding,
};
pub use transform::{format_value, FeatureRule, Rule, StagedOutput, Transform, TransformOptions};
