//! CLI module for tmc
//!
//! One submodule per subcommand plus shared configuration, error and
//! output helpers.

pub mod config;
pub mod error;
pub mod output;

pub mod names;
pub mod reweight;
pub mod stats;
pub mod transform;
