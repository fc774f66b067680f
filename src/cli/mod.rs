//! Command line interface module
//!
//! Argument parsing and the runner that resolves each requested image.

pub mod args;
pub mod runner;

pub use args::Args;
pub use runner::{LookupReport, Runner};
