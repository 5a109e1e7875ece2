//! Command-line interface.

mod args;
pub mod build;
pub mod plan;

pub use args::{Cli, Commands};
