//! routepack - A route-driven asset bundler for browser applications.

mod build;
mod cache;
mod cli;
mod config;
mod core;
mod engine;
mod logger;
mod pipeline;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::PackConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = PackConfig::load(&cli)?;
    let mode = core::resolve_mode(cli.mode());

    match &cli.command {
        Commands::Build { .. } => cli::build::run_build(&config, mode),
        Commands::Plan { json, .. } => cli::plan::run_plan(&config, mode, *json),
    }
}
