//! Command-line interface definitions.

use crate::core::BuildMode;
use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// routepack asset bundler CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path, searched upward from the current directory
    #[arg(short = 'C', long, global = true, default_value = "routepack.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Bundle the source tree into the output directory
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        args: BuildArgs,
    },

    /// Print the routing table and chunk plan without writing anything
    #[command(visible_alias = "p")]
    Plan {
        /// Build mode (overrides NODE_ENV)
        #[arg(short, long, value_enum)]
        mode: Option<BuildMode>,

        /// Print the plan as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Build command arguments.
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    /// Build mode (overrides NODE_ENV)
    #[arg(short, long, value_enum)]
    pub mode: Option<BuildMode>,

    /// Remove stale files from the output directory
    #[arg(short, long)]
    pub clean: bool,
}

impl Cli {
    /// Mode requested on the command line, if any.
    pub const fn mode(&self) -> Option<BuildMode> {
        match &self.command {
            Commands::Build { args } => args.mode,
            Commands::Plan { mode, .. } => *mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build() {
        let cli = Cli::try_parse_from(["routepack", "build", "--mode", "production", "--clean"])
            .unwrap();
        assert_eq!(cli.mode(), Some(BuildMode::Production));
        assert!(matches!(cli.command, Commands::Build { args } if args.clean));
        assert_eq!(cli.config, PathBuf::from("routepack.toml"));
    }

    #[test]
    fn test_parse_plan_with_globals() {
        let cli = Cli::try_parse_from(["routepack", "-v", "plan", "--json", "-C", "alt.toml"])
            .unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Plan { json: true, .. }));
        assert_eq!(cli.mode(), None);
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
    }

    #[test]
    fn test_command_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_version_and_verbose_flags() {
        let err = Cli::try_parse_from(["routepack", "-V"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);

        let cli = Cli::try_parse_from(["routepack", "build", "--verbose"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["routepack", "build", "--mode", "staging"]).is_err());
    }
}
