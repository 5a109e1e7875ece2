//! Project configuration management for `routepack.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! ├── types/         # ConfigError, diagnostics, field paths
//! ├── util.rs        # Config file discovery
//! └── mod.rs         # PackConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section      | Purpose                                          |
//! |--------------|--------------------------------------------------|
//! | `[build]`    | Source/output/public paths, entries, template    |
//! | `[resolve]`  | Import extensions and aliases                    |
//! | `[output]`   | Public path, inline threshold, fingerprints      |
//! | `[split]`    | Chunk splitting policy                           |
//! | `[engines]`  | Engine commands, browser targets, caching        |
//! | `[rules]`    | Kinds removed from the composition table         |
//! | `[lint]`     | Advisory lint jobs                               |

pub mod section;
pub mod types;
mod util;

use util::find_config_file;

pub use section::{
    BuildConfig, EnginesConfig, LintConfig, OutputConfig, ResolveConfig, RulesConfig,
    SplitChunks, SplitConfig, TargetsConfig,
};
pub use types::{ConfigDiagnostics, ConfigError, FieldPath};

use crate::{cli::Cli, cli::Commands, log};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing routepack.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    /// Absolute path to the config file, empty when running on defaults
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    pub build: BuildConfig,
    pub resolve: ResolveConfig,
    pub output: OutputConfig,
    pub split: SplitConfig,
    pub engines: EnginesConfig,
    pub rules: RulesConfig,
    pub lint: LintConfig,
}

impl PackConfig {
    /// Load configuration from CLI arguments.
    ///
    /// Searches upward from cwd for the config file. Without one, the
    /// defaults apply with the current directory as project root.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let mut config = match find_config_file(&cli.config) {
            Some(path) => {
                let mut config = Self::from_path(&path)?;
                config.config_path = crate::utils::path::normalize_path(&path);
                config
            }
            None if cli.config != Path::new(DEFAULT_CONFIG) => {
                return Err(ConfigError::Io(
                    cli.config.clone(),
                    std::io::Error::from(std::io::ErrorKind::NotFound),
                )
                .into());
            }
            None => {
                crate::debug!("config"; "no {} found, using defaults", DEFAULT_CONFIG);
                Self::default()
            }
        };

        let root = config
            .config_path
            .parent()
            .map_or(cwd, Path::to_path_buf);
        config.finalize(&root);
        config.apply_command_options(cli);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    pub(crate) fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::Toml)?;
        Ok((config, ignored))
    }

    /// Parse a config and resolve its paths against `root`, without validation.
    pub fn from_str_at(content: &str, root: &Path) -> Result<Self> {
        let (mut config, _) = Self::parse_with_ignored(content)?;
        config.finalize(root);
        Ok(config)
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// Set root and normalize all section paths against it.
    fn finalize(&mut self, root: &Path) {
        let root = crate::utils::path::normalize_path(root);
        self.build.normalize(&root);
        self.resolve.normalize(&root);
        self.root = root;
    }

    /// Apply command-specific configuration options.
    fn apply_command_options(&mut self, cli: &Cli) {
        if let Commands::Build { args } = &cli.command
            && args.clean
        {
            self.build.clean = true;
        }
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        &self.root
    }

    /// Root-relative path with forward slashes, for logs and manifests.
    pub fn root_relative(&self, path: &Path) -> String {
        crate::utils::path::rel_slash(path, &self.root)
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate configuration.
    ///
    /// Collects all validation errors and returns them at once.
    pub fn validate(&self) -> Result<()> {
        let mut diag = ConfigDiagnostics::new();

        self.build.validate(&mut diag);
        self.resolve.validate(&mut diag);
        self.output.validate(&mut diag);
        self.split.validate(&mut diag);
        self.engines.validate(&mut diag);

        diag.print_warnings();

        diag.into_result()
            .map_err(|e| ConfigError::Diagnostics(e).into())
    }
}

/// Config file name used when `--config` is not given.
pub const DEFAULT_CONFIG: &str = "routepack.toml";

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config text. Panics if there are unknown fields (to catch typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> PackConfig {
    let (parsed, ignored) = PackConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_invalid_toml() {
        assert!(PackConfig::parse_with_ignored("[build\nsource = \"src\"").is_err());
    }

    #[test]
    fn test_unknown_fields_detected() {
        let content = "[build]\nsource = \"app\"\n[unknown_section]\nfield = \"value\"";
        let (config, ignored) = PackConfig::parse_with_ignored(content).unwrap();

        assert_eq!(config.build.source, PathBuf::from("app"));
        assert!(ignored.iter().any(|f| f.contains("unknown_section")));
    }

    #[test]
    fn test_from_str_at_resolves_paths() {
        let dir = TempDir::new().unwrap();
        let config = PackConfig::from_str_at("[build]\noutput = \"out\"", dir.path()).unwrap();
        let root = crate::utils::path::normalize_path(dir.path());

        assert_eq!(config.get_root(), root);
        assert_eq!(config.build.output, root.join("out"));
        assert_eq!(config.build.entries["main"], root.join("src/main.js"));
        assert_eq!(config.resolve.alias["@"], root.join("src"));
        assert_eq!(config.root_relative(&root.join("src/a.js")), "src/a.js");
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let dir = TempDir::new().unwrap();
        let config = PackConfig::from_str_at(
            "[output]\nasset_hash_len = 2\n[split]\nmin_chunks = 0",
            dir.path(),
        )
        .unwrap();

        let err = config.validate().unwrap_err();
        let Some(ConfigError::Diagnostics(diag)) = err.downcast_ref::<ConfigError>() else {
            panic!("expected diagnostics, got {err}");
        };
        // missing source dir, missing entry, hash length, min_chunks
        assert_eq!(diag.len(), 4);
    }
}
