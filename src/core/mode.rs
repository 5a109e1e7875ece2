//! Build mode for production/development builds.
//!
//! The mode is resolved once at startup and then passed explicitly into
//! every policy lookup. Nothing below the CLI layer reads it from globals.

use std::fmt;
use std::sync::OnceLock;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Environment variable consulted when no `--mode` flag is given.
pub const MODE_ENV: &str = "NODE_ENV";

/// Build mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Styles injected into the document, literal file names, no minifiers.
    Development,
    /// Styles extracted, fingerprinted file names, minified output.
    Production,
}

impl BuildMode {
    /// Map an environment value to a mode. Only `production` selects production.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("production") => Self::Production,
            _ => Self::Development,
        }
    }

    /// Check if this is production mode.
    #[inline]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

static MODE: OnceLock<BuildMode> = OnceLock::new();

/// Resolve the process-wide mode.
///
/// The first call wins: an explicit override beats `NODE_ENV`, and later
/// calls return the already resolved value.
pub fn resolve_mode(explicit: Option<BuildMode>) -> BuildMode {
    *MODE.get_or_init(|| {
        explicit.unwrap_or_else(|| {
            BuildMode::from_env_value(std::env::var(MODE_ENV).ok().as_deref())
        })
    })
}
