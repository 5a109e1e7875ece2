//! `[engines]` section configuration.
//!
//! Settings for the transformation engines behind each stage.
//!
//! # Example
//!
//! ```toml
//! [engines]
//! less = ["lessc", "-"]       # Reads stdin, writes CSS to stdout
//! sass = ["sass", "--stdin"]
//! stylus = ["stylus"]
//! drop_console = false        # Strip console.* calls in production
//! cache = true                # Cache script-compat results on disk
//!
//! [engines.targets]           # Browser targets for style-normalize
//! chrome = 87
//! firefox = 78
//! safari = 14
//! edge = 88
//! ```

use crate::config::{ConfigDiagnostics, FieldPath};
use serde::{Deserialize, Serialize};

/// Package runners that fetch tools on demand.
const PACKAGE_RUNNERS: &[&str] = &["npx", "bunx", "pnpx", "yarn", "dlx"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnginesConfig {
    pub less: Vec<String>,
    pub sass: Vec<String>,
    pub stylus: Vec<String>,

    /// Remove `console.*` calls during runtime trimming.
    pub drop_console: bool,

    /// Persist script-compat results between builds.
    pub cache: bool,

    pub targets: TargetsConfig,
}

impl Default for EnginesConfig {
    fn default() -> Self {
        Self {
            less: vec!["lessc".into(), "-".into()],
            sass: vec!["sass".into(), "--stdin".into()],
            stylus: vec!["stylus".into()],
            drop_console: false,
            cache: true,
            targets: TargetsConfig::default(),
        }
    }
}

/// Minimum browser major versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetsConfig {
    pub chrome: Option<u32>,
    pub firefox: Option<u32>,
    pub safari: Option<u32>,
    pub edge: Option<u32>,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            chrome: Some(87),
            firefox: Some(78),
            safari: Some(14),
            edge: Some(88),
        }
    }
}

impl EnginesConfig {
    pub const LESS: FieldPath = FieldPath::new("engines.less");
    pub const SASS: FieldPath = FieldPath::new("engines.sass");
    pub const STYLUS: FieldPath = FieldPath::new("engines.stylus");

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        for (field, command) in [
            (Self::LESS, &self.less),
            (Self::SASS, &self.sass),
            (Self::STYLUS, &self.stylus),
        ] {
            if command.first().is_none_or(|c| c.trim().is_empty()) {
                diag.error(field, "command is empty");
            }
        }
    }

    /// Check that an engine command can be launched.
    ///
    /// Package runners only need to exist themselves.
    pub fn check_command(command: &[String]) -> Result<(), String> {
        let Some(program) = command.first() else {
            return Err("command is empty".into());
        };
        if which::which(program).is_ok() {
            return Ok(());
        }
        if PACKAGE_RUNNERS.contains(&program.as_str()) {
            return Err(format!("package runner `{program}` not found"));
        }
        Err(format!("`{program}` not found in PATH"))
    }
}
