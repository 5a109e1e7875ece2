//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! source = "src"                  # Source root scanned for assets
//! output = "dist"                 # Deployable output root
//! public = "public"               # Copied verbatim in production builds
//! template = "public/index.html"  # HTML template for script/style injection
//! cache = ".routepack/cache"      # Transform cache directory
//! clean = true                    # Replace the output root on publish
//!
//! [build.entries]
//! main = "src/main.js"
//! admin = "src/admin.js"
//! ```

use crate::config::{ConfigDiagnostics, FieldPath};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Source root, scanned recursively.
    pub source: PathBuf,

    /// Build output directory.
    pub output: PathBuf,

    /// Static files copied into the output root in production.
    pub public: PathBuf,

    /// HTML template. A built-in page is used when the file is missing.
    pub template: PathBuf,

    /// Transform cache directory.
    pub cache: PathBuf,

    /// Remove stale files from the output root on publish.
    pub clean: bool,

    /// Entry points by name.
    pub entries: BTreeMap<String, PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source: "src".into(),
            output: "dist".into(),
            public: "public".into(),
            template: "public/index.html".into(),
            cache: ".routepack/cache".into(),
            clean: true,
            entries: BTreeMap::from([("main".to_string(), PathBuf::from("src/main.js"))]),
        }
    }
}

impl BuildConfig {
    pub const SOURCE: FieldPath = FieldPath::new("build.source");
    pub const OUTPUT: FieldPath = FieldPath::new("build.output");
    pub const ENTRIES: FieldPath = FieldPath::new("build.entries");

    /// Resolve every path against the project root.
    pub fn normalize(&mut self, root: &Path) {
        use crate::utils::path::normalize_path;

        self.source = normalize_path(&root.join(&self.source));
        self.output = normalize_path(&root.join(&self.output));
        self.public = normalize_path(&root.join(&self.public));
        self.template = normalize_path(&root.join(&self.template));
        self.cache = normalize_path(&root.join(&self.cache));
        for entry in self.entries.values_mut() {
            *entry = normalize_path(&root.join(&*entry));
        }
    }

    /// Validate build configuration. Expects normalized paths.
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if !self.source.is_dir() {
            diag.error(
                Self::SOURCE,
                format!("source directory `{}` not found", self.source.display()),
            );
        }

        if self.entries.is_empty() {
            diag.error_with_hint(
                Self::ENTRIES,
                "no entry points configured",
                "add `main = \"src/main.js\"` under [build.entries]",
            );
        }

        for (name, path) in &self.entries {
            if name.is_empty() || name.contains(['/', '\\', '~']) {
                diag.error(Self::ENTRIES, format!("invalid entry name `{name}`"));
            }
            if !path.is_file() {
                diag.error(
                    Self::ENTRIES,
                    format!("entry `{name}` points to missing file `{}`", path.display()),
                );
            } else if !path.starts_with(&self.source) {
                diag.error(
                    Self::ENTRIES,
                    format!("entry `{name}` is outside the source directory"),
                );
            }
        }

        if self.source.starts_with(&self.output) {
            diag.error(Self::OUTPUT, "output directory must not contain the source directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.build.source, PathBuf::from("src"));
        assert_eq!(config.build.output, PathBuf::from("dist"));
        assert_eq!(config.build.template, PathBuf::from("public/index.html"));
        assert!(config.build.clean);
        assert_eq!(
            config.build.entries.get("main"),
            Some(&PathBuf::from("src/main.js"))
        );
    }

    #[test]
    fn test_custom_entries() {
        let config = test_parse_config(
            "[build.entries]\nmain = \"src/index.js\"\nadmin = \"src/admin.js\"",
        );
        assert_eq!(config.build.entries.len(), 2);
        assert_eq!(
            config.build.entries.keys().collect::<Vec<_>>(),
            vec!["admin", "main"]
        );
    }

    #[test]
    fn test_validate_missing_entry() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();

        let mut build = BuildConfig::default();
        build.normalize(dir.path());
        let mut diag = ConfigDiagnostics::new();
        build.validate(&mut diag);
        assert_eq!(diag.len(), 1);
        assert!(diag.errors()[0].message.contains("entry `main`"));

        fs::write(dir.path().join("src/main.js"), "").unwrap();
        let mut diag = ConfigDiagnostics::new();
        build.validate(&mut diag);
        assert!(diag.is_empty());
    }

    #[test]
    fn test_validate_bad_entry_name() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.js"), "").unwrap();

        let mut build = BuildConfig::default();
        build.entries = BTreeMap::from([("a~b".to_string(), PathBuf::from("src/main.js"))]);
        build.normalize(dir.path());
        let mut diag = ConfigDiagnostics::new();
        build.validate(&mut diag);
        assert!(diag.has_errors());
    }
}
