//! `[resolve]` section configuration.
//!
//! Controls how import specifiers found in scripts map to files.
//!
//! # Example
//!
//! ```toml
//! [resolve]
//! extensions = [".js", ".json"]   # Tried in order for extensionless imports
//! alias = { "@" = "src" }         # `@/util` -> `src/util`
//! ```

use crate::config::{ConfigDiagnostics, FieldPath};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Extensions appended to extensionless specifiers.
    pub extensions: Vec<String>,

    /// Specifier prefix aliases.
    pub alias: BTreeMap<String, PathBuf>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            extensions: vec![".js".into(), ".json".into()],
            alias: BTreeMap::from([("@".to_string(), PathBuf::from("src"))]),
        }
    }
}

impl ResolveConfig {
    pub const EXTENSIONS: FieldPath = FieldPath::new("resolve.extensions");
    pub const ALIAS: FieldPath = FieldPath::new("resolve.alias");

    pub fn normalize(&mut self, root: &Path) {
        for target in self.alias.values_mut() {
            *target = crate::utils::path::normalize_path(&root.join(&*target));
        }
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        for ext in &self.extensions {
            if !ext.starts_with('.') || ext.len() < 2 {
                diag.error_with_hint(
                    Self::EXTENSIONS,
                    format!("invalid extension `{ext}`"),
                    "extensions start with a dot, e.g. \".js\"",
                );
            }
        }
        for key in self.alias.keys() {
            if key.is_empty() || key.starts_with('.') {
                diag.error(Self::ALIAS, format!("alias `{key}` would shadow relative imports"));
            }
        }
    }
}
