//! `[output]` section configuration.
//!
//! Naming policy values used by the output namer.
//!
//! # Example
//!
//! ```toml
//! [output]
//! public_path = "/"       # URL prefix for emitted files
//! inline_limit = 10240    # Images smaller than this (bytes) become data URLs
//! script_hash_len = 10    # Fingerprint length for scripts and styles
//! asset_hash_len = 8      # Fingerprint length for images and fonts
//! media_hash_len = 10     # Fingerprint length for other files
//! ```

use crate::config::{ConfigDiagnostics, FieldPath};
use serde::{Deserialize, Serialize};

/// Shortest fingerprint accepted for production file names.
pub const MIN_HASH_LEN: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// URL prefix prepended to emitted file paths.
    pub public_path: String,

    /// Inline threshold for raster images, in bytes (exclusive).
    pub inline_limit: u64,

    pub script_hash_len: usize,
    pub asset_hash_len: usize,
    pub media_hash_len: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            public_path: "/".into(),
            inline_limit: 10240,
            script_hash_len: 10,
            asset_hash_len: 8,
            media_hash_len: 10,
        }
    }
}

impl OutputConfig {
    pub const PUBLIC_PATH: FieldPath = FieldPath::new("output.public_path");
    pub const SCRIPT_HASH_LEN: FieldPath = FieldPath::new("output.script_hash_len");
    pub const ASSET_HASH_LEN: FieldPath = FieldPath::new("output.asset_hash_len");
    pub const MEDIA_HASH_LEN: FieldPath = FieldPath::new("output.media_hash_len");

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if !self.public_path.ends_with('/') {
            diag.error_with_hint(
                Self::PUBLIC_PATH,
                format!("`{}` must end with `/`", self.public_path),
                "use \"/\" or a prefix such as \"/app/\"",
            );
        }

        for (field, len) in [
            (Self::SCRIPT_HASH_LEN, self.script_hash_len),
            (Self::ASSET_HASH_LEN, self.asset_hash_len),
            (Self::MEDIA_HASH_LEN, self.media_hash_len),
        ] {
            if !(MIN_HASH_LEN..=64).contains(&len) {
                diag.error(
                    field,
                    format!("fingerprint length {len} is outside {MIN_HASH_LEN}..=64"),
                );
            }
        }
    }
}
