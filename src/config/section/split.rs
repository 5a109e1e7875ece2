//! `[split]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [split]
//! chunks = "all"          # all | initial | async
//! min_chunks = 2          # Share count that triggers a split chunk
//! vendors = true          # Group node_modules into vendors~ chunks
//! runtime_chunk = true    # Emit runtime~<entry> per entry point
//! ```

use crate::config::{ConfigDiagnostics, FieldPath};
use serde::{Deserialize, Serialize};

/// Which load units take part in splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitChunks {
    #[default]
    All,
    Initial,
    Async,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub chunks: SplitChunks,
    pub min_chunks: usize,
    pub vendors: bool,
    pub runtime_chunk: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            chunks: SplitChunks::All,
            min_chunks: 2,
            vendors: true,
            runtime_chunk: true,
        }
    }
}

impl SplitConfig {
    pub const MIN_CHUNKS: FieldPath = FieldPath::new("split.min_chunks");

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        match self.min_chunks {
            0 => diag.error(Self::MIN_CHUNKS, "must be at least 1"),
            1 => diag.warn(
                Self::MIN_CHUNKS,
                "every module will be moved into its own split chunk",
            ),
            _ => {}
        }
    }
}
