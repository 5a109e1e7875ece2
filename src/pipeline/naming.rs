//! Output naming.
//!
//! Computes destination paths from filename templates. Supported
//! placeholders:
//!
//! | Placeholder        | Value                                        |
//! |--------------------|----------------------------------------------|
//! | `[name]`           | Chunk or file stem                           |
//! | `[ext]`            | Extension including the dot (`.png`)         |
//! | `[query]`          | Always empty                                 |
//! | `[contenthash:N]`  | First N hex chars of the content hash        |
//! | `[hash:N]`         | Same as `contenthash`                        |

use std::sync::LazyLock;

use base64::Engine as _;
use regex::{Captures, Regex};
use serde::Serialize;

use crate::config::OutputConfig;
use crate::core::{AssetKind, BuildMode};
use crate::utils::hash::ContentHash;
use crate::utils::mime;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(name|ext|query|contenthash|hash)(?::([0-9]+))?\]").expect("valid regex")
});

/// Hash length when a placeholder has no explicit `:N`. Twenty hex digits
/// is the digest length other bundlers give a bare `[hash]`, so templates
/// carried over from them keep their file names.
const DEFAULT_HASH_LEN: usize = 20;

/// Whether a chunk loads with its entry or on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkRole {
    Initial,
    Async,
}

/// Target filename template plus an optional inline threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRule {
    /// Path template relative to the output root.
    pub template: String,
    /// Assets strictly smaller than this many bytes become data URLs.
    pub inline_limit: Option<u64>,
}

/// What happens to an emitted asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emission {
    Inline { data_url: String },
    File { path: String },
}

impl OutputRule {
    fn file(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            inline_limit: None,
        }
    }

    /// True if the template contains a content fingerprint.
    pub fn is_fingerprinted(&self) -> bool {
        PLACEHOLDER
            .captures_iter(&self.template)
            .any(|c| matches!(&c[1], "contenthash" | "hash"))
    }

    /// Resolve the template. `ext` is given without the leading dot.
    pub fn render(&self, name: &str, ext: &str, bytes: &[u8]) -> String {
        let mut hash: Option<ContentHash> = None;
        PLACEHOLDER
            .replace_all(&self.template, |caps: &Captures<'_>| match &caps[1] {
                "name" => name.to_string(),
                "ext" if ext.is_empty() => String::new(),
                "ext" => format!(".{ext}"),
                "query" => String::new(),
                _ => {
                    let len = caps
                        .get(2)
                        .and_then(|m| m.as_str().parse().ok())
                        .unwrap_or(DEFAULT_HASH_LEN);
                    hash.get_or_insert_with(|| ContentHash::of(bytes)).short(len)
                }
            })
            .into_owned()
    }

    /// Inline or name the asset.
    pub fn emit(&self, name: &str, ext: &str, bytes: &[u8]) -> Emission {
        match self.inline_limit {
            Some(limit) if (bytes.len() as u64) < limit => Emission::Inline {
                data_url: data_url(mime::from_extension(Some(ext)), bytes),
            },
            _ => Emission::File {
                path: self.render(name, ext, bytes),
            },
        }
    }
}

/// Base64 data URL for inlined assets.
pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime};base64,{encoded}")
}

/// Naming policy for every asset kind and chunk.
#[derive(Debug, Clone, Default)]
pub struct OutputNamer {
    policy: OutputConfig,
}

impl OutputNamer {
    pub fn new(policy: &OutputConfig) -> Self {
        Self {
            policy: policy.clone(),
        }
    }

    /// Rule for an asset routed straight to output (or the entry script).
    pub fn rule_for(&self, kind: AssetKind, mode: BuildMode) -> OutputRule {
        let p = &self.policy;
        match kind {
            AssetKind::Script => self.chunk_rule(ChunkRole::Initial, mode),
            k if k.is_style() => self.stylesheet_rule(ChunkRole::Initial, mode),
            AssetKind::RasterImage => OutputRule {
                template: format!("static/imgs/[hash:{}][ext]", p.asset_hash_len),
                inline_limit: Some(p.inline_limit),
            },
            AssetKind::FontBinary => {
                OutputRule::file(format!("static/media/[hash:{}][ext]", p.asset_hash_len))
            }
            AssetKind::HtmlTemplate => OutputRule::file("index.html"),
            _ => OutputRule::file(format!("static/media/[hash:{}][ext]", p.media_hash_len)),
        }
    }

    /// Script filename rule for a chunk.
    pub fn chunk_rule(&self, role: ChunkRole, mode: BuildMode) -> OutputRule {
        let suffix = match role {
            ChunkRole::Initial => "js",
            ChunkRole::Async => "chunk.js",
        };
        OutputRule::file(self.fingerprinted("static/js", suffix, mode))
    }

    /// Extracted stylesheet filename rule for a chunk.
    pub fn stylesheet_rule(&self, role: ChunkRole, mode: BuildMode) -> OutputRule {
        let suffix = match role {
            ChunkRole::Initial => "css",
            ChunkRole::Async => "chunk.css",
        };
        OutputRule::file(self.fingerprinted("static/css", suffix, mode))
    }

    fn fingerprinted(&self, dir: &str, suffix: &str, mode: BuildMode) -> String {
        if mode.is_production() {
            format!("{dir}/[name].[contenthash:{}].{suffix}", self.policy.script_hash_len)
        } else {
            format!("{dir}/[name].{suffix}")
        }
    }

    /// Public URL for an output-relative path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.policy.public_path, path.trim_start_matches('/'))
    }
}
