//! Transformation engines.
//!
//! Each stage name maps to one [`Transformer`]. The routing layer only
//! names stages; engines do the work.
//!
//! | Module     | Stages                                                  |
//! |------------|---------------------------------------------------------|
//! | `style`    | css-compile, style-normalize, style-inject/extract, minify-style |
//! | `script`   | script-compat, runtime-trim, minify-script              |
//! | `external` | less-compile, sass-compile, stylus-compile              |
//! | `lint`     | Advisory script checks                                  |

pub mod external;
pub mod lint;
pub mod script;
pub mod style;

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::config::ConfigError;
use crate::pipeline::{StageName, StageOptions, TransformStage};

pub use lint::LintFinding;

/// A stage failed for one asset.
#[derive(Debug, Clone, Error)]
#[error("{stage} failed for `{}`: {message}", .path.display())]
pub struct TransformError {
    pub path: PathBuf,
    pub stage: StageName,
    pub message: String,
}

/// Per-asset information available to engines.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    /// Absolute source path.
    pub path: &'a Path,
    /// Root-relative path for messages.
    pub rel: &'a str,
}

/// A transformation engine.
pub trait Transformer: Send + Sync {
    fn transform(
        &self,
        source: &[u8],
        options: &StageOptions,
        ctx: &StageContext<'_>,
    ) -> Result<Vec<u8>, String>;

    /// Check the engine can run with these options (e.g. its executable exists).
    fn check(&self, _options: &StageOptions) -> Result<(), String> {
        Ok(())
    }
}

/// Engines by stage.
#[derive(Default)]
pub struct EngineRegistry {
    engines: FxHashMap<StageName, Box<dyn Transformer>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in engine.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(StageName::CssCompile, style::CssCompile);
        registry.register(StageName::StyleNormalize, style::StyleNormalize);
        registry.register(StageName::StyleInject, style::StyleInject);
        registry.register(StageName::StyleExtract, style::StyleExtract);
        registry.register(StageName::MinifyStyle, style::MinifyStyle);
        registry.register(StageName::ScriptCompat, script::ScriptCompat);
        registry.register(StageName::RuntimeTrim, script::RuntimeTrim);
        registry.register(StageName::MinifyScript, script::MinifyScript);
        registry.register(StageName::LessCompile, external::ExternalCompiler);
        registry.register(StageName::SassCompile, external::ExternalCompiler);
        registry.register(StageName::StylusCompile, external::ExternalCompiler);
        registry
    }

    pub fn register(&mut self, stage: StageName, engine: impl Transformer + 'static) {
        self.engines.insert(stage, Box::new(engine));
    }

    pub fn get(&self, stage: StageName) -> Option<&dyn Transformer> {
        self.engines.get(&stage).map(Box::as_ref)
    }

    /// Confirm every required stage has a runnable engine.
    ///
    /// Lint has no engine entry; its checks are built in.
    pub fn validate<'a>(
        &self,
        required: impl IntoIterator<Item = &'a TransformStage>,
    ) -> Result<(), ConfigError> {
        for stage in required {
            if stage.name == StageName::Lint {
                continue;
            }
            let engine = self.get(stage.name).ok_or(ConfigError::MissingCollaborator {
                stage: stage.name.as_str(),
                reason: "no engine registered".into(),
            })?;
            engine
                .check(&stage.options)
                .map_err(|reason| ConfigError::MissingCollaborator {
                    stage: stage.name.as_str(),
                    reason,
                })?;
        }
        Ok(())
    }

    /// Run one stage on `source`.
    pub fn run(
        &self,
        stage: &TransformStage,
        source: &[u8],
        ctx: &StageContext<'_>,
    ) -> Result<Vec<u8>, TransformError> {
        let fail = |message: String| TransformError {
            path: ctx.path.to_path_buf(),
            stage: stage.name,
            message,
        };
        let engine = self
            .get(stage.name)
            .ok_or_else(|| fail("no engine registered".into()))?;
        engine.transform(source, &stage.options, ctx).map_err(fail)
    }
}

/// Decode UTF-8 source for text engines.
pub(crate) fn as_text(source: &[u8]) -> Result<&str, String> {
    std::str::from_utf8(source).map_err(|e| format!("source is not valid UTF-8: {e}"))
}
