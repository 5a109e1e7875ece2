//! Transformation stage descriptors.
//!
//! A stage is data: a name, typed options, and how it executes. Engines
//! registered per [`StageName`] do the actual work.

use std::fmt;

use serde::Serialize;

use crate::config::TargetsConfig;
use crate::pipeline::parallel::{Execution, execution_for};

/// Every stage the composer can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageName {
    StyleInject,
    StyleExtract,
    StyleNormalize,
    CssCompile,
    LessCompile,
    SassCompile,
    StylusCompile,
    ScriptCompat,
    RuntimeTrim,
    MinifyScript,
    MinifyStyle,
    Lint,
}

impl StageName {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StyleInject => "style-inject",
            Self::StyleExtract => "style-extract",
            Self::StyleNormalize => "style-normalize",
            Self::CssCompile => "css-compile",
            Self::LessCompile => "less-compile",
            Self::SassCompile => "sass-compile",
            Self::StylusCompile => "stylus-compile",
            Self::ScriptCompat => "script-compat",
            Self::RuntimeTrim => "runtime-trim",
            Self::MinifyScript => "minify-script",
            Self::MinifyStyle => "minify-style",
            Self::Lint => "lint",
        }
    }

    /// Stages whose output is the first plain CSS of a stylesheet chain.
    pub const fn is_style_compiler(self) -> bool {
        matches!(
            self,
            Self::CssCompile | Self::LessCompile | Self::SassCompile | Self::StylusCompile
        )
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed options, one variant per stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "kebab-case")]
pub enum StageOptions {
    StyleInject,
    StyleExtract,
    StyleNormalize { targets: TargetsConfig },
    CssCompile,
    LessCompile { command: Vec<String> },
    SassCompile { command: Vec<String> },
    StylusCompile { command: Vec<String> },
    ScriptCompat { cache: bool },
    RuntimeTrim { drop_console: bool },
    MinifyScript { mangle: bool },
    MinifyStyle { targets: TargetsConfig },
    Lint { rules: Vec<String> },
}

impl StageOptions {
    /// The stage these options belong to.
    pub const fn stage(&self) -> StageName {
        match self {
            Self::StyleInject => StageName::StyleInject,
            Self::StyleExtract => StageName::StyleExtract,
            Self::StyleNormalize { .. } => StageName::StyleNormalize,
            Self::CssCompile => StageName::CssCompile,
            Self::LessCompile { .. } => StageName::LessCompile,
            Self::SassCompile { .. } => StageName::SassCompile,
            Self::StylusCompile { .. } => StageName::StylusCompile,
            Self::ScriptCompat { .. } => StageName::ScriptCompat,
            Self::RuntimeTrim { .. } => StageName::RuntimeTrim,
            Self::MinifyScript { .. } => StageName::MinifyScript,
            Self::MinifyStyle { .. } => StageName::MinifyStyle,
            Self::Lint { .. } => StageName::Lint,
        }
    }

    /// External command, for the dialect compilers.
    pub fn command(&self) -> Option<&[String]> {
        match self {
            Self::LessCompile { command }
            | Self::SassCompile { command }
            | Self::StylusCompile { command } => Some(command),
            _ => None,
        }
    }
}

/// One step of a transform chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformStage {
    pub name: StageName,
    pub options: StageOptions,
    /// Set from [`execution_for`]; true when the stage runs in the worker pool.
    pub parallel: bool,
}

impl TransformStage {
    pub fn new(options: StageOptions) -> Self {
        let name = options.stage();
        Self {
            name,
            options,
            parallel: execution_for(name) == Execution::Pooled,
        }
    }

    /// Stable identity of the stage and its options, used in cache keys.
    pub fn key(&self) -> String {
        serde_json::to_string(&self.options).unwrap_or_else(|_| self.name.to_string())
    }
}

impl fmt::Display for TransformStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_match_stage() {
        let stage = TransformStage::new(StageOptions::SassCompile {
            command: vec!["sass".into(), "--stdin".into()],
        });
        assert_eq!(stage.name, StageName::SassCompile);
        assert!(!stage.parallel);
        assert_eq!(
            stage.options.command(),
            Some(&["sass".to_string(), "--stdin".to_string()][..])
        );

        let stage = TransformStage::new(StageOptions::ScriptCompat { cache: true });
        assert!(stage.parallel);
        assert_eq!(stage.options.command(), None);
    }

    #[test]
    fn test_key_depends_on_options() {
        let a = TransformStage::new(StageOptions::RuntimeTrim { drop_console: false });
        let b = TransformStage::new(StageOptions::RuntimeTrim { drop_console: true });
        assert_ne!(a.key(), b.key());
        assert_eq!(a.key(), a.clone().key());
        assert!(a.key().contains("runtime-trim"));
    }
}
