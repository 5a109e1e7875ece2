//! Chain composition.
//!
//! Maps `(AssetKind, BuildMode)` to a [`TransformChain`]. The rule table is
//! fixed at construction; composing never consults global state.
//!
//! Chains list stages outermost-first, the way loaders are declared:
//!
//! ```text
//! scss, development:  [style-inject, style-normalize, sass-compile]
//! execution order:     sass-compile -> style-normalize -> style-inject
//! ```

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{ConfigError, EnginesConfig, LintConfig, PackConfig, RulesConfig};
use crate::core::{AssetKind, BuildMode};
use crate::pipeline::stage::{StageName, StageOptions, TransformStage};

/// Where a chain's output goes after its last stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Terminal {
    /// Joins a chunk (scripts, and styles through their chunk).
    Module,
    /// Written straight to the output namer.
    Emit,
    /// Handed to the template injector.
    Template,
}

/// Ordered stages for one asset kind in one mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformChain {
    pub kind: AssetKind,
    pub mode: BuildMode,
    /// Outermost first.
    pub stages: Vec<TransformStage>,
    pub terminal: Terminal,
}

impl TransformChain {
    /// Stages in the order they run: innermost (the compiler) first.
    pub fn execution_order(&self) -> impl Iterator<Item = &TransformStage> {
        self.stages.iter().rev()
    }

    pub fn stage_names(&self) -> Vec<StageName> {
        self.stages.iter().map(|s| s.name).collect()
    }

    pub fn is_passthrough(&self) -> bool {
        self.stages.is_empty()
    }
}

/// How a kind is routed, before the mode is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Style(StageName),
    Script,
    Emit,
    Template,
}

/// Rule table plus the engine settings stages are parameterized with.
#[derive(Debug, Clone)]
pub struct ChainComposer {
    rules: BTreeMap<AssetKind, Rule>,
    engines: EnginesConfig,
    lint: LintConfig,
}

impl Default for ChainComposer {
    fn default() -> Self {
        Self::new(&RulesConfig::default(), &EnginesConfig::default(), &LintConfig::default())
    }
}

impl ChainComposer {
    pub fn new(rules: &RulesConfig, engines: &EnginesConfig, lint: &LintConfig) -> Self {
        let table = AssetKind::ALL
            .into_iter()
            .filter(|kind| !rules.is_skipped(*kind))
            .map(|kind| (kind, Self::default_rule(kind)))
            .collect();
        Self {
            rules: table,
            engines: engines.clone(),
            lint: lint.clone(),
        }
    }

    pub fn from_config(config: &PackConfig) -> Self {
        Self::new(&config.rules, &config.engines, &config.lint)
    }

    fn default_rule(kind: AssetKind) -> Rule {
        match kind {
            AssetKind::Script => Rule::Script,
            AssetKind::StylesheetPlain => Rule::Style(StageName::CssCompile),
            AssetKind::StylesheetLess => Rule::Style(StageName::LessCompile),
            AssetKind::StylesheetSass => Rule::Style(StageName::SassCompile),
            AssetKind::StylesheetStylus => Rule::Style(StageName::StylusCompile),
            AssetKind::RasterImage | AssetKind::FontBinary | AssetKind::Other => Rule::Emit,
            AssetKind::HtmlTemplate => Rule::Template,
        }
    }

    /// Compose the chain for `kind` in `mode`.
    pub fn compose(&self, kind: AssetKind, mode: BuildMode) -> Result<TransformChain, ConfigError> {
        let rule = self
            .rules
            .get(&kind)
            .copied()
            .ok_or(ConfigError::UnhandledKind { kind })?;

        let (stages, terminal) = match rule {
            Rule::Style(compiler) => {
                let lead = if mode.is_production() {
                    StageOptions::StyleExtract
                } else {
                    StageOptions::StyleInject
                };
                let stages = vec![
                    TransformStage::new(lead),
                    TransformStage::new(StageOptions::StyleNormalize {
                        targets: self.engines.targets,
                    }),
                    TransformStage::new(self.compiler_options(compiler)),
                ];
                (stages, Terminal::Module)
            }
            Rule::Script => {
                let compat = TransformStage::new(StageOptions::ScriptCompat {
                    cache: self.engines.cache,
                });
                // Outermost first: the trim stage wraps compat and runs after it
                let stages = if mode.is_production() {
                    let trim = TransformStage::new(StageOptions::RuntimeTrim {
                        drop_console: self.engines.drop_console,
                    });
                    vec![trim, compat]
                } else {
                    vec![compat]
                };
                (stages, Terminal::Module)
            }
            Rule::Emit => (Vec::new(), Terminal::Emit),
            Rule::Template => (Vec::new(), Terminal::Template),
        };

        Ok(TransformChain {
            kind,
            mode,
            stages,
            terminal,
        })
    }

    fn compiler_options(&self, compiler: StageName) -> StageOptions {
        match compiler {
            StageName::LessCompile => StageOptions::LessCompile {
                command: self.engines.less.clone(),
            },
            StageName::SassCompile => StageOptions::SassCompile {
                command: self.engines.sass.clone(),
            },
            StageName::StylusCompile => StageOptions::StylusCompile {
                command: self.engines.stylus.clone(),
            },
            _ => StageOptions::CssCompile,
        }
    }

    /// Optimization stages applied after the chain. Production only.
    pub fn minimizers(&self, kind: AssetKind, mode: BuildMode) -> Vec<TransformStage> {
        if !mode.is_production() {
            return Vec::new();
        }
        if kind == AssetKind::Script {
            vec![TransformStage::new(StageOptions::MinifyScript { mangle: true })]
        } else if kind.is_style() {
            vec![TransformStage::new(StageOptions::MinifyStyle {
                targets: self.engines.targets,
            })]
        } else {
            Vec::new()
        }
    }

    /// Advisory lint stage for scripts, when enabled.
    pub fn lint_stage(&self, kind: AssetKind) -> Option<TransformStage> {
        (self.lint.enable && kind == AssetKind::Script).then(|| {
            TransformStage::new(StageOptions::Lint {
                rules: vec!["no-var".into()],
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StageName::*;

    #[test]
    fn test_development_scss_chain() {
        let chain = ChainComposer::default()
            .compose(AssetKind::StylesheetSass, BuildMode::Development)
            .unwrap();
        assert_eq!(chain.stage_names(), vec![StyleInject, StyleNormalize, SassCompile]);
        assert_eq!(chain.terminal, Terminal::Module);

        let order: Vec<_> = chain.execution_order().map(|s| s.name).collect();
        assert_eq!(order, vec![SassCompile, StyleNormalize, StyleInject]);
    }

    #[test]
    fn test_production_style_chains() {
        let composer = ChainComposer::default();
        for (kind, compiler) in [
            (AssetKind::StylesheetPlain, CssCompile),
            (AssetKind::StylesheetLess, LessCompile),
            (AssetKind::StylesheetStylus, StylusCompile),
        ] {
            let chain = composer.compose(kind, BuildMode::Production).unwrap();
            assert_eq!(chain.stage_names(), vec![StyleExtract, StyleNormalize, compiler]);
        }
    }

    #[test]
    fn test_script_chains() {
        let composer = ChainComposer::default();
        let dev = composer.compose(AssetKind::Script, BuildMode::Development).unwrap();
        assert_eq!(dev.stage_names(), vec![ScriptCompat]);
        let prod = composer.compose(AssetKind::Script, BuildMode::Production).unwrap();
        assert_eq!(prod.stage_names(), vec![RuntimeTrim, ScriptCompat]);
        assert!(prod.stages.iter().all(|s| s.parallel));

        let order: Vec<_> = prod.execution_order().map(|s| s.name).collect();
        assert_eq!(order, vec![ScriptCompat, RuntimeTrim]);
    }

    #[test]
    fn test_emit_and_template_terminals() {
        let composer = ChainComposer::default();
        for mode in [BuildMode::Development, BuildMode::Production] {
            for kind in [AssetKind::RasterImage, AssetKind::FontBinary, AssetKind::Other] {
                let chain = composer.compose(kind, mode).unwrap();
                assert!(chain.is_passthrough());
                assert_eq!(chain.terminal, Terminal::Emit);
            }
            let html = composer.compose(AssetKind::HtmlTemplate, mode).unwrap();
            assert_eq!(html.terminal, Terminal::Template);
        }
    }

    #[test]
    fn test_composition_is_idempotent() {
        let composer = ChainComposer::default();
        for kind in AssetKind::ALL {
            for mode in [BuildMode::Development, BuildMode::Production] {
                let first = composer.compose(kind, mode).unwrap();
                let second = composer.compose(kind, mode).unwrap();
                assert_eq!(first, second);
            }
        }
    }

    #[test]
    fn test_skipped_kind_is_unhandled() {
        let rules = RulesConfig {
            skip: vec![AssetKind::StylesheetStylus],
        };
        let composer = ChainComposer::new(&rules, &EnginesConfig::default(), &LintConfig::default());
        let err = composer
            .compose(AssetKind::StylesheetStylus, BuildMode::Production)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnhandledKind {
                kind: AssetKind::StylesheetStylus
            }
        ));
        assert!(composer.compose(AssetKind::StylesheetSass, BuildMode::Production).is_ok());
    }

    #[test]
    fn test_minimizers_by_mode() {
        let composer = ChainComposer::default();
        assert!(composer.minimizers(AssetKind::Script, BuildMode::Development).is_empty());
        assert_eq!(
            composer.minimizers(AssetKind::Script, BuildMode::Production)[0].name,
            MinifyScript
        );
        assert_eq!(
            composer.minimizers(AssetKind::StylesheetLess, BuildMode::Production)[0].name,
            MinifyStyle
        );
        assert!(composer.minimizers(AssetKind::RasterImage, BuildMode::Production).is_empty());
    }

    #[test]
    fn test_engine_settings_flow_into_options() {
        let engines = EnginesConfig {
            sass: vec!["npx".into(), "sass".into(), "--stdin".into()],
            drop_console: true,
            ..EnginesConfig::default()
        };
        let composer = ChainComposer::new(&RulesConfig::default(), &engines, &LintConfig::default());
        let chain = composer.compose(AssetKind::StylesheetSass, BuildMode::Production).unwrap();
        assert_eq!(chain.stages[2].options.command().unwrap()[0], "npx");
        let chain = composer.compose(AssetKind::Script, BuildMode::Production).unwrap();
        assert_eq!(
            chain.stages[0].options,
            StageOptions::RuntimeTrim { drop_console: true }
        );
    }

    #[test]
    fn test_lint_stage() {
        let composer = ChainComposer::default();
        assert!(composer.lint_stage(AssetKind::Script).is_some());
        assert!(composer.lint_stage(AssetKind::StylesheetPlain).is_none());
        let off = ChainComposer::new(
            &RulesConfig::default(),
            &EnginesConfig::default(),
            &LintConfig { enable: false },
        );
        assert!(off.lint_stage(AssetKind::Script).is_none());
    }
}
