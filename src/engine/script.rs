//! Script engines backed by oxc.

use std::path::Path;

use oxc::allocator::Allocator;
use oxc::ast::AstKind;
use oxc::ast::ast::{Expression, Program, VariableDeclarationKind};
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::semantic::SemanticBuilder;
use oxc::span::SourceType;

use super::{StageContext, Transformer, as_text};
use crate::pipeline::StageOptions;

fn source_type(path: &Path) -> SourceType {
    SourceType::from_path(path).unwrap_or_else(|_| SourceType::mjs())
}

/// Parse `source` and hand the program to `f`. Parse errors are joined into one message.
pub(crate) fn with_program<T>(
    path: &Path,
    source: &str,
    f: impl for<'a> FnOnce(&'a Allocator, Program<'a>) -> T,
) -> Result<T, String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type(path)).parse();
    if ret.panicked || !ret.errors.is_empty() {
        let messages: Vec<String> = ret.errors.iter().map(ToString::to_string).collect();
        return Err(if messages.is_empty() {
            "parser gave up".into()
        } else {
            messages.join("\n")
        });
    }
    Ok(f(&allocator, ret.program))
}

/// Import found in a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    pub specifier: String,
    pub dynamic: bool,
}

/// What the import scanner and linter need to know about a script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptFacts {
    /// Static and literal dynamic imports, in source order.
    pub imports: Vec<ImportRef>,
    /// 1-based lines of `var` declarations.
    pub var_lines: Vec<usize>,
}

/// Collect imports and `var` declarations.
///
/// `import(expr)` with a non-literal argument cannot be resolved and is skipped.
pub fn analyze(path: &Path, source: &str) -> Result<ScriptFacts, String> {
    with_program(path, source, |_, program| {
        let semantic = SemanticBuilder::new().build(&program).semantic;
        let mut imports: Vec<(u32, ImportRef)> = Vec::new();
        let mut var_starts = Vec::new();

        let mut push = |start: u32, specifier: &str, dynamic: bool| {
            imports.push((
                start,
                ImportRef {
                    specifier: specifier.to_string(),
                    dynamic,
                },
            ));
        };

        for node in semantic.nodes().iter() {
            match node.kind() {
                AstKind::ImportDeclaration(decl) => {
                    push(decl.span.start, decl.source.value.as_str(), false);
                }
                AstKind::ExportAllDeclaration(decl) => {
                    push(decl.span.start, decl.source.value.as_str(), false);
                }
                AstKind::ExportNamedDeclaration(decl) => {
                    if let Some(source) = &decl.source {
                        push(decl.span.start, source.value.as_str(), false);
                    }
                }
                AstKind::ImportExpression(expr) => {
                    if let Expression::StringLiteral(lit) = &expr.source {
                        push(expr.span.start, lit.value.as_str(), true);
                    }
                }
                AstKind::VariableDeclaration(decl) if decl.kind == VariableDeclarationKind::Var => {
                    var_starts.push(decl.span.start);
                }
                _ => {}
            }
        }

        imports.sort_by_key(|(start, _)| *start);
        var_starts.sort_unstable();
        ScriptFacts {
            imports: imports.into_iter().map(|(_, i)| i).collect(),
            var_lines: var_starts.into_iter().map(|s| line_of(source, s)).collect(),
        }
    })
}

/// 1-based line containing byte offset `offset`.
pub fn line_of(source: &str, offset: u32) -> usize {
    let end = (offset as usize).min(source.len());
    source.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}

/// `script-compat`: parse and regenerate. Rejects malformed sources.
pub struct ScriptCompat;

impl Transformer for ScriptCompat {
    fn transform(
        &self,
        source: &[u8],
        _options: &StageOptions,
        ctx: &StageContext<'_>,
    ) -> Result<Vec<u8>, String> {
        with_program(ctx.path, as_text(source)?, |_, program| {
            Codegen::new().build(&program).code.into_bytes()
        })
    }
}

/// `runtime-trim`: drop `debugger` (and optionally `console.*`) without mangling.
pub struct RuntimeTrim;

impl Transformer for RuntimeTrim {
    fn transform(
        &self,
        source: &[u8],
        options: &StageOptions,
        ctx: &StageContext<'_>,
    ) -> Result<Vec<u8>, String> {
        let drop_console = matches!(options, StageOptions::RuntimeTrim { drop_console: true });
        with_program(ctx.path, as_text(source)?, |allocator, mut program| {
            let options = MinifierOptions {
                mangle: None,
                compress: Some(CompressOptions {
                    drop_debugger: true,
                    drop_console,
                    ..CompressOptions::smallest()
                }),
            };
            let ret = Minifier::new(options).minify(allocator, &mut program);
            Codegen::new()
                .with_scoping(ret.scoping)
                .build(&program)
                .code
                .into_bytes()
        })
    }
}

/// `minify-script`
pub struct MinifyScript;

impl Transformer for MinifyScript {
    fn transform(
        &self,
        source: &[u8],
        options: &StageOptions,
        ctx: &StageContext<'_>,
    ) -> Result<Vec<u8>, String> {
        let mangle = !matches!(options, StageOptions::MinifyScript { mangle: false });
        with_program(ctx.path, as_text(source)?, |allocator, mut program| {
            let options = MinifierOptions {
                mangle: mangle.then(MangleOptions::default),
                compress: Some(CompressOptions::smallest()),
            };
            let ret = Minifier::new(options).minify(allocator, &mut program);
            Codegen::new()
                .with_options(CodegenOptions {
                    minify: true,
                    comments: CommentOptions::disabled(),
                    ..CodegenOptions::default()
                })
                .with_scoping(ret.scoping)
                .build(&program)
                .code
                .into_bytes()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> StageContext<'static> {
        StageContext {
            path: Path::new("/p/src/main.js"),
            rel: "src/main.js",
        }
    }

    fn run(engine: &dyn Transformer, options: &StageOptions, source: &str) -> Result<String, String> {
        engine
            .transform(source.as_bytes(), options, &ctx())
            .map(|out| String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_compat_rejects_malformed() {
        let options = StageOptions::ScriptCompat { cache: false };
        let out = run(&ScriptCompat, &options, "export const answer = 42;").unwrap();
        assert!(out.contains("answer = 42"));
        assert!(run(&ScriptCompat, &options, "const = ;").is_err());
    }

    #[test]
    fn test_runtime_trim() {
        let source = "export function f(x) { debugger; console.log(x); return x + 1; }";
        let keep = run(&RuntimeTrim, &StageOptions::RuntimeTrim { drop_console: false }, source).unwrap();
        assert!(!keep.contains("debugger"));
        assert!(keep.contains("console.log"));

        let drop = run(&RuntimeTrim, &StageOptions::RuntimeTrim { drop_console: true }, source).unwrap();
        assert!(!drop.contains("console"));
    }

    #[test]
    fn test_minify_script_shrinks() {
        let source = "export function add(first, second) {\n  return first + second;\n}\n";
        let out = run(&MinifyScript, &StageOptions::MinifyScript { mangle: true }, source).unwrap();
        assert!(out.len() < source.len());
        assert!(out.contains("add"));
    }

    #[test]
    fn test_analyze_imports() {
        let source = r#"
import a from "./a";
export * from "./b";
export { c } from "./c";
export const local = 1;
const page = () => import("./pages/about");
const lazy = (name) => import(name);
"#;
        let facts = analyze(Path::new("main.js"), source).unwrap();
        let found: Vec<_> = facts
            .imports
            .iter()
            .map(|i| (i.specifier.as_str(), i.dynamic))
            .collect();
        assert_eq!(
            found,
            vec![
                ("./a", false),
                ("./b", false),
                ("./c", false),
                ("./pages/about", true),
            ]
        );
        assert!(facts.var_lines.is_empty());
    }

    #[test]
    fn test_analyze_var_lines() {
        let source = "let a = 1;\nvar b = 2;\nfunction f() {\n  var c = 3;\n}\n";
        let facts = analyze(Path::new("x.js"), source).unwrap();
        assert_eq!(facts.var_lines, vec![2, 4]);
    }

    #[test]
    fn test_line_of() {
        assert_eq!(line_of("a\nb\nc", 0), 1);
        assert_eq!(line_of("a\nb\nc", 2), 2);
        assert_eq!(line_of("a\nb\nc", 99), 3);
    }
}
