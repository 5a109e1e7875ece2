//! Module linking.
//!
//! Chunks are classic scripts. Every module becomes a factory registered
//! with a page-wide registry, and its ES module syntax is rewritten into
//! registry calls:
//!
//! | Source                           | Linked                                              |
//! |----------------------------------|-----------------------------------------------------|
//! | `import d, { a as b } from "x"`  | `const __rp_0 = __rp.require("k"); const { "default": d, "a": b } = __rp_0;` |
//! | `import * as ns from "x"`        | `const __rp_0 = __rp.require("k"); const ns = __rp_0;` |
//! | `export const a = 1`             | `const a = 1` plus an `a` getter                    |
//! | `export { a as b }`              | a `b` getter                                        |
//! | `export { a } from "x"`          | `const __rp_0 = __rp.require("k")` plus an `a` getter |
//! | `export * from "x"`              | `__rp.reexport(__rp_exports, __rp.require("k"))`    |
//! | `export default expr`            | `__rp_exports.default = expr`                       |
//! | `import("x")`                    | `__rp.load("k")`                                    |
//!
//! Module keys are root-relative source paths. Imported bindings are read
//! when the importing statement runs, so a module in an import cycle can
//! see `undefined` where a native binding would be live.

use std::path::Path;

use oxc::ast::AstKind;
use oxc::ast::ast::{
    Declaration, ExportAllDeclaration, ExportDefaultDeclaration, ExportDefaultDeclarationKind,
    ExportNamedDeclaration, Expression, ImportDeclaration, ImportDeclarationSpecifier, Program,
    Statement,
};
use oxc::semantic::SemanticBuilder;
use oxc::span::GetSpan;

use crate::engine::script;

/// Registry every script chunk starts with. Only the first copy on a page
/// installs it, and the first definition of a key wins.
pub const PRELUDE: &str = r#"(function (g) {
  if (g.__routepack__) return;
  const factories = Object.create(null);
  const cache = Object.create(null);
  const rp = {
    define(key, factory) {
      if (!(key in factories)) factories[key] = factory;
    },
    require(key) {
      if (key in cache) return cache[key];
      const factory = factories[key];
      if (!factory) throw new Error("routepack: module not found: " + key);
      const exports = (cache[key] = {});
      factory(exports, rp);
      return exports;
    },
    load(key) {
      return rp.fetch(key).then(() => rp.require(key));
    },
    fetch() {
      return Promise.resolve();
    },
    exports(target, getters) {
      for (const name of Object.keys(getters)) {
        Object.defineProperty(target, name, { enumerable: true, get: getters[name] });
      }
    },
    reexport(target, source) {
      for (const name of Object.keys(source)) {
        if (name !== "default" && !(name in target)) {
          Object.defineProperty(target, name, { enumerable: true, get: () => source[name] });
        }
      }
    },
  };
  g.__routepack__ = rp;
})(self);
"#;

/// Wrap transformed module `code` as the factory for `key`.
///
/// `resolve` maps a specifier as written to the key of the module it
/// resolved to. Unresolved static imports require the specifier itself and
/// fail when the module runs; unresolved dynamic imports stay native.
pub fn link_module(
    path: &Path,
    key: &str,
    code: &str,
    resolve: impl Fn(&str) -> Option<String>,
) -> Result<String, String> {
    let body = script::with_program(path, code, |_, program| {
        let mut linker = Linker {
            resolve: &resolve,
            edits: Vec::new(),
            getters: Vec::new(),
            temps: 0,
        };
        linker.visit(&program);
        linker.finish(code)
    })?;
    Ok(define(key, &body))
}

/// A module whose default export is an asset URL.
pub fn asset_module(key: &str, url: &str) -> String {
    define(key, &format!("__rp_exports.default = {};\n", quote(url)))
}

/// A module with no exports, for styles that left the script.
pub fn empty_module(key: &str) -> String {
    define(key, "")
}

/// Run the entry module once every chunk before it has loaded.
pub fn bootstrap(key: &str) -> String {
    format!("self.__routepack__.require({});\n", quote(key))
}

fn define(key: &str, body: &str) -> String {
    let mut out = format!(
        "self.__routepack__.define({}, function (__rp_exports, __rp) {{\n\"use strict\";\n",
        quote(key)
    );
    out.push_str(body);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("});\n");
    out
}

fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Replace `start..end` of the source with `text`.
struct Edit {
    start: u32,
    end: u32,
    text: String,
}

struct Linker<'r> {
    resolve: &'r dyn Fn(&str) -> Option<String>,
    edits: Vec<Edit>,
    /// (exported name, expression)
    getters: Vec<(String, String)>,
    temps: usize,
}

impl Linker<'_> {
    fn visit(&mut self, program: &Program<'_>) {
        for statement in &program.body {
            match statement {
                Statement::ImportDeclaration(decl) => self.import(decl),
                Statement::ExportNamedDeclaration(decl) => self.export_named(decl),
                Statement::ExportDefaultDeclaration(decl) => self.export_default(decl),
                Statement::ExportAllDeclaration(decl) => self.export_all(decl),
                _ => {}
            }
        }

        let semantic = SemanticBuilder::new().build(program).semantic;
        for node in semantic.nodes().iter() {
            if let AstKind::ImportExpression(expr) = node.kind()
                && let Expression::StringLiteral(lit) = &expr.source
                && let Some(key) = (self.resolve)(lit.value.as_str())
            {
                self.replace(expr.span.start, expr.span.end, format!("__rp.load({})", quote(&key)));
            }
        }
    }

    fn require(&self, specifier: &str) -> String {
        let key = (self.resolve)(specifier).unwrap_or_else(|| specifier.to_string());
        format!("__rp.require({})", quote(&key))
    }

    fn temp(&mut self) -> String {
        let name = format!("__rp_{}", self.temps);
        self.temps += 1;
        name
    }

    fn replace(&mut self, start: u32, end: u32, text: impl Into<String>) {
        self.edits.push(Edit {
            start,
            end,
            text: text.into(),
        });
    }

    fn import(&mut self, decl: &ImportDeclaration<'_>) {
        let module = self.require(decl.source.value.as_str());
        let Some(specifiers) = decl.specifiers.as_ref().filter(|s| !s.is_empty()) else {
            self.replace(decl.span.start, decl.span.end, format!("{module};"));
            return;
        };

        let temp = self.temp();
        let mut text = format!("const {temp} = {module};");
        let mut named = Vec::new();
        for specifier in specifiers {
            match specifier {
                ImportDeclarationSpecifier::ImportSpecifier(s) => {
                    named.push(format!("{}: {}", quote(s.imported.name().as_str()), s.local.name));
                }
                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                    named.push(format!("\"default\": {}", s.local.name));
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                    text.push_str(&format!(" const {} = {temp};", s.local.name));
                }
            }
        }
        if !named.is_empty() {
            text.push_str(&format!(" const {{ {} }} = {temp};", named.join(", ")));
        }
        self.replace(decl.span.start, decl.span.end, text);
    }

    fn export_named(&mut self, decl: &ExportNamedDeclaration<'_>) {
        if let Some(declaration) = &decl.declaration {
            self.replace(decl.span.start, declaration.span().start, "");
            for name in declared_names(declaration) {
                self.getters.push((name.clone(), name));
            }
            return;
        }

        let text = match &decl.source {
            Some(source) => {
                let temp = self.temp();
                for s in &decl.specifiers {
                    let value = format!("{temp}[{}]", quote(s.local.name().as_str()));
                    self.getters.push((s.exported.name().to_string(), value));
                }
                format!("const {temp} = {};", self.require(source.value.as_str()))
            }
            None => {
                for s in &decl.specifiers {
                    self.getters
                        .push((s.exported.name().to_string(), s.local.name().to_string()));
                }
                String::new()
            }
        };
        self.replace(decl.span.start, decl.span.end, text);
    }

    fn export_default(&mut self, decl: &ExportDefaultDeclaration<'_>) {
        let inner = decl.declaration.span();
        let name = match &decl.declaration {
            ExportDefaultDeclarationKind::FunctionDeclaration(f) => {
                f.id.as_ref().map(|id| id.name.to_string())
            }
            ExportDefaultDeclarationKind::ClassDeclaration(c) => {
                c.id.as_ref().map(|id| id.name.to_string())
            }
            _ => None,
        };

        match name {
            Some(name) => {
                self.replace(decl.span.start, inner.start, "");
                self.getters.push(("default".to_string(), name));
            }
            None => {
                self.replace(decl.span.start, inner.start, "__rp_exports.default = ");
                self.replace(inner.end, inner.end, ";");
            }
        }
    }

    fn export_all(&mut self, decl: &ExportAllDeclaration<'_>) {
        let module = self.require(decl.source.value.as_str());
        let text = match &decl.exported {
            Some(exported) => {
                let temp = self.temp();
                self.getters.push((exported.name().to_string(), temp.clone()));
                format!("const {temp} = {module};")
            }
            None => format!("__rp.reexport(__rp_exports, {module});"),
        };
        self.replace(decl.span.start, decl.span.end, text);
    }

    /// Apply edits back to front, then prepend the export getters.
    fn finish(mut self, code: &str) -> String {
        self.edits
            .sort_by(|a, b| b.start.cmp(&a.start).then(b.end.cmp(&a.end)));
        let mut body = code.to_string();
        for edit in &self.edits {
            body.replace_range(edit.start as usize..edit.end as usize, &edit.text);
        }

        if !self.getters.is_empty() {
            let getters: Vec<String> = self
                .getters
                .iter()
                .map(|(name, value)| format!("{}: () => {value}", quote(name)))
                .collect();
            body.insert_str(0, &format!("__rp.exports(__rp_exports, {{ {} }});\n", getters.join(", ")));
        }
        body
    }
}

fn declared_names(declaration: &Declaration<'_>) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(var) => var
            .declarations
            .iter()
            .flat_map(|d| d.id.get_binding_identifiers())
            .map(|id| id.name.to_string())
            .collect(),
        Declaration::FunctionDeclaration(f) => f.id.iter().map(|id| id.name.to_string()).collect(),
        Declaration::ClassDeclaration(c) => c.id.iter().map(|id| id.name.to_string()).collect(),
        _ => Vec::new(),
    }
}
