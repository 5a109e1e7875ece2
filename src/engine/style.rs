//! Stylesheet engines backed by lightningcss.

use std::sync::LazyLock;

use lightningcss::dependencies::{Dependency, DependencyOptions};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use regex::Regex;

use super::{StageContext, Transformer, as_text};
use crate::config::TargetsConfig;
use crate::pipeline::StageOptions;

/// Convert configured major versions into lightningcss targets.
pub fn browser_targets(targets: &TargetsConfig) -> Targets {
    // lightningcss encodes versions as major << 16 | minor << 8 | patch
    let encode = |major: Option<u32>| major.map(|v| v << 16);
    Targets::from(Browsers {
        chrome: encode(targets.chrome),
        firefox: encode(targets.firefox),
        safari: encode(targets.safari),
        edge: encode(targets.edge),
        ..Browsers::default()
    })
}

/// Parse, optionally lower for `targets`, and print.
fn process(
    source: &str,
    filename: &str,
    targets: Option<Targets>,
    minify: bool,
) -> Result<String, String> {
    let options = ParserOptions {
        filename: filename.to_string(),
        ..ParserOptions::default()
    };
    let mut sheet = StyleSheet::parse(source, options).map_err(|e| e.to_string())?;

    let targets = targets.unwrap_or_default();
    if targets.browsers.is_some() || minify {
        sheet
            .minify(MinifyOptions {
                targets,
                ..MinifyOptions::default()
            })
            .map_err(|e| e.to_string())?;
    }

    let printed = sheet
        .to_css(PrinterOptions {
            minify,
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;
    Ok(printed.code)
}

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));
static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"\s]+))\s*\)"#).expect("valid regex")
});

/// Local files referenced through `url()`, in source order, without duplicates.
///
/// Works on the raw dialect source so Less, Sass and Stylus files are
/// scanned before their compiler runs. Data URLs, fragments, absolute and
/// protocol URLs, and interpolated values are skipped.
pub fn url_refs(source: &str) -> Vec<String> {
    let source = COMMENT.replace_all(source, "");
    let mut refs: Vec<String> = Vec::new();
    for caps in URL.captures_iter(&source) {
        let Some(url) = caps.get(1).or(caps.get(2)).or(caps.get(3)) else {
            continue;
        };
        let url = url.as_str().trim();
        if is_local_url(url) && !refs.iter().any(|r| r == url) {
            refs.push(url.to_string());
        }
    }
    refs
}

fn is_local_url(url: &str) -> bool {
    !(url.is_empty()
        || url.starts_with('#')
        || url.starts_with('/')
        || url.starts_with("data:")
        || url.contains("://")
        || url.contains('$')
        || url.contains("@{")
        || url.contains("#{"))
}

/// Replace `url()` values with `resolve(url)`; unknown ones stay as written.
pub fn rewrite_urls(
    source: &str,
    filename: &str,
    resolve: impl Fn(&str) -> Option<String>,
) -> Result<String, String> {
    let options = ParserOptions {
        filename: filename.to_string(),
        ..ParserOptions::default()
    };
    let sheet = StyleSheet::parse(source, options).map_err(|e| e.to_string())?;
    let printed = sheet
        .to_css(PrinterOptions {
            analyze_dependencies: Some(DependencyOptions {
                remove_imports: false,
            }),
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;

    let mut code = printed.code;
    for dependency in printed.dependencies.unwrap_or_default() {
        let (placeholder, url) = match dependency {
            Dependency::Url(dep) => {
                let url = resolve(&dep.url).unwrap_or(dep.url);
                (dep.placeholder, url)
            }
            Dependency::Import(dep) => (dep.placeholder, dep.url),
        };
        code = code.replace(&placeholder, &url.replace('"', "%22"));
    }
    Ok(code)
}

/// `css-compile`: parse and re-print plain CSS, rejecting invalid input.
pub struct CssCompile;

impl Transformer for CssCompile {
    fn transform(
        &self,
        source: &[u8],
        _options: &StageOptions,
        ctx: &StageContext<'_>,
    ) -> Result<Vec<u8>, String> {
        process(as_text(source)?, ctx.rel, None, false).map(String::into_bytes)
    }
}

/// `style-normalize`: vendor prefixes and syntax lowering for the targets.
pub struct StyleNormalize;

impl Transformer for StyleNormalize {
    fn transform(
        &self,
        source: &[u8],
        options: &StageOptions,
        ctx: &StageContext<'_>,
    ) -> Result<Vec<u8>, String> {
        let StageOptions::StyleNormalize { targets } = options else {
            return Err("style-normalize received foreign options".into());
        };
        process(as_text(source)?, ctx.rel, Some(browser_targets(targets)), false)
            .map(String::into_bytes)
    }
}

/// `minify-style`
pub struct MinifyStyle;

impl Transformer for MinifyStyle {
    fn transform(
        &self,
        source: &[u8],
        options: &StageOptions,
        ctx: &StageContext<'_>,
    ) -> Result<Vec<u8>, String> {
        let targets = match options {
            StageOptions::MinifyStyle { targets } => Some(browser_targets(targets)),
            _ => None,
        };
        process(as_text(source)?, ctx.rel, targets, true).map(String::into_bytes)
    }
}

/// `style-inject`: turn CSS into a script that adds a `<style>` element.
pub struct StyleInject;

impl Transformer for StyleInject {
    fn transform(
        &self,
        source: &[u8],
        _options: &StageOptions,
        ctx: &StageContext<'_>,
    ) -> Result<Vec<u8>, String> {
        let css = serde_json::to_string(as_text(source)?).map_err(|e| e.to_string())?;
        let origin = serde_json::to_string(ctx.rel).map_err(|e| e.to_string())?;
        let script = format!(
            "(function () {{\n  const style = document.createElement(\"style\");\n  \
             style.setAttribute(\"data-source\", {origin});\n  \
             style.textContent = {css};\n  \
             document.head.appendChild(style);\n}})();\n"
        );
        Ok(script.into_bytes())
    }
}

/// `style-extract`: CSS passes through; the executor collects it per chunk.
pub struct StyleExtract;

impl Transformer for StyleExtract {
    fn transform(
        &self,
        source: &[u8],
        _options: &StageOptions,
        _ctx: &StageContext<'_>,
    ) -> Result<Vec<u8>, String> {
        Ok(source.to_vec())
    }
}
