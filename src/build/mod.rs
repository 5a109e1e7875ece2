//! Build execution.
//!
//! Build pipeline phases:
//! - **Assemble** - scan assets, resolve the module graph, route every
//!   asset, plan chunks. Configuration problems fail here.
//! - **Check** - every stage a used route needs has a runnable engine
//! - **Name assets** - fingerprint or inline every asset module
//! - **Transform** - inline stages, then pooled jobs and lint jobs
//! - **Emit** - link modules into chunks, inject the template
//! - **Publish** - write the output root (staged when `clean`)
//!
//! Any transform failure fails the whole build before anything is written.

pub mod emit;
pub mod graph;
pub mod link;
pub mod publish;
pub mod scan;
pub mod template;
pub mod transform;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::Result;
use thiserror::Error;

use crate::cache::TransformCache;
use crate::config::{ConfigError, PackConfig};
use crate::core::BuildMode;
use crate::engine::{EngineRegistry, LintFinding, TransformError};
use crate::logger::ProgressLine;
use crate::pipeline::{
    ChainComposer, ChunkPlan, ChunkPlanner, ModuleGraph, ModuleId, OutputNamer, RoutingTable,
    Terminal, WorkerPool,
};
use crate::utils::plural_count;

use emit::{EmittedAssets, Manifest};
use graph::Resolver;
use transform::{Executor, ModuleWork};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot resolve `{specifier}` imported from `{}`", .from.display())]
    Unresolved { specifier: String, from: PathBuf },

    #[error("failed to read `{}`", .0.display())]
    Read(PathBuf, #[source] io::Error),

    #[error("failed to write `{}`", .0.display())]
    Write(PathBuf, #[source] io::Error),

    #[error("cannot link `{}`: {}", .0.display(), .1)]
    Link(PathBuf, String),

    #[error("failed to serialize the manifest")]
    Manifest(#[source] serde_json::Error),

    #[error("{}", transform_failures(.0))]
    Transform(Vec<TransformError>),
}

fn transform_failures(errors: &[TransformError]) -> String {
    let mut message = format!("{} failed:", plural_count(errors.len(), "transform"));
    for error in errors {
        message.push_str("\n  ");
        message.push_str(&error.to_string());
    }
    message
}

/// Routing and planning result. Immutable once built.
#[derive(Debug)]
pub struct Assembly {
    pub mode: BuildMode,
    pub table: RoutingTable,
    pub graph: ModuleGraph,
    pub plan: ChunkPlan,
    pub namer: OutputNamer,
    /// Bare imports no package provides: (importer, specifier).
    pub externals: Vec<(PathBuf, String)>,
}

/// Scan, resolve, route and plan without transforming anything.
pub fn assemble(config: &PackConfig, mode: BuildMode) -> Result<Assembly, BuildError> {
    let build = &config.build;
    let excluded = [build.output.as_path(), build.cache.as_path()];
    let mut assets: BTreeSet<PathBuf> = scan::collect_files(&build.source, &excluded)
        .into_iter()
        .collect();

    let resolver = Resolver::new(&config.resolve);
    let scanned = graph::scan_graph(&build.entries, &resolver)?;
    // Modules outside the source root (node_modules) are routed too
    assets.extend(scanned.graph.modules().iter().map(|n| n.path.clone()));
    let assets: Vec<PathBuf> = assets.into_iter().collect();

    let composer = ChainComposer::from_config(config);
    let namer = OutputNamer::new(&config.output);
    let table = RoutingTable::assemble(&assets, mode, &composer, &namer)?;
    let plan = ChunkPlanner::new(&config.split, &namer).plan(&scanned.graph, mode);

    Ok(Assembly {
        mode,
        table,
        graph: scanned.graph,
        plan,
        namer,
        externals: scanned.externals,
    })
}

/// What a finished build did.
#[derive(Debug)]
pub struct BuildReport {
    pub mode: BuildMode,
    pub assets: usize,
    pub modules: usize,
    pub chunks: usize,
    pub files: usize,
    pub cache_hits: usize,
    pub findings: Vec<LintFinding>,
    pub externals: Vec<(PathBuf, String)>,
    pub manifest: Manifest,
}

/// Run a full build and publish the output root.
pub fn build(config: &PackConfig, mode: BuildMode, quiet: bool) -> Result<BuildReport> {
    let assembly = assemble(config, mode)?;

    // Only routes the graph reaches need their collaborators
    let used = assembly
        .graph
        .modules()
        .iter()
        .filter_map(|node| assembly.table.get(&node.path));
    let registry = EngineRegistry::with_builtin();
    registry
        .validate(RoutingTable::required_stages(used).into_values())
        .map_err(BuildError::from)?;

    let assets = emit::emit_assets(config, &assembly)?;
    let work = collect_work(config, &assembly, &assets)?;
    let modules = work.len();

    let pool = WorkerPool::new()?;
    let cache = TransformCache::new(&config.build.cache, config.engines.cache);
    let progress = (!quiet).then(|| {
        ProgressLine::new(&[
            (transform::MODULES, modules),
            (transform::LINT, Executor::lint_jobs(&work)),
        ])
    });
    let outcome = Executor::new(&registry, &cache, &pool).run(work, progress.as_ref());
    if let Some(progress) = progress {
        progress.finish();
    }

    if !outcome.errors.is_empty() {
        return Err(BuildError::Transform(outcome.errors).into());
    }

    let (set, manifest) = emit::emit(config, &assembly, assets, &outcome.outputs)?;
    let files = publish::publish(&set, &config.build.output, config.build.clean)?;

    Ok(BuildReport {
        mode,
        assets: assembly.table.len(),
        modules,
        chunks: assembly.plan.chunks.len(),
        files,
        cache_hits: outcome.cache_hits,
        findings: outcome.findings,
        externals: assembly.externals,
        manifest,
    })
}

/// Read every graph module that joins a chunk.
fn collect_work(
    config: &PackConfig,
    assembly: &Assembly,
    assets: &EmittedAssets,
) -> Result<Vec<ModuleWork>, BuildError> {
    let mut work = Vec::new();
    for (id, node) in assembly.graph.modules().iter().enumerate() {
        let Some(route) = assembly.table.get(&node.path) else { continue };
        if route.chain.terminal != Terminal::Module {
            continue;
        }
        let source = fs::read(&node.path).map_err(|e| BuildError::Read(node.path.clone(), e))?;
        let urls = if route.kind.is_style() {
            style_urls(&node.specifiers, assets)
        } else {
            BTreeMap::new()
        };
        work.push(ModuleWork {
            id,
            path: node.path.clone(),
            rel: config.root_relative(&node.path),
            route: route.clone(),
            source,
            urls,
        });
    }
    Ok(work)
}

/// Stylesheet `url()` values to asset URLs, keeping any `#fragment`.
fn style_urls(
    specifiers: &BTreeMap<String, ModuleId>,
    assets: &EmittedAssets,
) -> BTreeMap<String, String> {
    specifiers
        .iter()
        .filter_map(|(url, &target)| {
            let public = assets.url(target)?;
            let fragment = url.find('#').map_or("", |i| &url[i..]);
            Some((url.clone(), format!("{public}{fragment}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StageName;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn project(extra: &[(&str, &str)]) -> (TempDir, PackConfig) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(
            root,
            "src/main.js",
            b"import './theme.css';\nimport { greet } from './greet';\nimport banner from './banner.png';\ngreet(banner);\n",
        );
        write(root, "src/greet.js", b"export function greet(name) {\n  var message = 'hi ' + name;\n  return message;\n}\n");
        write(root, "src/theme.css", b".title { user-select: none; color: #ff0000; }\n");
        write(root, "src/banner.png", &[7u8; 50 * 1024]);
        write(root, "public/index.html", b"<html><head><title>t</title></head><body></body></html>");
        for (rel, content) in extra {
            write(root, rel, content.as_bytes());
        }
        let config = PackConfig::from_str_at("", root).unwrap();
        (dir, config)
    }

    #[test]
    fn test_assemble_routes_every_scanned_asset() {
        let (_dir, config) = project(&[("src/unused.less", "@c: red;")]);
        let assembly = assemble(&config, BuildMode::Development).unwrap();

        assert_eq!(assembly.table.len(), 5);
        assert_eq!(assembly.graph.len(), 4);
        assert!(assembly.plan.chunk("runtime~main").is_some());
        assert!(assembly.externals.is_empty());
    }

    #[test]
    fn test_unhandled_kind_fails_before_dispatch() {
        let (_dir, mut config) = project(&[]);
        config.rules.skip = vec![crate::core::AssetKind::RasterImage];

        let err = assemble(&config, BuildMode::Production).unwrap_err();
        assert!(matches!(err, BuildError::Config(ConfigError::Route { .. })));
        assert!(err.to_string().contains("banner.png"));
    }

    #[test]
    fn test_missing_collaborator_only_for_used_routes() {
        let (dir, mut config) = project(&[("src/unused.styl", "a\n  color red")]);
        config.engines.stylus = vec!["routepack-missing-stylus".into()];
        // Unreachable stylus file: the build does not need the compiler
        build(&config, BuildMode::Development, true).unwrap();

        write(dir.path(), "src/main.js", b"import './unused.styl';\n");
        let err = build(&config, BuildMode::Development, true).unwrap_err();
        let err = err.downcast_ref::<BuildError>().unwrap();
        assert!(matches!(
            err,
            BuildError::Config(ConfigError::MissingCollaborator { stage: "stylus-compile", .. })
        ));
    }

    #[test]
    fn test_production_build() {
        let (dir, config) = project(&[("public/favicon.ico", "ico")]);
        let report = build(&config, BuildMode::Production, true).unwrap();
        let output = dir.path().join("dist");

        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].rule, "no-var");

        let manifest = &report.manifest;
        // 50 KB is over the inline limit: fingerprinted file under static/imgs
        let banner = &manifest.files["src/banner.png"][0];
        assert!(banner.starts_with("static/imgs/") && banner.ends_with(".png"));
        assert_eq!(banner.len(), "static/imgs/".len() + 8 + ".png".len());
        assert!(output.join(banner).is_file());

        let entry = &manifest.entrypoints["main"];
        let css = fs::read_to_string(output.join(&entry.css[0])).unwrap();
        assert!(css.contains("-webkit-user-select") || css.contains("user-select"));
        assert!(css.contains("color:red"));

        let main = fs::read_to_string(output.join(entry.js.last().unwrap())).unwrap();
        assert!(main.contains(&format!("/{banner}")));
        assert!(!main.contains("/* src/"));

        let html = fs::read_to_string(output.join("index.html")).unwrap();
        assert!(html.contains("<title>t</title>"));
        assert!(html.contains("rel=\"preload\""));
        assert!(output.join("favicon.ico").is_file());
        assert!(output.join("manifest.json").is_file());
        assert!(!output.join("public").exists());
    }

    #[test]
    fn test_development_build() {
        let (dir, config) = project(&[]);
        let report = build(&config, BuildMode::Development, true).unwrap();
        let output = dir.path().join("dist");

        let main = fs::read_to_string(output.join("static/js/main.js")).unwrap();
        assert!(main.contains("/* src/theme.css */"));
        assert!(main.contains("document.createElement(\"style\")"));
        assert!(report.manifest.entrypoints["main"].css.is_empty());
        assert!(!fs::read_to_string(output.join("index.html")).unwrap().contains("preload"));
    }

    #[test]
    fn test_transform_failure_publishes_nothing() {
        let (dir, config) = project(&[("src/broken.js", "export const = ;")]);
        write(dir.path(), "src/main.js", b"import './broken';\nimport './theme.css';\n");

        let err = build(&config, BuildMode::Production, true).unwrap_err();
        let err = err.downcast_ref::<BuildError>().unwrap();
        let BuildError::Transform(errors) = err else {
            panic!("expected transform failure, got {err}");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].stage, StageName::ScriptCompat);
        assert!(!dir.path().join("dist").exists());
    }

    #[test]
    fn test_stylesheet_urls_point_at_emitted_assets() {
        let (dir, config) = project(&[]);
        write(
            dir.path(),
            "src/theme.css",
            b"@font-face { font-family: Body; src: url(./fonts/body.woff2) format(\"woff2\") }\n.icon { background: url(icon.png) }\n",
        );
        write(dir.path(), "src/fonts/body.woff2", &[3u8; 2048]);
        write(dir.path(), "src/icon.png", &[4u8; 16]);

        let report = build(&config, BuildMode::Production, true).unwrap();
        let output = dir.path().join("dist");
        let manifest = &report.manifest;

        let font = &manifest.files["src/fonts/body.woff2"][0];
        assert!(font.starts_with("static/media/") && font.ends_with(".woff2"));
        assert!(output.join(font).is_file());
        assert_eq!(manifest.inlined, vec!["src/icon.png".to_string()]);

        let css = fs::read_to_string(output.join(&manifest.entrypoints["main"].css[0])).unwrap();
        assert!(css.contains(&format!("/{font}")));
        assert!(css.contains("data:image/png;base64,"));
        assert!(!css.contains("./fonts/body.woff2"));
    }

    #[test]
    fn test_production_scripts_run_compat_then_trim() {
        let (dir, config) = project(&[]);
        write(
            dir.path(),
            "src/greet.js",
            b"export function greet(name) {\n  debugger;\n  return 'hi ' + name;\n}\n",
        );

        let assembly = assemble(&config, BuildMode::Production).unwrap();
        let route = assembly.table.iter().find(|r| r.path.ends_with("src/greet.js")).unwrap();
        let stages: Vec<_> = route.stages().map(|s| s.name).collect();
        assert_eq!(
            stages,
            [StageName::ScriptCompat, StageName::RuntimeTrim, StageName::MinifyScript]
        );

        let report = build(&config, BuildMode::Production, true).unwrap();
        let main = report.manifest.entrypoints["main"].js.last().unwrap().clone();
        let main = fs::read_to_string(dir.path().join("dist").join(main)).unwrap();
        assert!(!main.contains("debugger"));
        assert!(main.contains("self.__routepack__.define(\"src/greet.js\""));
        assert!(main.ends_with("self.__routepack__.require(\"src/main.js\");\n"));
    }

    #[test]
    fn test_transform_failures_message() {
        let errors = vec![
            TransformError {
                path: PathBuf::from("/p/a.js"),
                stage: StageName::ScriptCompat,
                message: "unexpected token".into(),
            },
            TransformError {
                path: PathBuf::from("/p/b.css"),
                stage: StageName::CssCompile,
                message: "bad selector".into(),
            },
        ];
        let message = BuildError::Transform(errors).to_string();
        assert!(message.starts_with("2 transforms failed:"));
        assert!(message.contains("script-compat failed for `/p/a.js`: unexpected token"));
    }
}
