//! Import scanning and module resolution.
//!
//! Walks scripts from each entry, resolving import specifiers to files:
//!
//! | Specifier            | Lookup                                       |
//! |----------------------|----------------------------------------------|
//! | `./a`, `../a`, `/a`  | Relative to the importer (or absolute)       |
//! | `@/a` (alias key)    | Alias target, then as a path                 |
//! | `pkg`, `@scope/pkg`  | `node_modules` in the importer's ancestors   |
//!
//! Path lookups try the exact file, then each configured extension, then
//! `index` plus each extension. A bare specifier that resolves nowhere is
//! left external; any other miss fails the build.
//!
//! Stylesheets contribute their `url()` references. Those are relative to
//! the stylesheet even without `./`; a leading `~` makes them module
//! specifiers (`~pkg/font.woff`, `~@/img/a.png`).

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ResolveConfig;
use crate::core::AssetKind;
use crate::debug;
use crate::engine::script::{self, ImportRef};
use crate::engine::style;
use crate::pipeline::ModuleGraph;
use crate::utils::path::{clean_path, normalize_path};

use super::BuildError;

/// Maps specifiers to files.
pub struct Resolver<'a> {
    extensions: &'a [String],
    /// Longest key first.
    alias: Vec<(&'a str, &'a Path)>,
}

impl<'a> Resolver<'a> {
    pub fn new(config: &'a ResolveConfig) -> Self {
        let mut alias: Vec<(&str, &Path)> = config
            .alias
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_path()))
            .collect();
        alias.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
        Self {
            extensions: &config.extensions,
            alias,
        }
    }

    /// Resolve `specifier` imported from the file `from`.
    pub fn resolve(&self, specifier: &str, from: &Path) -> Option<PathBuf> {
        let dir = from.parent().unwrap_or(Path::new("/"));

        if is_path_like(specifier) {
            return self.lookup(&dir.join(specifier));
        }
        if let Some(path) = self.alias_target(specifier) {
            return self.lookup(&path);
        }
        self.lookup_package(specifier, dir)
    }

    /// Resolve a stylesheet `url()` value, ignoring any query or fragment.
    pub fn resolve_style_url(&self, url: &str, from: &Path) -> Option<PathBuf> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        match path.strip_prefix('~') {
            Some(module) => self.resolve(module, from),
            None if is_path_like(path) => self.resolve(path, from),
            None => self.resolve(&format!("./{path}"), from),
        }
    }

    fn alias_target(&self, specifier: &str) -> Option<PathBuf> {
        self.alias.iter().find_map(|&(key, target)| {
            if specifier == key {
                Some(target.to_path_buf())
            } else {
                let rest = specifier.strip_prefix(key)?.strip_prefix('/')?;
                Some(target.join(rest))
            }
        })
    }

    /// File, file plus extension, then directory index.
    fn lookup(&self, base: &Path) -> Option<PathBuf> {
        let base = clean_path(base);
        if base.is_file() {
            return Some(normalize_path(&base));
        }
        let with_ext = |path: &Path, ext: &str| {
            let mut s = path.as_os_str().to_os_string();
            s.push(ext);
            PathBuf::from(s)
        };
        self.extensions
            .iter()
            .map(|ext| with_ext(&base, ext))
            .chain(self.extensions.iter().map(|ext| with_ext(&base.join("index"), ext)))
            .find(|p| p.is_file())
            .map(|p| normalize_path(&p))
    }

    fn lookup_package(&self, specifier: &str, dir: &Path) -> Option<PathBuf> {
        let (name, subpath) = split_package(specifier)?;
        dir.ancestors().find_map(|ancestor| {
            let package = ancestor.join("node_modules").join(name);
            if !package.is_dir() {
                return None;
            }
            match subpath {
                Some(sub) => self.lookup(&package.join(sub)),
                None => package_main(&package)
                    .and_then(|main| self.lookup(&package.join(main)))
                    .or_else(|| self.lookup(&package.join("index"))),
            }
        })
    }
}

fn is_path_like(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
        || specifier.starts_with('/')
}

/// `@scope/pkg/sub` -> (`@scope/pkg`, `sub`).
fn split_package(specifier: &str) -> Option<(&str, Option<&str>)> {
    let name_end = if specifier.starts_with('@') {
        let slash = specifier.find('/')?;
        specifier[slash + 1..].find('/').map(|i| slash + 1 + i)
    } else {
        specifier.find('/')
    };
    match name_end {
        Some(end) => Some((&specifier[..end], Some(&specifier[end + 1..]).filter(|s| !s.is_empty()))),
        None => Some((specifier, None)),
    }
}

/// `module` or `main` from the package manifest.
fn package_main(package: &Path) -> Option<String> {
    let text = fs::read_to_string(package.join("package.json")).ok()?;
    let manifest: serde_json::Value = serde_json::from_str(&text).ok()?;
    ["module", "main"]
        .iter()
        .find_map(|key| manifest.get(key)?.as_str().map(str::to_string))
}

/// Resolved graph plus the bare imports left external.
#[derive(Debug, Default)]
pub struct ScannedGraph {
    pub graph: ModuleGraph,
    /// (importer, specifier)
    pub externals: Vec<(PathBuf, String)>,
}

/// Build the module graph reachable from `entries`.
pub fn scan_graph(
    entries: &BTreeMap<String, PathBuf>,
    resolver: &Resolver<'_>,
) -> Result<ScannedGraph, BuildError> {
    let mut scanned = ScannedGraph::default();
    let graph = &mut scanned.graph;
    let mut queue = VecDeque::new();

    for (name, path) in entries {
        let before = graph.len();
        let id = graph.add_module(path.clone());
        graph.add_entry(name.clone(), id);
        if graph.len() > before {
            queue.push_back(id);
        }
    }

    while let Some(id) = queue.pop_front() {
        let path = graph.module(id).path.clone();
        let kind = AssetKind::classify(&path);
        let refs = match kind {
            AssetKind::Script => script_refs(&path)?,
            kind if kind.is_style() => style_refs(&path)?,
            _ => continue,
        };

        for import in refs {
            let resolved = if kind.is_style() {
                resolver.resolve_style_url(&import.specifier, &path)
            } else {
                resolver.resolve(&import.specifier, &path)
            };
            let Some(target) = resolved else {
                if kind.is_style()
                    || is_path_like(&import.specifier)
                    || resolver.alias_target(&import.specifier).is_some()
                {
                    return Err(BuildError::Unresolved {
                        specifier: import.specifier,
                        from: path,
                    });
                }
                scanned.externals.push((path.clone(), import.specifier));
                continue;
            };

            let before = graph.len();
            let target = graph.add_module(target);
            if graph.len() > before {
                queue.push_back(target);
            }
            if import.dynamic {
                graph.add_dynamic(id, target);
            } else {
                graph.add_static(id, target);
            }
            graph.add_specifier(id, import.specifier, target);
        }
    }

    Ok(scanned)
}

fn script_refs(path: &Path) -> Result<Vec<ImportRef>, BuildError> {
    let source = fs::read_to_string(path).map_err(|e| BuildError::Read(path.to_path_buf(), e))?;
    match script::analyze(path, &source) {
        Ok(facts) => Ok(facts.imports),
        Err(e) => {
            // script-compat reports the parse error with full context
            debug!("graph"; "cannot scan {}: {}", path.display(), e);
            Ok(Vec::new())
        }
    }
}

fn style_refs(path: &Path) -> Result<Vec<ImportRef>, BuildError> {
    let source = fs::read_to_string(path).map_err(|e| BuildError::Read(path.to_path_buf(), e))?;
    Ok(style::url_refs(&source)
        .into_iter()
        .map(|specifier| ImportRef {
            specifier,
            dynamic: false,
        })
        .collect())
}
