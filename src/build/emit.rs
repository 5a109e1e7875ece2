//! Output assembly.
//!
//! Turns transformed modules and the chunk plan into output files:
//!
//! ```text
//! static/js/<chunk>[.hash].js       scripts, linked modules in plan order
//! static/css/<chunk>[.hash].css     extracted styles (production)
//! static/imgs/, static/media/       emitted assets
//! index.html                        template with injected tags
//! manifest.json                     what went where
//! ```
//!
//! Every script chunk starts with the module registry prelude and holds one
//! factory per module (see [`super::link`]). Entry chunks end by requiring
//! their entry module; the loader that fetches async chunks lives in the
//! runtime chunk, or in the entry chunk when there is none.
//!
//! Asset modules are named before the transform phase so stylesheets can
//! point at their final URLs. Nothing is written here; the result is handed
//! to the publisher.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::config::PackConfig;
use crate::core::{AssetKind, BuildMode};
use crate::debug;
use crate::log;
use crate::pipeline::{Chunk, ChunkKind, Emission, ModuleId, Route, StageName, Terminal};
use crate::utils::path::rel_slash;

use super::link;
use super::template::{self, Injection};
use super::{Assembly, BuildError, scan};

/// Manifest file name in the output root.
pub const MANIFEST: &str = "manifest.json";

const LOADER_TEMPLATE: &str = r#"(function (rp) {
  const chunks = __CHUNKS__;
  const targets = __TARGETS__;
  const pending = new Map();
  const load = (url, css) =>
    new Promise((resolve, reject) => {
      const el = document.createElement(css ? "link" : "script");
      if (css) {
        el.rel = "stylesheet";
        el.href = url;
      } else {
        el.src = url;
      }
      el.onload = resolve;
      el.onerror = () => reject(new Error("failed to load " + url));
      document.head.appendChild(el);
    });
  rp.fetch = function (request) {
    const name = targets[request] || request;
    if (!pending.has(name)) {
      const files = chunks[name] || { js: [], css: [] };
      pending.set(
        name,
        Promise.all(files.css.map((u) => load(u, true)).concat(files.js.map((u) => load(u, false))))
      );
    }
    return pending.get(name);
  };
})(self.__routepack__);
"#;

/// Files to publish, keyed by output-relative path.
#[derive(Debug, Default)]
pub struct OutputSet {
    files: BTreeMap<String, Vec<u8>>,
}

impl OutputSet {
    pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>) {
        self.files.insert(path.into(), bytes);
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Script and stylesheet paths, output-relative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileSet {
    pub js: Vec<String>,
    pub css: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkFiles {
    pub kind: ChunkKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub js: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
}

/// Contents of `manifest.json`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub mode: BuildMode,
    pub public_path: String,
    pub entrypoints: BTreeMap<String, FileSet>,
    pub chunks: BTreeMap<String, ChunkFiles>,
    /// Source (root-relative) to the output files holding it.
    pub files: BTreeMap<String, Vec<String>>,
    /// Sources inlined as data URLs.
    pub inlined: Vec<String>,
}

/// Images, fonts and other files referenced by scripts and stylesheets.
#[derive(Debug, Default)]
pub struct EmittedAssets {
    /// Public URL (or data URL) of each asset module.
    urls: FxHashMap<ModuleId, String>,
    /// (source, output path, bytes)
    files: Vec<(String, String, Vec<u8>)>,
    inlined: Vec<String>,
}

impl EmittedAssets {
    pub fn url(&self, id: ModuleId) -> Option<&str> {
        self.urls.get(&id).map(String::as_str)
    }
}

/// Name every asset module reached by the graph.
pub fn emit_assets(config: &PackConfig, assembly: &Assembly) -> Result<EmittedAssets, BuildError> {
    let mut assets = EmittedAssets::default();
    for (id, node) in assembly.graph.modules().iter().enumerate() {
        let Some(route) = assembly.table.get(&node.path) else { continue };
        if route.chain.terminal != Terminal::Emit {
            continue;
        }

        let bytes = fs::read(&node.path).map_err(|e| BuildError::Read(node.path.clone(), e))?;
        let stem = node.path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
        let ext = node.path.extension().map(|s| s.to_string_lossy()).unwrap_or_default();
        let rel = config.root_relative(&node.path);

        match route.output.emit(&stem, &ext, &bytes) {
            Emission::Inline { data_url } => {
                debug!("emit"; "inlined {} ({} bytes)", rel, bytes.len());
                assets.urls.insert(id, data_url);
                assets.inlined.push(rel);
            }
            Emission::File { path } => {
                assets.urls.insert(id, assembly.namer.url(&path));
                assets.files.push((rel, path, bytes));
            }
        }
    }
    Ok(assets)
}

/// Build the output set for a transformed assembly.
pub fn emit(
    config: &PackConfig,
    assembly: &Assembly,
    assets: EmittedAssets,
    outputs: &FxHashMap<ModuleId, Vec<u8>>,
) -> Result<(OutputSet, Manifest), BuildError> {
    Emitter {
        config,
        assembly,
        outputs,
        set: OutputSet::default(),
        manifest: Manifest {
            mode: assembly.mode,
            public_path: config.output.public_path.clone(),
            entrypoints: BTreeMap::new(),
            chunks: BTreeMap::new(),
            files: BTreeMap::new(),
            inlined: Vec::new(),
        },
        assets,
    }
    .run()
}

struct Emitter<'a> {
    config: &'a PackConfig,
    assembly: &'a Assembly,
    outputs: &'a FxHashMap<ModuleId, Vec<u8>>,
    set: OutputSet,
    manifest: Manifest,
    assets: EmittedAssets,
}

impl<'a> Emitter<'a> {
    fn run(mut self) -> Result<(OutputSet, Manifest), BuildError> {
        for (rel, path, bytes) in std::mem::take(&mut self.assets.files) {
            self.manifest.files.insert(rel, vec![path.clone()]);
            self.set.insert(path, bytes);
        }
        self.manifest.inlined = std::mem::take(&mut self.assets.inlined);
        self.emit_chunks()?;
        self.emit_entrypoints();
        self.emit_html()?;
        if self.assembly.mode.is_production() {
            self.copy_public()?;
        }

        self.manifest.inlined.sort();
        let manifest = serde_json::to_vec_pretty(&self.manifest).map_err(BuildError::Manifest)?;
        self.set.insert(MANIFEST, manifest);
        Ok((self.set, self.manifest))
    }

    fn route(&self, id: ModuleId) -> Option<&'a Route> {
        self.assembly.table.get(&self.assembly.graph.module(id).path)
    }

    fn rel(&self, id: ModuleId) -> String {
        self.config.root_relative(&self.assembly.graph.module(id).path)
    }

    /// Link and write every chunk. Split and async chunks go first so
    /// entries and runtimes can list their files.
    fn emit_chunks(&mut self) -> Result<(), BuildError> {
        let assembly = self.assembly;
        let plan = &assembly.plan;
        let mut chunks: Vec<&'a Chunk> = plan.chunks.values().collect();
        chunks.sort_by_key(|c| match c.kind {
            ChunkKind::Split | ChunkKind::Async => 0,
            ChunkKind::Entry => 1,
            ChunkKind::Runtime => 2,
        });

        for chunk in chunks {
            let (modules, css) = self.chunk_bodies(chunk)?;
            let js = match chunk.kind {
                ChunkKind::Runtime => format!("{}{}", link::PRELUDE, self.loader_source()),
                ChunkKind::Entry => self.entry_script(chunk, &modules),
                ChunkKind::Split | ChunkKind::Async if modules.is_empty() => String::new(),
                ChunkKind::Split | ChunkKind::Async => format!("{}{modules}", link::PRELUDE),
            };
            let files = self.write_chunk(chunk, js, css);
            for &id in &chunk.modules {
                let target = match self.route(id) {
                    Some(route) if is_extracted(route) => files.css.clone(),
                    Some(route) if route.chain.terminal != Terminal::Template => files.js.clone(),
                    _ => None,
                };
                if let Some(path) = target {
                    let rel = self.rel(id);
                    let entry = self.manifest.files.entry(rel).or_default();
                    if !entry.contains(&path) {
                        entry.push(path);
                    }
                }
            }
            self.manifest.chunks.insert(chunk.name.clone(), files);
        }
        Ok(())
    }

    /// Prelude, the loader when no runtime chunk carries it, the modules,
    /// then the call that starts the entry module.
    fn entry_script(&self, chunk: &Chunk, modules: &str) -> String {
        let plan = &self.assembly.plan;
        let mut js = link::PRELUDE.to_string();
        let has_runtime = plan.entries.get(&chunk.name).is_some_and(|loads| {
            loads
                .iter()
                .any(|name| plan.chunks.get(name).is_some_and(|c| c.kind == ChunkKind::Runtime))
        });
        if !has_runtime {
            js.push_str(&self.loader_source());
        }
        js.push_str(modules);
        if let Some(&entry) = self.assembly.graph.entries().get(&chunk.name) {
            js.push_str(&link::bootstrap(&self.rel(entry)));
        }
        js
    }

    /// Module factories and extracted-style text of one chunk.
    fn chunk_bodies(&self, chunk: &Chunk) -> Result<(String, String), BuildError> {
        let banners = !self.assembly.mode.is_production();
        let mut js = String::new();
        let mut css = String::new();

        for &id in &chunk.modules {
            let Some(route) = self.route(id) else { continue };
            let key = self.rel(id);
            let banner = banners.then_some(key.as_str());
            let factory = match route.chain.terminal {
                Terminal::Template => continue,
                Terminal::Emit => match self.assets.url(id) {
                    Some(url) => link::asset_module(&key, url),
                    None => continue,
                },
                Terminal::Module => {
                    let Some(bytes) = self.outputs.get(&id) else { continue };
                    let text = String::from_utf8_lossy(bytes);
                    if is_extracted(route) {
                        push_source(&mut css, banner, &text);
                        link::empty_module(&key)
                    } else {
                        self.link(id, &key, &text)?
                    }
                }
            };
            push_source(&mut js, banner, &factory);
        }
        Ok((js, css))
    }

    fn link(&self, id: ModuleId, key: &str, code: &str) -> Result<String, BuildError> {
        let node = self.assembly.graph.module(id);
        link::link_module(&node.path, key, code, |specifier| {
            node.specifiers.get(specifier).map(|&target| self.rel(target))
        })
        .map_err(|message| BuildError::Link(node.path.clone(), message))
    }

    fn write_chunk(&mut self, chunk: &Chunk, js: String, css: String) -> ChunkFiles {
        let mut files = ChunkFiles {
            kind: chunk.kind,
            js: None,
            css: None,
        };
        // An entry always gets a script so the page has something to load
        if !js.is_empty() || chunk.kind == ChunkKind::Entry {
            let path = chunk.script_rule.render(&chunk.name, "js", js.as_bytes());
            self.set.insert(path.clone(), js.into_bytes());
            files.js = Some(path);
        }
        if !css.is_empty() {
            let path = chunk.style_rule.render(&chunk.name, "css", css.as_bytes());
            self.set.insert(path.clone(), css.into_bytes());
            files.css = Some(path);
        }
        files
    }

    /// Loader that fetches async chunks by name or by module key.
    fn loader_source(&self) -> String {
        let plan = &self.assembly.plan;
        let namer = &self.assembly.namer;

        let mut chunks = serde_json::Map::new();
        for (name, loads) in &plan.async_loads {
            let files = self.load_files(loads);
            let urls = |paths: &[String]| -> Vec<String> { paths.iter().map(|p| namer.url(p)).collect() };
            chunks.insert(
                name.clone(),
                serde_json::json!({ "js": urls(&files.js), "css": urls(&files.css) }),
            );
        }

        let mut targets = serde_json::Map::new();
        for (&id, name) in &plan.async_targets {
            targets.insert(self.rel(id), serde_json::Value::String(name.clone()));
        }

        LOADER_TEMPLATE
            .replace("__CHUNKS__", &serde_json::Value::Object(chunks).to_string())
            .replace("__TARGETS__", &serde_json::Value::Object(targets).to_string())
    }

    /// Output files of a load list, in load order.
    fn load_files(&self, loads: &[String]) -> FileSet {
        let mut set = FileSet::default();
        for files in loads.iter().filter_map(|name| self.manifest.chunks.get(name)) {
            set.js.extend(files.js.clone());
            set.css.extend(files.css.clone());
        }
        set
    }

    fn emit_entrypoints(&mut self) {
        let assembly = self.assembly;
        for (name, loads) in &assembly.plan.entries {
            let files = self.load_files(loads);
            self.manifest.entrypoints.insert(name.clone(), files);
        }
    }

    /// One page referencing every entry point.
    fn emit_html(&mut self) -> Result<(), BuildError> {
        let template_path = &self.config.build.template;
        let html = if template_path.is_file() {
            fs::read_to_string(template_path)
                .map_err(|e| BuildError::Read(template_path.clone(), e))?
        } else {
            debug!("emit"; "no template at {}, using the built-in page", template_path.display());
            template::DEFAULT_TEMPLATE.to_string()
        };

        let namer = &self.assembly.namer;
        let mut injection = Injection::default();
        for files in self.manifest.entrypoints.values() {
            for url in files.css.iter().map(|p| namer.url(p)) {
                push_unique(&mut injection.styles, url);
            }
            for url in files.js.iter().map(|p| namer.url(p)) {
                push_unique(&mut injection.scripts, url);
            }
        }
        if self.assembly.mode.is_production() {
            injection.preloads = injection.scripts.clone();
        }

        let page = namer.rule_for(AssetKind::HtmlTemplate, self.assembly.mode).template;
        self.set.insert(page, template::inject(&html, &injection).into_bytes());
        Ok(())
    }

    /// Static files from the public directory, except the template.
    fn copy_public(&mut self) -> Result<(), BuildError> {
        let build = &self.config.build;
        let excluded = [build.output.as_path()];
        for file in scan::collect_files(&build.public, &excluded) {
            if file == build.template {
                continue;
            }
            let rel = rel_slash(&file, &build.public);
            if self.set.contains(&rel) {
                log!("warning"; "public/{} collides with build output, skipped", rel);
                continue;
            }
            let bytes = fs::read(&file).map_err(|e| BuildError::Read(file.clone(), e))?;
            self.set.insert(rel, bytes);
        }
        Ok(())
    }
}

/// Styles that leave the script and go to the chunk stylesheet.
fn is_extracted(route: &Route) -> bool {
    route
        .chain
        .stages
        .first()
        .is_some_and(|s| s.name == StageName::StyleExtract)
}

fn push_source(buf: &mut String, banner: Option<&str>, text: &str) {
    if let Some(banner) = banner {
        buf.push_str(&format!("/* {banner} */\n"));
    }
    buf.push_str(text);
    if !buf.ends_with('\n') {
        buf.push('\n');
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Output path of a manifest entry as a file system path.
pub fn output_path(root: &Path, rel: &str) -> std::path::PathBuf {
    rel.split('/').fold(root.to_path_buf(), |path, part| path.join(part))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::assemble;
    use crate::config::PackConfig;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(
            root,
            "src/main.js",
            b"import './app.css';\nimport icon from './icon.png';\nexport const page = () => import('./about');\n",
        );
        write(root, "src/about.js", b"export default 'about';\n");
        write(root, "src/app.css", b".a { color: red }\n");
        write(root, "src/icon.png", &[0u8; 64]);
        write(root, "public/robots.txt", b"User-agent: *\n");
        dir
    }

    /// Stand-in for the transform phase: scripts and extracted styles pass
    /// through, injected styles become a one-line script.
    fn passthrough(assembly: &Assembly) -> FxHashMap<ModuleId, Vec<u8>> {
        let mut outputs = FxHashMap::default();
        for (id, node) in assembly.graph.modules().iter().enumerate() {
            let route = assembly.table.get(&node.path).unwrap();
            if route.chain.terminal != Terminal::Module {
                continue;
            }
            let source = fs::read_to_string(&node.path).unwrap();
            let output = if route.kind.is_style() && !is_extracted(route) {
                format!("document.head.append({source:?});\n")
            } else {
                source
            };
            outputs.insert(id, output.into_bytes());
        }
        outputs
    }

    fn run(mode: BuildMode) -> (TempDir, OutputSet, Manifest) {
        let dir = project();
        let config = PackConfig::from_str_at("", dir.path()).unwrap();
        let assembly = assemble(&config, mode).unwrap();
        let assets = emit_assets(&config, &assembly).unwrap();
        let outputs = passthrough(&assembly);
        let (set, manifest) = emit(&config, &assembly, assets, &outputs).unwrap();
        (dir, set, manifest)
    }

    fn text(set: &OutputSet, path: &str) -> String {
        String::from_utf8(set.get(path).unwrap().to_vec()).unwrap()
    }

    #[test]
    fn test_development_output() {
        let (_dir, set, manifest) = run(BuildMode::Development);

        let main = text(&set, "static/js/main.js");
        assert!(main.contains("/* src/main.js */"));
        assert!(main.contains("/* src/app.css */"));
        // 64 bytes is under the inline limit
        assert!(main.contains("__rp_exports.default = \"data:image/png;base64,"));
        assert!(main.starts_with(link::PRELUDE));
        assert!(main.ends_with("self.__routepack__.require(\"src/main.js\");\n"));
        assert_eq!(manifest.inlined, vec!["src/icon.png".to_string()]);

        assert!(set.contains("static/js/about.chunk.js"));
        assert!(set.contains("static/js/runtime~main.js"));
        assert!(!set.contains("robots.txt"));

        assert_eq!(
            manifest.entrypoints["main"].js,
            vec!["static/js/runtime~main.js".to_string(), "static/js/main.js".to_string()]
        );
        let html = text(&set, "index.html");
        assert!(html.contains("<script defer src=\"/static/js/runtime~main.js\"></script>"));
        assert!(!html.contains("rel=\"preload\""));
    }

    #[test]
    fn test_production_output() {
        let (_dir, set, manifest) = run(BuildMode::Production);

        let entry = &manifest.entrypoints["main"];
        assert_eq!(entry.css.len(), 1);
        assert!(entry.css[0].starts_with("static/css/main."));
        let css = text(&set, &entry.css[0]);
        assert!(css.contains("color: red"));
        assert!(!css.contains("/*"));

        let main_js = entry.js.last().unwrap();
        assert!(main_js.starts_with("static/js/main.") && main_js.ends_with(".js"));
        assert!(!text(&set, main_js).contains(".a { color"));

        let html = text(&set, "index.html");
        assert!(html.contains("rel=\"preload\" as=\"script\""));
        assert!(html.contains("rel=\"stylesheet\""));
        assert_eq!(text(&set, "robots.txt"), "User-agent: *\n");

        let runtime = manifest.chunks["runtime~main"].js.clone().unwrap();
        let about = manifest.chunks["about"].js.clone().unwrap();
        let runtime_src = text(&set, &runtime);
        assert!(runtime_src.contains(&format!("/{about}")));
        assert!(runtime_src.contains("\"src/about.js\":\"about\""));
        assert!(runtime_src.contains("rp.fetch = function"));
        assert!(!text(&set, main_js).contains("rp.fetch = function"));
        assert!(text(&set, main_js).contains("__rp.load(\"src/about.js\")"));

        let recorded: serde_json::Value =
            serde_json::from_slice(set.get(MANIFEST).unwrap()).unwrap();
        assert_eq!(recorded["mode"], "production");
        assert_eq!(recorded["publicPath"], "/");
        assert_eq!(recorded["files"]["src/app.css"][0], entry.css[0].as_str());
    }

    #[test]
    fn test_every_script_chunk_parses() {
        for mode in [BuildMode::Development, BuildMode::Production] {
            let dir = project();
            write(
                dir.path(),
                "src/main.js",
                b"import './app.css';\nimport a from './a.png';\nimport b from './b.png';\nexport { a };\nexport default b;\nexport const page = () => import('./about');\n",
            );
            write(dir.path(), "src/a.png", &[1u8; 64]);
            write(dir.path(), "src/b.png", &[2u8; 64]);
            let config = PackConfig::from_str_at("", dir.path()).unwrap();
            let assembly = assemble(&config, mode).unwrap();
            let assets = emit_assets(&config, &assembly).unwrap();
            let outputs = passthrough(&assembly);
            let (set, manifest) = emit(&config, &assembly, assets, &outputs).unwrap();

            let scripts: Vec<&String> = manifest.chunks.values().filter_map(|c| c.js.as_ref()).collect();
            assert_eq!(scripts.len(), 3);
            for path in scripts {
                let source = text(&set, path);
                let facts = crate::engine::script::analyze(Path::new(path), &source)
                    .unwrap_or_else(|e| panic!("{path} does not parse in {mode}: {e}"));
                assert!(facts.imports.is_empty(), "{path} keeps module syntax");
            }
        }
    }

    #[test]
    fn test_entry_without_runtime_chunk_carries_loader() {
        let dir = project();
        let config = PackConfig::from_str_at("[split]\nruntime_chunk = false\n", dir.path()).unwrap();
        let assembly = assemble(&config, BuildMode::Production).unwrap();
        let assets = emit_assets(&config, &assembly).unwrap();
        let outputs = passthrough(&assembly);
        let (set, manifest) = emit(&config, &assembly, assets, &outputs).unwrap();

        assert!(!manifest.chunks.contains_key("runtime~main"));
        let main = text(&set, manifest.entrypoints["main"].js.last().unwrap());
        let loader = main.find("rp.fetch = function").unwrap();
        let start = main.find("self.__routepack__.require(\"src/main.js\")").unwrap();
        assert!(loader < start);
    }

    #[test]
    fn test_output_path() {
        let root = Path::new("/out");
        assert_eq!(output_path(root, "static/js/a.js"), root.join("static").join("js").join("a.js"));
    }
}
