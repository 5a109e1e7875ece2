//! Chunk planning.
//!
//! Partitions a resolved module graph into load units:
//!
//! 1. One initial unit per entry (static reachability from the entry module)
//!    and one async unit per dynamic-import target.
//! 2. Modules shared by `min_chunks` or more eligible units move into a
//!    single split chunk keyed by the set of units sharing them.
//!    `node_modules` modules go to `vendors~...` chunks instead.
//! 3. Each entry optionally gets a `runtime~<entry>` chunk for bootstrap code.
//!
//! Entry load order is runtime chunk, split chunks (sorted), entry chunk.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, PathBuf};

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::config::{SplitChunks, SplitConfig};
use crate::core::BuildMode;
use crate::pipeline::naming::{ChunkRole, OutputNamer, OutputRule};

/// Index into [`ModuleGraph::modules`].
pub type ModuleId = usize;

#[derive(Debug, Clone)]
pub struct ModuleNode {
    pub path: PathBuf,
    pub static_deps: Vec<ModuleId>,
    pub dynamic_deps: Vec<ModuleId>,
    /// Specifier as written in the source, to the module it resolved to.
    pub specifiers: BTreeMap<String, ModuleId>,
}

impl ModuleNode {
    /// Third-party modules, grouped into vendor chunks.
    pub fn is_vendor(&self) -> bool {
        self.path
            .components()
            .any(|c| matches!(c, Component::Normal(name) if name == "node_modules"))
    }
}

/// Resolved module graph, produced by the import scanner.
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    modules: Vec<ModuleNode>,
    index: FxHashMap<PathBuf, ModuleId>,
    entries: BTreeMap<String, ModuleId>,
}

impl ModuleGraph {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module, or return the existing id for the same path.
    pub fn add_module(&mut self, path: impl Into<PathBuf>) -> ModuleId {
        let path = path.into();
        if let Some(&id) = self.index.get(&path) {
            return id;
        }
        let id = self.modules.len();
        self.index.insert(path.clone(), id);
        self.modules.push(ModuleNode {
            path,
            static_deps: Vec::new(),
            dynamic_deps: Vec::new(),
            specifiers: BTreeMap::new(),
        });
        id
    }

    pub fn add_static(&mut self, from: ModuleId, to: ModuleId) {
        let deps = &mut self.modules[from].static_deps;
        if !deps.contains(&to) {
            deps.push(to);
        }
    }

    pub fn add_dynamic(&mut self, from: ModuleId, to: ModuleId) {
        let deps = &mut self.modules[from].dynamic_deps;
        if !deps.contains(&to) {
            deps.push(to);
        }
    }

    pub fn add_specifier(&mut self, from: ModuleId, specifier: impl Into<String>, to: ModuleId) {
        self.modules[from].specifiers.insert(specifier.into(), to);
    }

    pub fn add_entry(&mut self, name: impl Into<String>, module: ModuleId) {
        self.entries.insert(name.into(), module);
    }

    #[cfg(test)]
    pub fn id_of(&self, path: &std::path::Path) -> Option<ModuleId> {
        self.index.get(path).copied()
    }

    pub fn module(&self, id: ModuleId) -> &ModuleNode {
        &self.modules[id]
    }

    pub fn modules(&self) -> &[ModuleNode] {
        &self.modules
    }

    pub fn entries(&self) -> &BTreeMap<String, ModuleId> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Modules reachable from `root` over static edges, dependencies first.
    fn static_closure(&self, root: ModuleId) -> Vec<ModuleId> {
        let mut seen = vec![false; self.modules.len()];
        let mut order = Vec::new();
        // Iterative post-order DFS: (node, next child index)
        let mut stack = vec![(root, 0usize)];
        seen[root] = true;
        while let Some((node, child)) = stack.pop() {
            let deps = &self.modules[node].static_deps;
            if let Some(&next) = deps.get(child) {
                stack.push((node, child + 1));
                if !seen[next] {
                    seen[next] = true;
                    stack.push((next, 0));
                }
            } else {
                order.push(node);
            }
        }
        order
    }

    /// Every module reachable from an entry over any edge, with a stable
    /// dependencies-first rank used to order modules inside chunks.
    fn global_rank(&self) -> Vec<Option<usize>> {
        let mut rank = vec![None; self.modules.len()];
        let mut next = 0;
        let mut queue: Vec<ModuleId> = self.entries.values().copied().collect();
        let mut i = 0;
        while i < queue.len() {
            let root = queue[i];
            i += 1;
            for id in self.static_closure(root) {
                if rank[id].is_none() {
                    rank[id] = Some(next);
                    next += 1;
                }
                for &dynamic in &self.modules[id].dynamic_deps {
                    if !queue.contains(&dynamic) {
                        queue.push(dynamic);
                    }
                }
            }
        }
        rank
    }
}

/// Kind of a planned chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Entry,
    Async,
    Split,
    Runtime,
}

#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    pub name: String,
    pub kind: ChunkKind,
    pub role: ChunkRole,
    /// Modules in execution order.
    #[serde(skip)]
    pub modules: Vec<ModuleId>,
    pub script_rule: OutputRule,
    pub style_rule: OutputRule,
}

/// Result of [`ChunkPlanner::plan`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChunkPlan {
    pub chunks: BTreeMap<String, Chunk>,
    /// Per entry point, chunks to load in order.
    pub entries: BTreeMap<String, Vec<String>>,
    /// Per async chunk, chunks to load in order.
    pub async_loads: BTreeMap<String, Vec<String>>,
    /// Async chunk name for each dynamic-import target.
    #[serde(skip)]
    pub async_targets: BTreeMap<ModuleId, String>,
}

#[cfg(test)]
impl ChunkPlan {
    pub fn chunk(&self, name: &str) -> Option<&Chunk> {
        self.chunks.get(name)
    }

    /// Chunks that hold `module`.
    pub fn chunks_containing(&self, module: ModuleId) -> Vec<&str> {
        self.chunks
            .values()
            .filter(|c| c.modules.contains(&module))
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// A load unit before splitting.
struct Unit {
    name: String,
    /// Dynamic-import target, for async units.
    target: Option<ModuleId>,
    modules: BTreeSet<ModuleId>,
}

impl Unit {
    fn is_initial(&self) -> bool {
        self.target.is_none()
    }
}

pub struct ChunkPlanner {
    split: SplitConfig,
    namer: OutputNamer,
}

impl ChunkPlanner {
    pub fn new(split: &SplitConfig, namer: &OutputNamer) -> Self {
        Self {
            split: split.clone(),
            namer: namer.clone(),
        }
    }

    pub fn plan(&self, graph: &ModuleGraph, mode: BuildMode) -> ChunkPlan {
        let rank = graph.global_rank();
        let mut units = Self::load_units(graph, &rank);
        let mut plan = ChunkPlan::default();

        // Group split modules by chunk name
        let mut split_chunks: BTreeMap<String, (Vec<ModuleId>, BTreeSet<usize>)> = BTreeMap::new();
        for (module, (prefix, members)) in self.split_groups(graph, &units) {
            let name = std::iter::once(prefix)
                .chain(members.iter().map(|&u| units[u].name.as_str()))
                .collect::<Vec<_>>()
                .join("~");
            let group = split_chunks
                .entry(name)
                .or_insert_with(|| (Vec::new(), members.clone()));
            group.0.push(module);
            for &u in &members {
                units[u].modules.remove(&module);
            }
        }

        let mut loads: Vec<Vec<String>> = vec![Vec::new(); units.len()];
        for (name, (mut modules, members)) in split_chunks {
            sort_by_rank(&mut modules, &rank);
            let role = if members.iter().any(|&u| units[u].is_initial()) {
                ChunkRole::Initial
            } else {
                ChunkRole::Async
            };
            for &u in &members {
                loads[u].push(name.clone());
            }
            let chunk = self.chunk(name.clone(), ChunkKind::Split, role, modules, mode);
            plan.chunks.insert(name, chunk);
        }

        for (unit, mut order) in units.into_iter().zip(loads) {
            order.sort();
            let mut modules: Vec<_> = unit.modules.into_iter().collect();
            sort_by_rank(&mut modules, &rank);

            match unit.target {
                None => {
                    if self.split.runtime_chunk {
                        let runtime = format!("runtime~{}", unit.name);
                        order.insert(0, runtime.clone());
                        let chunk = self.chunk(
                            runtime.clone(),
                            ChunkKind::Runtime,
                            ChunkRole::Initial,
                            Vec::new(),
                            mode,
                        );
                        plan.chunks.insert(runtime, chunk);
                    }
                    order.push(unit.name.clone());
                    let chunk =
                        self.chunk(unit.name.clone(), ChunkKind::Entry, ChunkRole::Initial, modules, mode);
                    plan.chunks.insert(unit.name.clone(), chunk);
                    plan.entries.insert(unit.name, order);
                }
                Some(target) => {
                    // Everything moved to split chunks, nothing left to emit
                    if !modules.is_empty() {
                        order.push(unit.name.clone());
                        let chunk =
                            self.chunk(unit.name.clone(), ChunkKind::Async, ChunkRole::Async, modules, mode);
                        plan.chunks.insert(unit.name.clone(), chunk);
                    }
                    plan.async_targets.insert(target, unit.name.clone());
                    plan.async_loads.insert(unit.name, order);
                }
            }
        }

        plan
    }

    fn chunk(
        &self,
        name: String,
        kind: ChunkKind,
        role: ChunkRole,
        modules: Vec<ModuleId>,
        mode: BuildMode,
    ) -> Chunk {
        Chunk {
            name,
            kind,
            role,
            modules,
            script_rule: self.namer.chunk_rule(role, mode),
            style_rule: self.namer.stylesheet_rule(role, mode),
        }
    }

    /// Entry units (sorted by entry name), then async units in rank order.
    fn load_units(graph: &ModuleGraph, rank: &[Option<usize>]) -> Vec<Unit> {
        let mut used: BTreeSet<String> = BTreeSet::new();
        let mut units: Vec<Unit> = graph
            .entries
            .iter()
            .map(|(name, &root)| {
                used.insert(name.clone());
                Unit {
                    name: name.clone(),
                    target: None,
                    modules: graph.static_closure(root).into_iter().collect(),
                }
            })
            .collect();

        let mut targets: Vec<ModuleId> = graph
            .modules
            .iter()
            .enumerate()
            .filter(|(id, _)| rank[*id].is_some())
            .flat_map(|(_, node)| node.dynamic_deps.iter().copied())
            .collect();
        targets.sort_by_key(|&id| (rank[id], id));
        targets.dedup();

        for target in targets {
            let name = unique_name(async_name(graph, target), &mut used);
            units.push(Unit {
                name,
                target: Some(target),
                modules: graph.static_closure(target).into_iter().collect(),
            });
        }
        units
    }

    /// Split group (name prefix, member units) for each module that leaves its units.
    fn split_groups(
        &self,
        graph: &ModuleGraph,
        units: &[Unit],
    ) -> BTreeMap<ModuleId, (&'static str, BTreeSet<usize>)> {
        let eligible = |unit: &Unit| match self.split.chunks {
            SplitChunks::All => true,
            SplitChunks::Initial => unit.is_initial(),
            SplitChunks::Async => !unit.is_initial(),
        };

        let mut holders: BTreeMap<ModuleId, BTreeSet<usize>> = BTreeMap::new();
        for (index, unit) in units.iter().enumerate().filter(|(_, u)| eligible(u)) {
            for &module in &unit.modules {
                holders.entry(module).or_default().insert(index);
            }
        }

        holders
            .into_iter()
            .filter_map(|(module, members)| {
                if self.split.vendors && graph.modules[module].is_vendor() {
                    Some((module, ("vendors", members)))
                } else if members.len() >= self.split.min_chunks {
                    Some((module, ("shared", members)))
                } else {
                    None
                }
            })
            .collect()
    }
}

/// Async chunk name derived from the target's file stem.
fn async_name(graph: &ModuleGraph, target: ModuleId) -> String {
    let stem = graph.modules[target]
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() { format!("chunk{target}") } else { stem }
}

/// Append `-2`, `-3`, ... until `name` is unused.
fn unique_name(name: String, used: &mut BTreeSet<String>) -> String {
    let mut candidate = name.clone();
    let mut n = 2;
    while used.contains(&candidate) {
        candidate = format!("{name}-{n}");
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}

fn sort_by_rank(modules: &mut [ModuleId], rank: &[Option<usize>]) {
    modules.sort_by_key(|&id| (rank[id].unwrap_or(usize::MAX), id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn planner() -> ChunkPlanner {
        ChunkPlanner::new(&SplitConfig::default(), &OutputNamer::default())
    }

    /// a.js and b.js both import shared.js; a.js imports only-a.js.
    fn two_entries() -> (ModuleGraph, ModuleId) {
        let mut g = ModuleGraph::new();
        let a = g.add_module("/p/src/a.js");
        let b = g.add_module("/p/src/b.js");
        let shared = g.add_module("/p/src/shared.js");
        let only_a = g.add_module("/p/src/only-a.js");
        g.add_static(a, shared);
        g.add_static(a, only_a);
        g.add_static(b, shared);
        g.add_entry("main", a);
        g.add_entry("admin", b);
        (g, shared)
    }

    #[test]
    fn test_runtime_chunk_name() {
        let mut g = ModuleGraph::new();
        let main = g.add_module("/p/src/main.js");
        g.add_entry("main", main);
        let plan = planner().plan(&g, BuildMode::Production);

        assert_eq!(plan.entries["main"], vec!["runtime~main", "main"]);
        let runtime = plan.chunk("runtime~main").unwrap();
        assert_eq!(runtime.kind, ChunkKind::Runtime);
        assert!(runtime.modules.is_empty());
    }

    #[test]
    fn test_shared_module_in_exactly_one_chunk() {
        let (g, shared) = two_entries();
        let plan = planner().plan(&g, BuildMode::Production);

        assert_eq!(plan.chunks_containing(shared), vec!["shared~admin~main"]);
        let split = plan.chunk("shared~admin~main").unwrap();
        assert_eq!(split.kind, ChunkKind::Split);
        assert_eq!(split.role, ChunkRole::Initial);

        assert_eq!(
            plan.entries["main"],
            vec!["runtime~main", "shared~admin~main", "main"]
        );
        assert_eq!(
            plan.entries["admin"],
            vec!["runtime~admin", "shared~admin~main", "admin"]
        );
        // Entry module stays in its own chunk, dependencies first
        let main = plan.chunk("main").unwrap();
        assert_eq!(main.modules.last(), Some(&g.id_of(Path::new("/p/src/a.js")).unwrap()));
        assert_eq!(main.modules.len(), 2);
    }

    #[test]
    fn test_min_chunks_threshold() {
        let (g, shared) = two_entries();
        let split = SplitConfig {
            min_chunks: 3,
            ..SplitConfig::default()
        };
        let plan = ChunkPlanner::new(&split, &OutputNamer::default()).plan(&g, BuildMode::Production);
        assert_eq!(plan.chunks_containing(shared), vec!["admin", "main"]);
    }

    #[test]
    fn test_async_unit_and_policy() {
        let mut g = ModuleGraph::new();
        let main = g.add_module("/p/src/main.js");
        let page = g.add_module("/p/src/pages/about.js");
        let util = g.add_module("/p/src/util.js");
        g.add_static(main, util);
        g.add_dynamic(main, page);
        g.add_static(page, util);
        g.add_entry("main", main);

        let plan = planner().plan(&g, BuildMode::Production);
        assert_eq!(plan.async_targets[&page], "about");
        assert_eq!(plan.chunks_containing(util), vec!["shared~main~about"]);
        assert_eq!(plan.async_loads["about"], vec!["shared~main~about", "about"]);
        let about = plan.chunk("about").unwrap();
        assert_eq!(about.role, ChunkRole::Async);
        assert_eq!(about.script_rule.template, "static/js/[name].[contenthash:10].chunk.js");

        // Initial-only splitting leaves the async copy in place
        let split = SplitConfig {
            chunks: SplitChunks::Initial,
            ..SplitConfig::default()
        };
        let plan = ChunkPlanner::new(&split, &OutputNamer::default()).plan(&g, BuildMode::Production);
        assert_eq!(plan.chunks_containing(util), vec!["about", "main"]);
    }

    #[test]
    fn test_vendor_group() {
        let mut g = ModuleGraph::new();
        let main = g.add_module("/p/src/main.js");
        let lib = g.add_module("/p/node_modules/lib/index.js");
        g.add_static(main, lib);
        g.add_entry("main", main);

        let plan = planner().plan(&g, BuildMode::Development);
        assert_eq!(plan.chunks_containing(lib), vec!["vendors~main"]);
        assert_eq!(plan.entries["main"], vec!["runtime~main", "vendors~main", "main"]);
        assert_eq!(
            plan.chunk("vendors~main").unwrap().script_rule.template,
            "static/js/[name].js"
        );
    }

    #[test]
    fn test_runtime_chunk_disabled() {
        let (g, _) = two_entries();
        let split = SplitConfig {
            runtime_chunk: false,
            ..SplitConfig::default()
        };
        let plan = ChunkPlanner::new(&split, &OutputNamer::default()).plan(&g, BuildMode::Production);
        assert!(plan.chunk("runtime~main").is_none());
        assert_eq!(plan.entries["main"], vec!["shared~admin~main", "main"]);
    }

    #[test]
    fn test_async_name_collision() {
        let mut g = ModuleGraph::new();
        let main = g.add_module("/p/src/main.js");
        let a = g.add_module("/p/src/a/page.js");
        let b = g.add_module("/p/src/b/page.js");
        g.add_dynamic(main, a);
        g.add_dynamic(main, b);
        g.add_entry("main", main);

        let plan = planner().plan(&g, BuildMode::Production);
        assert_eq!(plan.async_targets[&a], "page");
        assert_eq!(plan.async_targets[&b], "page-2");
    }
}
