//! Transform dispatch.
//!
//! Each module runs its route's stages in execution order. Leading inline
//! stages run on the calling thread; from the first pooled stage on, the
//! rest of the chain runs as one worker job. Lint jobs run alongside.
//!
//! Stylesheets get their `url()` references rewritten to emitted asset URLs
//! right after the stage that produces plain CSS.
//!
//! A failing module never stops its siblings: every error is collected and
//! the caller decides what to publish.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rustc_hash::FxHashMap;

use crate::cache::TransformCache;
use crate::debug;
use crate::engine::{self, EngineRegistry, LintFinding, StageContext, TransformError, style};
use crate::logger::ProgressLine;
use crate::pipeline::{ModuleId, Route, StageOptions, TransformStage, WorkerPool};

/// Progress counter names.
pub const MODULES: &str = "modules";
pub const LINT: &str = "lint";

/// One module to transform. Owns its route and bytes.
#[derive(Debug, Clone)]
pub struct ModuleWork {
    pub id: ModuleId,
    pub path: PathBuf,
    /// Root-relative, for messages.
    pub rel: String,
    pub route: Route,
    pub source: Vec<u8>,
    /// Stylesheet `url()` value to the public URL of its asset.
    pub urls: BTreeMap<String, String>,
}

/// Everything the transform phase produced.
#[derive(Debug, Default)]
pub struct TransformOutcome {
    pub outputs: FxHashMap<ModuleId, Vec<u8>>,
    pub errors: Vec<TransformError>,
    pub findings: Vec<LintFinding>,
    pub cache_hits: usize,
}

enum JobResult {
    Module(ModuleId, Result<Vec<u8>, TransformError>),
    Lint(Vec<LintFinding>),
}

type Job<'a> = Box<dyn FnOnce() -> JobResult + Send + 'a>;

pub struct Executor<'a> {
    registry: &'a EngineRegistry,
    cache: &'a TransformCache,
    pool: &'a WorkerPool,
    hits: AtomicUsize,
}

impl<'a> Executor<'a> {
    pub fn new(
        registry: &'a EngineRegistry,
        cache: &'a TransformCache,
        pool: &'a WorkerPool,
    ) -> Self {
        Self {
            registry,
            cache,
            pool,
            hits: AtomicUsize::new(0),
        }
    }

    /// Number of lint jobs `work` will produce.
    pub fn lint_jobs(work: &[ModuleWork]) -> usize {
        work.iter().filter(|w| w.route.lint.is_some()).count()
    }

    /// Transform every module, blocking until all jobs have reported.
    pub fn run(&self, work: Vec<ModuleWork>, progress: Option<&ProgressLine>) -> TransformOutcome {
        let mut outcome = TransformOutcome::default();
        let mut jobs: Vec<Job<'_>> = Vec::new();

        for item in work {
            if let Some(lint) = &item.route.lint {
                jobs.push(self.lint_job(&item, lint.clone(), progress));
            }

            let stages: Vec<TransformStage> = item.route.stages().cloned().collect();
            let split = stages.iter().position(|s| s.parallel).unwrap_or(stages.len());
            let (inline, pooled) = stages.split_at(split);

            let bytes = match self.run_stages(inline, &item, item.source.clone()) {
                Ok(bytes) => bytes,
                Err(e) => {
                    outcome.errors.push(e);
                    inc(progress, MODULES);
                    continue;
                }
            };

            if pooled.is_empty() {
                outcome.outputs.insert(item.id, bytes);
                inc(progress, MODULES);
                continue;
            }

            let pooled = pooled.to_vec();
            jobs.push(Box::new(move || {
                let result = self.run_stages(&pooled, &item, bytes);
                inc(progress, MODULES);
                JobResult::Module(item.id, result)
            }));
        }

        for result in self.pool.run_all(jobs) {
            match result {
                JobResult::Module(id, Ok(bytes)) => {
                    outcome.outputs.insert(id, bytes);
                }
                JobResult::Module(_, Err(e)) => outcome.errors.push(e),
                JobResult::Lint(findings) => outcome.findings.extend(findings),
            }
        }

        outcome.errors.sort_by(|a, b| a.path.cmp(&b.path));
        outcome.findings.sort_by(|a, b| (&a.path, a.line).cmp(&(&b.path, b.line)));
        outcome.cache_hits = self.hits.load(Ordering::Relaxed);
        outcome
    }

    fn lint_job<'p>(
        &self,
        item: &ModuleWork,
        stage: TransformStage,
        progress: Option<&'p ProgressLine>,
    ) -> Job<'p> {
        let rel = item.rel.clone();
        let source = item.source.clone();
        Box::new(move || {
            let StageOptions::Lint { rules } = &stage.options else {
                return JobResult::Lint(Vec::new());
            };
            let findings = engine::lint::lint(Path::new(&rel), &source, rules).unwrap_or_else(|e| {
                // Parse failures surface through the transform chain
                debug!("lint"; "skipped {}: {}", rel, e);
                Vec::new()
            });
            inc(progress, LINT);
            JobResult::Lint(findings)
        })
    }

    fn run_stages(
        &self,
        stages: &[TransformStage],
        item: &ModuleWork,
        mut bytes: Vec<u8>,
    ) -> Result<Vec<u8>, TransformError> {
        let ctx = StageContext {
            path: &item.path,
            rel: &item.rel,
        };
        for stage in stages {
            bytes = self.run_stage(stage, &bytes, &ctx)?;
            if stage.name.is_style_compiler() && !item.urls.is_empty() {
                bytes = rewrite_urls(item, &bytes).map_err(|message| TransformError {
                    path: item.path.clone(),
                    stage: stage.name,
                    message,
                })?;
            }
        }
        Ok(bytes)
    }

    /// Run one stage, consulting the cache for cacheable stages.
    fn run_stage(
        &self,
        stage: &TransformStage,
        source: &[u8],
        ctx: &StageContext<'_>,
    ) -> Result<Vec<u8>, TransformError> {
        if !matches!(stage.options, StageOptions::ScriptCompat { cache: true }) {
            return self.registry.run(stage, source, ctx);
        }

        let key = TransformCache::key(stage, source);
        if let Some(hit) = self.cache.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }
        let output = self.registry.run(stage, source, ctx)?;
        self.cache.put(key, &output);
        Ok(output)
    }
}

fn rewrite_urls(item: &ModuleWork, css: &[u8]) -> Result<Vec<u8>, String> {
    let css = engine::as_text(css)?;
    style::rewrite_urls(css, &item.rel, |url| item.urls.get(url).cloned()).map(String::into_bytes)
}

fn inc(progress: Option<&ProgressLine>, name: &str) {
    if let Some(progress) = progress {
        progress.inc(name);
    }
}
