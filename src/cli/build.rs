//! `routepack build`.

use std::time::Instant;

use anyhow::Result;

use crate::build;
use crate::config::PackConfig;
use crate::core::BuildMode;
use crate::utils::plural_count;
use crate::{debug, log};

/// Build and publish, then print a summary.
pub fn run_build(config: &PackConfig, mode: BuildMode) -> Result<()> {
    log!("build"; "{} build of {}", mode, config.root.display());
    let started = Instant::now();

    let report = build::build(config, mode, false)?;

    for finding in &report.findings {
        log!("lint"; "{}", finding);
    }
    for (from, specifier) in &report.externals {
        debug!("resolve"; "`{}` in {} left external", specifier, config.root_relative(from));
    }
    if !report.externals.is_empty() {
        log!("warning"; "{} not bundled", plural_count(report.externals.len(), "bare import"));
    }

    log!(
        "build";
        "{} routed, {} in {}, {} written in {:.2?}",
        plural_count(report.assets, "asset"),
        plural_count(report.modules, "module"),
        plural_count(report.chunks, "chunk"),
        plural_count(report.files, "file"),
        started.elapsed()
    );
    for (name, files) in &report.manifest.entrypoints {
        let all: Vec<&str> = files.js.iter().chain(&files.css).map(String::as_str).collect();
        debug!("entry"; "{}: {}", name, all.join(", "));
    }
    if !report.manifest.inlined.is_empty() {
        debug!("emit"; "{} inlined", plural_count(report.manifest.inlined.len(), "asset"));
    }
    if report.cache_hits > 0 {
        debug!("cache"; "{}", plural_count(report.cache_hits, "hit"));
    }
    log!("build"; "{} done", report.mode);
    Ok(())
}
