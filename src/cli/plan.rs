//! `routepack plan`: print routes and chunks without transforming anything.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;

use crate::build::{self, Assembly};
use crate::config::PackConfig;
use crate::core::BuildMode;
use crate::log;
use crate::pipeline::{ChunkKind, ChunkRole, OutputRule, StageName, Terminal};
use crate::utils::plural_count;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanView<'a> {
    mode: BuildMode,
    routes: Vec<RouteView<'a>>,
    chunks: Vec<ChunkView<'a>>,
    entries: &'a BTreeMap<String, Vec<String>>,
    async_loads: &'a BTreeMap<String, Vec<String>>,
    externals: Vec<ExternalView<'a>>,
}

#[derive(Debug, Serialize)]
struct RouteView<'a> {
    path: String,
    kind: &'static str,
    /// Execution order, minimizers last.
    stages: Vec<StageName>,
    terminal: Terminal,
    output: &'a OutputRule,
    lint: bool,
}

#[derive(Debug, Serialize)]
struct ChunkView<'a> {
    name: &'a str,
    kind: ChunkKind,
    role: ChunkRole,
    modules: Vec<String>,
    script: &'a str,
    style: &'a str,
}

#[derive(Debug, Serialize)]
struct ExternalView<'a> {
    from: String,
    specifier: &'a str,
}

/// Assemble the build for `mode` and print it.
pub fn run_plan(config: &PackConfig, mode: BuildMode, json: bool) -> Result<()> {
    let assembly = build::assemble(config, mode)?;
    let view = view(config, &assembly);

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }
    for line in render(&view) {
        println!("{line}");
    }
    log!(
        "plan";
        "{}: {}, {}",
        mode,
        plural_count(view.routes.len(), "route"),
        plural_count(view.chunks.len(), "chunk")
    );
    Ok(())
}

fn view<'a>(config: &PackConfig, assembly: &'a Assembly) -> PlanView<'a> {
    let routes = assembly
        .table
        .iter()
        .map(|route| RouteView {
            path: config.root_relative(&route.path),
            kind: route.kind.name(),
            stages: route.stages().map(|s| s.name).collect(),
            terminal: route.chain.terminal,
            output: &route.output,
            lint: route.lint.is_some(),
        })
        .collect();

    let chunks = assembly
        .plan
        .chunks
        .values()
        .map(|chunk| ChunkView {
            name: &chunk.name,
            kind: chunk.kind,
            role: chunk.role,
            modules: chunk
                .modules
                .iter()
                .map(|&id| config.root_relative(&assembly.graph.module(id).path))
                .collect(),
            script: &chunk.script_rule.template,
            style: &chunk.style_rule.template,
        })
        .collect();

    let externals = assembly
        .externals
        .iter()
        .map(|(from, specifier)| ExternalView {
            from: config.root_relative(from),
            specifier,
        })
        .collect();

    PlanView {
        mode: assembly.mode,
        routes,
        chunks,
        entries: &assembly.plan.entries,
        async_loads: &assembly.plan.async_loads,
        externals,
    }
}

fn render(view: &PlanView<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    let width = view.routes.iter().map(|r| r.path.len()).max().unwrap_or(0);

    lines.push("routes:".to_string());
    for route in &view.routes {
        let stages = if route.stages.is_empty() {
            "(passthrough)".to_string()
        } else {
            route.stages.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" -> ")
        };
        let terminal = match route.terminal {
            Terminal::Module => "module",
            Terminal::Emit => "emit",
            Terminal::Template => "template",
        };
        let lint = if route.lint { " +lint" } else { "" };
        lines.push(format!(
            "  {:width$}  [{}] {} => {} {}{}",
            route.path, route.kind, stages, terminal, route.output.template, lint
        ));
    }

    lines.push("chunks:".to_string());
    for chunk in &view.chunks {
        let kind = match chunk.kind {
            ChunkKind::Entry => "entry",
            ChunkKind::Async => "async",
            ChunkKind::Split => "split",
            ChunkKind::Runtime => "runtime",
        };
        lines.push(format!("  {} ({kind}) {}", chunk.name, chunk.script));
        for module in &chunk.modules {
            lines.push(format!("    {module}"));
        }
    }

    lines.push("entries:".to_string());
    for (name, order) in view.entries {
        lines.push(format!("  {name}: {}", order.join(", ")));
    }
    for (name, order) in view.async_loads {
        lines.push(format!("  {name} (async): {}", order.join(", ")));
    }

    if !view.externals.is_empty() {
        lines.push("externals:".to_string());
        for external in &view.externals {
            lines.push(format!("  {} in {}", external.specifier, external.from));
        }
    }
    lines
}
