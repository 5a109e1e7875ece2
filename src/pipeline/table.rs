//! Routing table: one route per discovered asset.
//!
//! Assembled before any work is dispatched, so an unroutable asset fails
//! the build at startup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::ConfigError;
use crate::core::{AssetKind, BuildMode};
use crate::pipeline::compose::{ChainComposer, TransformChain};
use crate::pipeline::naming::{OutputNamer, OutputRule};
use crate::pipeline::stage::{StageName, TransformStage};

/// Everything the executor needs to process one asset.
#[derive(Debug, Clone, Serialize)]
pub struct Route {
    pub path: PathBuf,
    pub kind: AssetKind,
    pub chain: TransformChain,
    pub minimizers: Vec<TransformStage>,
    pub lint: Option<TransformStage>,
    pub output: OutputRule,
}

impl Route {
    /// Chain stages in execution order, then minimizers.
    pub fn stages(&self) -> impl Iterator<Item = &TransformStage> {
        self.chain.execution_order().chain(self.minimizers.iter())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RoutingTable {
    routes: BTreeMap<PathBuf, Route>,
}

impl RoutingTable {
    /// Route every asset. Fails on the first asset no rule handles.
    pub fn assemble(
        assets: &[PathBuf],
        mode: BuildMode,
        composer: &ChainComposer,
        namer: &OutputNamer,
    ) -> Result<Self, ConfigError> {
        let mut routes = BTreeMap::new();
        for path in assets {
            let kind = AssetKind::classify(path);
            let chain = composer
                .compose(kind, mode)
                .map_err(|source| ConfigError::Route {
                    path: path.clone(),
                    source: Box::new(source),
                })?;
            let route = Route {
                path: path.clone(),
                kind,
                chain,
                minimizers: composer.minimizers(kind, mode),
                lint: composer.lint_stage(kind),
                output: namer.rule_for(kind, mode),
            };
            routes.insert(path.clone(), route);
        }
        Ok(Self { routes })
    }

    pub fn get(&self, path: &Path) -> Option<&Route> {
        self.routes.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Distinct stages used by the given routes, with one representative each.
    pub fn required_stages<'a>(
        routes: impl IntoIterator<Item = &'a Route>,
    ) -> BTreeMap<StageName, &'a TransformStage> {
        let mut stages = BTreeMap::new();
        for route in routes {
            for stage in route.stages().chain(route.lint.iter()) {
                stages.entry(stage.name).or_insert(stage);
            }
        }
        stages
    }
}
