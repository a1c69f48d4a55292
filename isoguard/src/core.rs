//! Verification run orchestration shared by the CLI and library callers.
//! No global state: everything a unit needs travels in [`RunContext`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use rstar::RTree;

use crate::analysis::collector::plan_scopes;
use crate::analysis::creepage::bridge::{via_model, ViaBarrelModel};
use crate::analysis::creepage::policy::SolverPolicy;
use crate::analysis::{evaluate_unit, WorkUnit};
use crate::board::{BoardSnapshot, Feature, FeatureId, FeatureProvider};
use crate::compliance::{DomainMap, IsolationRequirement, RequirementResolver};
use crate::config::{ConfigError, IsolationConfig};
use crate::geometry::index::{slots_in, IndexedBox};
use crate::geometry::BBox;
use crate::report::{UnitResult, VerificationReport};

#[derive(Debug, thiserror::Error)]
pub enum IsoGuardError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Run cancelled after {completed} units")]
    Cancelled { completed: usize },
}

/// Cooperative cancellation flag, checked between units
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options for verification runs (CLI or library).
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Evaluate units on the rayon pool
    pub parallel: bool,
    pub cancel: Option<CancelToken>,
}

impl RunOptions {
    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

/// Read-only state shared by every unit of a run
pub struct RunContext<'a> {
    pub config: &'a IsolationConfig,
    pub board: &'a dyn FeatureProvider,
    pub domains: &'a DomainMap,
    pub policy: SolverPolicy,
    pub via_model: Box<dyn ViaBarrelModel>,
    features: HashMap<FeatureId, &'a Feature>,
    /// Per-layer R-tree, slots index `board.features()`
    layers: HashMap<String, RTree<IndexedBox>>,
}

impl<'a> RunContext<'a> {
    pub fn new(
        config: &'a IsolationConfig,
        board: &'a dyn FeatureProvider,
        domains: &'a DomainMap,
    ) -> Self {
        Self {
            config,
            board,
            domains,
            policy: SolverPolicy::from_config(&config.search),
            via_model: via_model(config.search.via_model),
            features: board.features().iter().map(|f| (f.id, f)).collect(),
            layers: index_layers(board),
        }
    }

    pub fn feature(&self, id: FeatureId) -> Option<&'a Feature> {
        self.features.get(&id).copied()
    }

    /// Features on `layer` whose bounding box touches `region`, in board order
    pub fn features_in(&self, layer: &str, region: &BBox) -> Vec<&'a Feature> {
        let features = self.board.features();
        self.layers
            .get(layer)
            .map(|tree| {
                slots_in(tree, region)
                    .into_iter()
                    .filter_map(|slot| features.get(slot))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn index_layers(board: &dyn FeatureProvider) -> HashMap<String, RTree<IndexedBox>> {
    let mut entries: HashMap<String, Vec<IndexedBox>> = HashMap::new();
    for (slot, feature) in board.features().iter().enumerate() {
        let Some(bbox) = feature.bbox() else { continue };
        let spanned = feature.via.iter().flat_map(|v| v.layers.iter());
        for layer in std::iter::once(&feature.layer).chain(spanned) {
            let list = entries.entry(layer.clone()).or_default();
            if list.last().map_or(true, |e| e.slot != slot) {
                list.push(IndexedBox::new(slot, bbox));
            }
        }
    }
    entries
        .into_iter()
        .map(|(layer, list)| (layer, RTree::bulk_load(list)))
        .collect()
}

/// Core verification API used by the CLI.
pub struct IsoGuardCore;

impl IsoGuardCore {
    /// Assign nets to voltage domains without measuring anything
    pub fn classify(
        board: &dyn FeatureProvider,
        config: &IsolationConfig,
    ) -> Result<DomainMap, IsoGuardError> {
        let domains = DomainMap::classify(config, board)?;
        let assigned: usize = domains
            .summary()
            .iter()
            .map(|d| d.nets_from_class.len() + d.nets_from_pattern.len())
            .sum();
        tracing::info!(
            "Classified {} nets into {} domains ({} degenerate features skipped)",
            assigned,
            domains.domains().len(),
            domains.degenerate_count()
        );
        Ok(domains)
    }

    /// Run every domain pair × layer check on a board.
    ///
    /// Configuration errors abort before any measurement. Everything else,
    /// including unreachable or skipped creepage, ends up in the report.
    pub fn verify(
        board: &dyn FeatureProvider,
        config: &IsolationConfig,
        options: RunOptions,
    ) -> Result<VerificationReport, IsoGuardError> {
        let started = Instant::now();
        let domains = Self::classify(board, config)?;
        let resolver = RequirementResolver::new(config)?;
        let ctx = RunContext::new(config, board, &domains);

        let mut requirements: Vec<IsolationRequirement> = Vec::new();
        let mut units: Vec<(WorkUnit, usize)> = Vec::new();
        for pair in domains.pairs() {
            let requirement =
                resolver.resolve(domains.domain(pair.0), domains.domain(pair.1));
            tracing::info!(
                "{} <-> {}: clearance {:.3} mm, creepage {:.3} mm ({})",
                requirement.domain_a,
                requirement.domain_b,
                requirement.clearance_mm,
                requirement.creepage_mm,
                requirement.description
            );
            for scope in plan_scopes(&ctx, pair) {
                units.push((
                    WorkUnit {
                        index: units.len(),
                        pair,
                        scope,
                    },
                    requirements.len(),
                ));
            }
            requirements.push(requirement);
        }
        tracing::info!(
            "Checking {} domain pairs in {} units",
            requirements.len(),
            units.len()
        );

        let results = if options.parallel {
            Self::run_parallel(&ctx, &units, &requirements, &options)?
        } else {
            Self::run_sequential(&ctx, &units, &requirements, &options)?
        };

        let mut report = VerificationReport::build(
            config.standard,
            config.selection(),
            domains.summary(),
            requirements,
            results,
            domains.degenerate_count(),
        );
        report.stats.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "Verification finished: {} violations, {} inconclusive, {} units skipped",
            report.stats.violations,
            report.stats.inconclusive,
            report.stats.units_skipped
        );
        Ok(report)
    }

    fn run_sequential(
        ctx: &RunContext<'_>,
        units: &[(WorkUnit, usize)],
        requirements: &[IsolationRequirement],
        options: &RunOptions,
    ) -> Result<Vec<UnitResult>, IsoGuardError> {
        let mut results = Vec::with_capacity(units.len());
        for (unit, req) in units {
            if options.cancelled() {
                return Err(IsoGuardError::Cancelled {
                    completed: results.len(),
                });
            }
            results.push(evaluate_unit(ctx, unit, &requirements[*req]));
        }
        Ok(results)
    }

    fn run_parallel(
        ctx: &RunContext<'_>,
        units: &[(WorkUnit, usize)],
        requirements: &[IsolationRequirement],
        options: &RunOptions,
    ) -> Result<Vec<UnitResult>, IsoGuardError> {
        let results: Vec<Option<UnitResult>> = units
            .par_iter()
            .map(|(unit, req)| {
                (!options.cancelled()).then(|| evaluate_unit(ctx, unit, &requirements[*req]))
            })
            .collect();
        let completed = results.iter().filter(|r| r.is_some()).count();
        if completed < units.len() {
            return Err(IsoGuardError::Cancelled { completed });
        }
        let mut results: Vec<UnitResult> = results.into_iter().flatten().collect();
        results.sort_by_key(|r| r.index);
        Ok(results)
    }

    /// Load a board snapshot and rules file from JSON and verify
    pub fn load_and_verify(
        board: &Path,
        rules: &Path,
        options: RunOptions,
    ) -> Result<VerificationReport, IsoGuardError> {
        let board = BoardSnapshot::load(board)?;
        let config = IsolationConfig::load(rules)?;
        Self::verify(&board, &config, options)
    }
}
