//! Verification results
//!
//! Every measurement carries its confidence state so a skipped or
//! inconclusive check can never be read as a pass.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::analysis::{Distance, LayerScope, SolverKind, WorkUnit};
use crate::compliance::{DistanceKind, DomainSummary, IsolationRequirement};
use crate::config::Standard;
use crate::geometry::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Inconclusive,
    Fail,
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckStatus::Pass => f.write_str("PASS"),
            CheckStatus::Inconclusive => f.write_str("INCONCLUSIVE"),
            CheckStatus::Fail => f.write_str("FAIL"),
        }
    }
}

/// One distance compared with its requirement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub kind: DistanceKind,
    pub actual: Distance,
    pub required: f64,
    pub status: CheckStatus,
    pub from: Point,
    pub to: Point,
    /// Waypoints of the measured path, empty when nothing was measured
    pub path: Vec<Point>,
    /// Where a drawing collaborator should place the marker
    pub marker: Point,
}

/// Result of one (domain pair × layer scope) unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitResult {
    pub index: usize,
    pub domain_a: String,
    pub domain_b: String,
    pub scope: LayerScope,
    pub obstacle_count: usize,
    /// Obstacle ceiling exceeded, creepage not computed
    pub skipped: bool,
    pub algorithm: Option<SolverKind>,
    pub iterations: usize,
    pub clearance: Option<Measurement>,
    pub creepage: Option<Measurement>,
}

impl UnitResult {
    pub fn empty(unit: &WorkUnit, names: (String, String)) -> Self {
        Self {
            index: unit.index,
            domain_a: names.0,
            domain_b: names.1,
            scope: unit.scope.clone(),
            obstacle_count: 0,
            skipped: false,
            algorithm: None,
            iterations: 0,
            clearance: None,
            creepage: None,
        }
    }

    pub fn measurements(&self) -> impl Iterator<Item = &Measurement> {
        self.clearance.iter().chain(self.creepage.iter())
    }

    /// Worst status of the unit's measurements
    pub fn status(&self) -> CheckStatus {
        self.measurements()
            .map(|m| m.status)
            .max()
            .unwrap_or(CheckStatus::Pass)
    }
}

/// Aggregate over every scope of a domain pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairResult {
    pub domain_a: String,
    pub domain_b: String,
    pub requirement: IsolationRequirement,
    pub clearance: Option<Distance>,
    pub creepage: Option<Distance>,
    /// Worst status over all units, not the status of the two distances
    pub status: CheckStatus,
    /// Indices into [`VerificationReport::units`]
    pub units: Vec<usize>,
}

/// A shortfall, or a check that could not be completed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub id: Uuid,
    pub domain_a: String,
    pub domain_b: String,
    pub kind: DistanceKind,
    pub scope: LayerScope,
    pub actual: Distance,
    pub required: f64,
    pub status: CheckStatus,
    /// Could not be measured reliably, as opposed to measured and failed
    pub inconclusive: bool,
    pub location: Point,
    pub from: Point,
    pub to: Point,
    pub path: Vec<Point>,
    pub message: String,
}

impl Violation {
    fn from_measurement(unit: &UnitResult, m: &Measurement) -> Self {
        let subject = format!("{} <-> {} on {}", unit.domain_a, unit.domain_b, unit.scope);
        let message = match m.actual {
            Distance::Measured(v) => format!(
                "{} {:.3} mm < required {:.3} mm ({})",
                capitalize(m.kind),
                v,
                m.required,
                subject
            ),
            Distance::Infinite => format!(
                "{} path broken by a board cutout or edge ({})",
                capitalize(m.kind),
                subject
            ),
            Distance::Inconclusive(reason) => format!(
                "{} could not be verified: {:?} ({})",
                capitalize(m.kind),
                reason,
                subject
            ),
        };
        Self {
            id: Uuid::new_v4(),
            domain_a: unit.domain_a.clone(),
            domain_b: unit.domain_b.clone(),
            kind: m.kind,
            scope: unit.scope.clone(),
            actual: m.actual,
            required: m.required,
            status: m.status,
            inconclusive: m.status == CheckStatus::Inconclusive,
            location: m.marker,
            from: m.from,
            to: m.to,
            path: m.path.clone(),
            message,
        }
    }
}

fn capitalize(kind: DistanceKind) -> &'static str {
    match kind {
        DistanceKind::Clearance => "Clearance",
        DistanceKind::Creepage => "Creepage",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub domains: usize,
    pub pairs_checked: usize,
    pub units_evaluated: usize,
    pub units_skipped: usize,
    pub violations: usize,
    pub inconclusive: usize,
    pub degenerate_features: usize,
    pub duration_ms: u64,
}

/// Full outcome of a verification run
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub generated_at: DateTime<Utc>,
    pub standard: Standard,
    pub selection: String,
    pub domains: Vec<DomainSummary>,
    pub pairs: Vec<PairResult>,
    pub units: Vec<UnitResult>,
    pub violations: Vec<Violation>,
    pub stats: RunStats,
}

impl VerificationReport {
    /// Assemble pair aggregates and violations from unit results
    pub fn build(
        standard: Standard,
        selection: String,
        domains: Vec<DomainSummary>,
        requirements: Vec<IsolationRequirement>,
        mut units: Vec<UnitResult>,
        degenerate_features: usize,
    ) -> Self {
        units.sort_by_key(|u| u.index);

        let pairs: Vec<PairResult> = requirements
            .into_iter()
            .map(|requirement| {
                let members: Vec<&UnitResult> = units
                    .iter()
                    .filter(|u| u.domain_a == requirement.domain_a && u.domain_b == requirement.domain_b)
                    .collect();
                let fold = |pick: fn(&UnitResult) -> Option<&Measurement>| {
                    members
                        .iter()
                        .filter_map(|u| pick(u))
                        .map(|m| m.actual)
                        .reduce(Distance::min)
                };
                let clearance = fold(|u| u.clearance.as_ref());
                let creepage = fold(|u| u.creepage.as_ref());
                // A pair passes only when every layer scope passed
                let status = members
                    .iter()
                    .map(|u| u.status())
                    .max()
                    .unwrap_or(CheckStatus::Pass);
                PairResult {
                    domain_a: requirement.domain_a.clone(),
                    domain_b: requirement.domain_b.clone(),
                    units: members.iter().map(|u| u.index).collect(),
                    requirement,
                    clearance,
                    creepage,
                    status,
                }
            })
            .collect();

        let violations: Vec<Violation> = units
            .iter()
            .flat_map(|u| {
                u.measurements()
                    .filter(|m| m.status != CheckStatus::Pass)
                    .map(move |m| Violation::from_measurement(u, m))
            })
            .collect();

        let stats = RunStats {
            domains: domains.len(),
            pairs_checked: pairs.len(),
            units_evaluated: units.len(),
            units_skipped: units.iter().filter(|u| u.skipped).count(),
            violations: violations.iter().filter(|v| !v.inconclusive).count(),
            inconclusive: violations.iter().filter(|v| v.inconclusive).count(),
            degenerate_features,
            duration_ms: 0,
        };

        Self {
            generated_at: Utc::now(),
            standard,
            selection,
            domains,
            pairs,
            units,
            violations,
            stats,
        }
    }

    /// No measured failures and nothing left unverified
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| !v.inconclusive)
    }

    pub fn inconclusive(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.inconclusive)
    }

    pub fn pair(&self, a: &str, b: &str) -> Option<&PairResult> {
        self.pairs
            .iter()
            .find(|p| (p.domain_a == a && p.domain_b == b) || (p.domain_a == b && p.domain_b == a))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
