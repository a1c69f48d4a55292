//! Geometric measurement of domain pairs
//!
//! Work is split into units of (domain pair × layer scope). Each unit
//! collects its own features and obstacles, measures clearance and
//! creepage, and compares them with the pair's requirement. Units share
//! nothing mutable and can run in any order.

pub mod clearance;
pub mod collector;
pub mod creepage;

use serde::Serialize;

use crate::compliance::{DistanceKind, DomainId, IsolationRequirement};
use crate::core::RunContext;
use crate::geometry::Point;
use crate::report::{CheckStatus, Measurement, UnitResult};

pub use collector::{Collection, LayerScope};
pub use creepage::{SearchLimit, SolverKind};

/// Why a distance could not be established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InconclusiveReason {
    /// Too many obstacles in the search region, layer skipped
    ObstacleCeiling,
    /// Every search hit its iteration cap
    IterationCap,
    /// Every search stopped making progress
    Stalled,
    /// No obstacle-free route exists inside the search region
    NoPath,
}

impl From<SearchLimit> for InconclusiveReason {
    fn from(limit: SearchLimit) -> Self {
        match limit {
            SearchLimit::IterationCap => InconclusiveReason::IterationCap,
            SearchLimit::Stalled => InconclusiveReason::Stalled,
            SearchLimit::Unreachable => InconclusiveReason::NoPath,
        }
    }
}

/// A measured distance, or why there is none
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Distance {
    Measured(f64),
    /// The surface path is broken by a cutout or the board edge
    Infinite,
    Inconclusive(InconclusiveReason),
}

impl Distance {
    pub fn value(&self) -> Option<f64> {
        match self {
            Distance::Measured(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, Distance::Infinite)
    }

    /// Combine two results for the same pair: smallest measurement, then
    /// infinite, then inconclusive
    pub fn min(self, other: Distance) -> Distance {
        match (self, other) {
            (Distance::Measured(a), Distance::Measured(b)) => Distance::Measured(a.min(b)),
            (Distance::Measured(a), _) | (_, Distance::Measured(a)) => Distance::Measured(a),
            (Distance::Infinite, _) | (_, Distance::Infinite) => Distance::Infinite,
            (Distance::Inconclusive(r), _) => Distance::Inconclusive(r),
        }
    }

    /// Compare against a required minimum
    pub fn status(&self, required: f64) -> CheckStatus {
        match self {
            Distance::Measured(v) if *v + crate::geometry::BOUNDARY_TOLERANCE >= required => {
                CheckStatus::Pass
            }
            Distance::Measured(_) | Distance::Infinite => CheckStatus::Fail,
            Distance::Inconclusive(_) => CheckStatus::Inconclusive,
        }
    }
}

impl std::fmt::Display for Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Distance::Measured(v) => write!(f, "{:.3} mm", v),
            Distance::Infinite => f.write_str("infinite"),
            Distance::Inconclusive(r) => write!(f, "inconclusive ({:?})", r),
        }
    }
}

/// One self-contained piece of work
#[derive(Debug, Clone, PartialEq)]
pub struct WorkUnit {
    pub index: usize,
    pub pair: (DomainId, DomainId),
    pub scope: LayerScope,
}

/// Measure one unit against its requirement
pub fn evaluate_unit(
    ctx: &RunContext<'_>,
    unit: &WorkUnit,
    requirement: &IsolationRequirement,
) -> UnitResult {
    let (a, b) = unit.pair;
    let names = (
        ctx.domains.domain(a).name.clone(),
        ctx.domains.domain(b).name.clone(),
    );

    let Some(collection) = collector::collect(ctx, unit.pair, &unit.scope) else {
        tracing::debug!(
            "{} <-> {} on {}: nothing to measure",
            names.0,
            names.1,
            unit.scope
        );
        return UnitResult::empty(unit, names);
    };

    let closest = &collection.closest;
    let clearance = collection.measures_clearance.then(|| {
        let actual = Distance::Measured(closest.distance);
        let required = requirement.required(DistanceKind::Clearance);
        Measurement {
            kind: DistanceKind::Clearance,
            actual,
            required,
            status: actual.status(required),
            from: closest.on_a,
            to: closest.on_b,
            path: vec![closest.on_a, closest.on_b],
            marker: closest.on_a.midpoint(closest.on_b),
        }
    });

    let creepage = if collection.measures_creepage {
        let required = requirement.required(DistanceKind::Creepage);
        let outcome = if collection.over_ceiling(ctx) {
            tracing::warn!(
                "{} <-> {} on {}: {} obstacles with {} corners exceeds ceiling {}/{}, layer skipped",
                names.0,
                names.1,
                unit.scope,
                collection.obstacle_count(),
                collection.vertex_count(),
                ctx.config.search.obstacle_ceiling,
                ctx.config.search.vertex_ceiling
            );
            creepage::CreepageOutcome::skipped(closest)
        } else {
            creepage::measure(ctx, &collection)
        };
        let marker = match outcome.path.len() {
            0 | 1 => closest.on_a.midpoint(closest.on_b),
            _ => polyline_midpoint(&outcome.path).unwrap_or(closest.on_a),
        };
        Some((
            Measurement {
                kind: DistanceKind::Creepage,
                actual: outcome.distance,
                required,
                status: outcome.distance.status(required),
                from: outcome.from,
                to: outcome.to,
                path: outcome.path.clone(),
                marker,
            },
            outcome,
        ))
    } else {
        None
    };

    let (creepage, algorithm, iterations) = match creepage {
        Some((m, outcome)) => (Some(m), outcome.algorithm, outcome.iterations),
        None => (None, None, 0),
    };

    tracing::debug!(
        "{} <-> {} on {}: {} obstacles, clearance {}, creepage {}",
        names.0,
        names.1,
        unit.scope,
        collection.obstacle_count(),
        clearance
            .as_ref()
            .map(|m| m.actual.to_string())
            .unwrap_or_else(|| "-".to_string()),
        creepage
            .as_ref()
            .map(|m| m.actual.to_string())
            .unwrap_or_else(|| "-".to_string())
    );

    UnitResult {
        index: unit.index,
        domain_a: names.0,
        domain_b: names.1,
        scope: unit.scope.clone(),
        obstacle_count: collection.obstacle_count(),
        skipped: collection.over_ceiling(ctx),
        algorithm,
        iterations,
        clearance,
        creepage,
    }
}

/// Midpoint of a polyline by length, used for marker placement
pub fn polyline_midpoint(path: &[Point]) -> Option<Point> {
    let total: f64 = path.windows(2).map(|w| w[0].distance(&w[1])).sum();
    let mut remaining = total / 2.0;
    for w in path.windows(2) {
        let len = w[0].distance(&w[1]);
        if len >= remaining && len > 0.0 {
            return Some(w[0].lerp(w[1], remaining / len));
        }
        remaining -= len;
    }
    path.first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_min_ordering() {
        let m = Distance::Measured(3.0);
        let inf = Distance::Infinite;
        let inc = Distance::Inconclusive(InconclusiveReason::ObstacleCeiling);
        assert_eq!(m.min(inf), m);
        assert_eq!(inf.min(inc), inf);
        assert_eq!(inc.min(inc), inc);
        assert_eq!(m.min(Distance::Measured(2.0)), Distance::Measured(2.0));
    }

    #[test]
    fn test_status_never_passes_unmeasured() {
        assert_eq!(Distance::Infinite.status(0.0), CheckStatus::Fail);
        assert_eq!(
            Distance::Inconclusive(InconclusiveReason::Stalled).status(0.0),
            CheckStatus::Inconclusive
        );
        assert_eq!(Distance::Measured(6.0).status(6.0), CheckStatus::Pass);
        assert_eq!(Distance::Measured(5.9).status(6.0), CheckStatus::Fail);
    }

    #[test]
    fn test_polyline_midpoint() {
        let path = [Point::new(0.0, 0.0), Point::new(2.0, 0.0), Point::new(2.0, 2.0)];
        assert_eq!(polyline_midpoint(&path), Some(Point::new(2.0, 0.0)));
    }
}
