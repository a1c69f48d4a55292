//! Creepage: shortest surface path between two domains
//!
//! Paths avoid the interiors of obstacle polygons and never pass through a
//! cutout or off the board. A straight line between endpoints that crosses
//! a cutout or the board edge makes the creepage infinite for that pair.
//!
//! Two interchangeable [`PathSolver`]s exist: an exact visibility graph
//! searched with Dijkstra, and a bounded A* over the k nearest obstacle
//! corners. [`SolverPolicy`] picks one by obstacle and corner count.

pub mod astar;
pub mod bridge;
pub mod policy;
pub mod visibility;

use std::cmp::Ordering;

use serde::Serialize;

use super::clearance::{candidate_pairs, ClosestPair};
use super::collector::Collection;
use super::{Distance, InconclusiveReason};
use crate::board::{Feature, FeatureId};
use crate::core::RunContext;
use crate::geometry::{
    segment_crosses_interior, segment_leaves_polygon, shape_distance, BBox, ObstacleField, Point,
};

pub use astar::AStarSolver;
pub use bridge::{via_model, BarrelLength, DrillDiameter, ViaBarrelModel};
pub use policy::SolverPolicy;
pub use visibility::VisibilityGraphSolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    VisibilityGraph,
    AStar,
}

impl std::fmt::Display for SolverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverKind::VisibilityGraph => f.write_str("visibility-graph"),
            SolverKind::AStar => f.write_str("a-star"),
        }
    }
}

/// Why a solver gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchLimit {
    Unreachable,
    IterationCap,
    Stalled,
}

/// Candidate attachment points tried per waypoint, nearest first
const ATTACH_CANDIDATES: usize = 8;

/// One search on one layer, from one conductor to another
///
/// `start` and `goal` are the closest points of the two conductors. When
/// `source`/`target` outlines are given the path may leave the source and
/// reach the target anywhere on their copper, not only at those points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathQuery<'a> {
    pub start: Point,
    pub goal: Point,
    pub source: Option<&'a [Point]>,
    pub target: Option<&'a [Point]>,
    /// Feature ignored on edges touching `start` or `goal`
    pub exempt: Option<FeatureId>,
}

impl<'a> PathQuery<'a> {
    pub fn new(start: Point, goal: Point) -> Self {
        Self {
            start,
            goal,
            source: None,
            target: None,
            exempt: None,
        }
    }

    /// Search between two conductor outlines
    pub fn between(source: &'a [Point], target: &'a [Point], start: Point, goal: Point) -> Self {
        Self {
            source: Some(source),
            target: Some(target),
            ..Self::new(start, goal)
        }
    }

    pub fn with_exempt(mut self, feature: FeatureId) -> Self {
        self.exempt = Some(feature);
        self
    }

    /// Whether the edge `a→b` is free of obstacles for this query
    pub fn edge_clear(&self, field: &ObstacleField, a: Point, b: Point) -> bool {
        let touches = a == self.start || a == self.goal || b == self.start || b == self.goal;
        !field.segment_blocked(a, b, if touches { self.exempt } else { None })
    }

    /// Shortest clear step from the source copper to `p`
    pub fn enter(&self, field: &ObstacleField, p: Point) -> Option<(f64, Point)> {
        self.attach(field, self.source, self.start, p)
    }

    /// Shortest clear step from `p` onto the target copper
    pub fn leave(&self, field: &ObstacleField, p: Point) -> Option<(f64, Point)> {
        self.attach(field, self.target, self.goal, p)
    }

    /// Straight-line lower bound on the rest of a path at `p`
    pub fn remaining(&self, p: Point) -> f64 {
        self.target
            .and_then(|t| shape_distance(t, &[p]))
            .map_or_else(|| p.distance(&self.goal), |c| c.distance)
    }

    /// Source points worth seeding a local search from
    pub fn source_points(&self) -> Vec<Point> {
        let mut points = vec![self.start];
        if let Some(source) = self.source {
            points.extend(source.iter().copied().filter(|p| *p != self.start));
        }
        points.truncate(ATTACH_CANDIDATES);
        points
    }

    fn attach(
        &self,
        field: &ObstacleField,
        shape: Option<&[Point]>,
        anchor: Point,
        p: Point,
    ) -> Option<(f64, Point)> {
        let mut candidates = vec![anchor];
        if let Some(shape) = shape {
            candidates.extend(shape_distance(shape, &[p]).map(|c| c.on_a));
            candidates.extend(shape.iter().copied());
        }
        candidates.sort_by(|x, y| x.distance(&p).total_cmp(&y.distance(&p)));
        candidates.dedup();
        candidates
            .into_iter()
            .take(ATTACH_CANDIDATES)
            .find(|&c| self.edge_clear(field, c, p))
            .map(|c| (c.distance(&p), c))
    }
}

/// Priority queue entry, smallest estimate first
#[derive(Clone, Copy, Debug)]
pub(crate) struct Frontier {
    pub est: f64,
    pub cost: f64,
    pub node: usize,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .est
            .total_cmp(&self.est)
            .then_with(|| other.cost.total_cmp(&self.cost))
            .then_with(|| self.node.cmp(&other.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Found {
        length: f64,
        path: Vec<Point>,
        iterations: usize,
    },
    NotFound {
        limit: SearchLimit,
        iterations: usize,
    },
}

impl SolveOutcome {
    pub fn length(&self) -> Option<f64> {
        match self {
            SolveOutcome::Found { length, .. } => Some(*length),
            SolveOutcome::NotFound { .. } => None,
        }
    }

    pub fn iterations(&self) -> usize {
        match self {
            SolveOutcome::Found { iterations, .. } | SolveOutcome::NotFound { iterations, .. } => {
                *iterations
            }
        }
    }
}

/// Shortest obstacle-avoiding path on one layer
pub trait PathSolver: Send + Sync {
    fn kind(&self) -> SolverKind;

    fn shortest_path(&self, field: &ObstacleField, query: &PathQuery<'_>) -> SolveOutcome;
}

/// Straight line when it is clear, otherwise ask the solver
pub fn solve(solver: &dyn PathSolver, field: &ObstacleField, query: &PathQuery<'_>) -> SolveOutcome {
    if query.edge_clear(field, query.start, query.goal) {
        return SolveOutcome::Found {
            length: query.start.distance(&query.goal),
            path: vec![query.start, query.goal],
            iterations: 0,
        };
    }
    solver.shortest_path(field, query)
}

/// Creepage of one unit
#[derive(Debug, Clone, PartialEq)]
pub struct CreepageOutcome {
    pub distance: Distance,
    pub path: Vec<Point>,
    pub from: Point,
    pub to: Point,
    pub algorithm: Option<SolverKind>,
    pub iterations: usize,
}

impl CreepageOutcome {
    /// Layer skipped for exceeding the obstacle ceiling
    pub fn skipped(closest: &ClosestPair) -> Self {
        Self {
            distance: Distance::Inconclusive(InconclusiveReason::ObstacleCeiling),
            path: Vec::new(),
            from: closest.on_a,
            to: closest.on_b,
            algorithm: None,
            iterations: 0,
        }
    }
}

/// Tracks the best path over several attempts
#[derive(Debug, Default)]
pub(crate) struct Best {
    pub length: Option<f64>,
    pub path: Vec<Point>,
    pub broken: bool,
    pub limit: Option<SearchLimit>,
    pub iterations: usize,
}

impl Best {
    pub fn beats(&self, lower_bound: f64) -> bool {
        self.length.is_some_and(|l| l <= lower_bound)
    }

    pub fn offer(&mut self, length: f64, path: Vec<Point>) {
        if self.length.map_or(true, |l| length < l) {
            self.length = Some(length);
            self.path = path;
        }
    }

    pub fn give_up(&mut self, limit: SearchLimit) {
        // Keep the most informative reason: a cap says more than unreachable
        self.limit = match (self.limit, limit) {
            (None, l) => Some(l),
            (Some(SearchLimit::Unreachable), l) => Some(l),
            (Some(prev), _) => Some(prev),
        };
    }

    pub fn distance(&self, floor: f64) -> Distance {
        match (self.length, self.broken, self.limit) {
            (Some(l), _, _) => Distance::Measured(l.max(floor)),
            (None, true, _) => Distance::Infinite,
            (None, false, Some(limit)) => Distance::Inconclusive(limit.into()),
            (None, false, None) => Distance::Inconclusive(InconclusiveReason::NoPath),
        }
    }
}

/// Does the straight line `a→b` cross a cutout or leave the board?
pub fn straight_line_broken(outline: Option<&[Point]>, cutouts: &[&[Point]], a: Point, b: Point) -> bool {
    let seg = BBox::of_segment(a, b);
    cutouts.iter().any(|c| {
        BBox::from_points(c).is_some_and(|bb| bb.intersects(&seg)) && segment_crosses_interior(a, b, c)
    }) || outline.is_some_and(|o| segment_leaves_polygon(a, b, o))
}

/// Obstacle field for one layer of a unit
pub fn build_field(
    ctx: &RunContext<'_>,
    region: BBox,
    obstacles: &[&Feature],
    cutouts: &[&[Point]],
) -> ObstacleField {
    let search = &ctx.config.search;
    let shapes = obstacles
        .iter()
        .map(|f| (f.geometry.clone(), Some(f.id)))
        .chain(cutouts.iter().map(|c| (c.to_vec(), None)))
        .collect();
    ObstacleField::build(
        region,
        search.cell_size_mm,
        search.max_grid_cells,
        shapes,
        ctx.board.outline(),
    )
}

/// Measure creepage for a collected unit
pub fn measure(ctx: &RunContext<'_>, collection: &Collection<'_>) -> CreepageOutcome {
    if collection.scope.is_bridge() {
        bridge::measure_bridge(ctx, collection)
    } else {
        measure_single(ctx, collection)
    }
}

fn measure_single(ctx: &RunContext<'_>, collection: &Collection<'_>) -> CreepageOutcome {
    let field = build_field(
        ctx,
        collection.region,
        &collection.obstacles_from,
        &collection.cutouts,
    );
    let solver = ctx
        .policy
        .choose(collection.obstacles_from.len(), field.vertices().len());
    let outline = ctx.board.outline();

    let mut best = Best::default();
    let mut endpoints = (collection.closest.on_a, collection.closest.on_b);

    let pairs = candidate_pairs(
        &collection.endpoints_a,
        &collection.endpoints_b,
        ctx.config.search.endpoint_pairs,
        0.0,
    );
    for pair in &pairs {
        // Creepage is never shorter than the straight line
        if best.beats(pair.planar) {
            break;
        }
        if straight_line_broken(outline, &collection.cutouts, pair.on_a, pair.on_b) {
            tracing::debug!(
                "Straight line {:?} -> {:?} crosses a cutout or the board edge",
                pair.on_a,
                pair.on_b
            );
            best.broken = true;
            continue;
        }
        let (Some(fa), Some(fb)) = (ctx.feature(pair.feature_a), ctx.feature(pair.feature_b))
        else {
            continue;
        };
        let query = PathQuery::between(&fa.geometry, &fb.geometry, pair.on_a, pair.on_b);
        let outcome = solve(solver, &field, &query);
        best.iterations += outcome.iterations();
        match outcome {
            SolveOutcome::Found { length, path, .. } => {
                if best.length.map_or(true, |l| length < l) {
                    endpoints = path_ends(&path).unwrap_or((pair.on_a, pair.on_b));
                }
                best.offer(length, path);
            }
            SolveOutcome::NotFound { limit, .. } => best.give_up(limit),
        }
    }

    CreepageOutcome {
        distance: best.distance(collection.closest.planar),
        path: best.path,
        from: endpoints.0,
        to: endpoints.1,
        algorithm: Some(solver.kind()),
        iterations: best.iterations,
    }
}

pub(crate) fn path_ends(path: &[Point]) -> Option<(Point, Point)> {
    Some((*path.first()?, *path.last()?))
}
