//! Cross-layer creepage through vias
//!
//! A path from layer `from` to layer `to` runs along the surface to a via,
//! down its barrel, and along the other surface to the goal. The barrel
//! contribution comes from a [`ViaBarrelModel`]. A leg whose straight line
//! crosses a cutout or the board edge rules that via out.

use super::{
    build_field, path_ends, solve, straight_line_broken, Best, CreepageOutcome, PathQuery,
    SolveOutcome, SolverKind,
};
use crate::analysis::clearance::candidate_pairs;
use crate::analysis::collector::Collection;
use crate::board::{Feature, ViaSpan};
use crate::config::ViaModelKind;
use crate::core::RunContext;
use crate::geometry::{shape_distance, Point};

/// Creepage credited for travelling through a via barrel
pub trait ViaBarrelModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// `from_z` and `to_z` are the stackup depths of the two layers
    fn barrel_creepage(&self, span: &ViaSpan, from_z: f64, to_z: f64) -> f64;
}

/// Barrel creepage equals the drill diameter
#[derive(Debug, Clone, Copy, Default)]
pub struct DrillDiameter;

impl ViaBarrelModel for DrillDiameter {
    fn name(&self) -> &'static str {
        "drill-diameter"
    }

    fn barrel_creepage(&self, span: &ViaSpan, _from_z: f64, _to_z: f64) -> f64 {
        span.drill
    }
}

/// Barrel length between the layers plus the drill diameter
#[derive(Debug, Clone, Copy, Default)]
pub struct BarrelLength;

impl ViaBarrelModel for BarrelLength {
    fn name(&self) -> &'static str {
        "barrel-length"
    }

    fn barrel_creepage(&self, span: &ViaSpan, from_z: f64, to_z: f64) -> f64 {
        (to_z - from_z).abs() + span.drill
    }
}

pub fn via_model(kind: ViaModelKind) -> Box<dyn ViaBarrelModel> {
    match kind {
        ViaModelKind::DrillDiameter => Box::new(DrillDiameter),
        ViaModelKind::BarrelLength => Box::new(BarrelLength),
    }
}

/// Closest point of `feature` to `p`
fn nearest_on(feature: &Feature, p: Point) -> Option<(f64, Point)> {
    shape_distance(&feature.geometry, &[p]).map(|c| (c.distance, c.on_a))
}

pub fn measure_bridge(ctx: &RunContext<'_>, collection: &Collection<'_>) -> CreepageOutcome {
    let (layer_from, layer_to) = collection.scope.layers();
    let search = &ctx.config.search;

    let field_from = build_field(
        ctx,
        collection.region,
        &collection.obstacles_from,
        &collection.cutouts,
    );
    let field_to = build_field(
        ctx,
        collection.region,
        &collection.obstacles_to,
        &collection.cutouts,
    );
    let solver_from = ctx
        .policy
        .choose(collection.obstacles_from.len(), field_from.vertices().len());
    let solver_to = ctx
        .policy
        .choose(collection.obstacles_to.len(), field_to.vertices().len());
    let outline = ctx.board.outline();
    let algorithm = if solver_from.kind() == SolverKind::AStar || solver_to.kind() == SolverKind::AStar {
        SolverKind::AStar
    } else {
        SolverKind::VisibilityGraph
    };

    let z_from = ctx.board.layer_depth(layer_from).unwrap_or(0.0);
    let z_to = ctx.board.layer_depth(layer_to).unwrap_or(0.0);

    let mut best = Best::default();
    let mut endpoints = (collection.closest.on_a, collection.closest.on_b);

    let pairs = candidate_pairs(
        &collection.endpoints_a,
        &collection.endpoints_b,
        search.endpoint_pairs,
        0.0,
    );
    for pair in &pairs {
        if best.beats(pair.planar) {
            break;
        }
        let (Some(fa), Some(fb)) = (ctx.feature(pair.feature_a), ctx.feature(pair.feature_b))
        else {
            continue;
        };

        // Vias by the shortest route they could possibly give
        let mut vias: Vec<(f64, &Feature, &ViaSpan, Point)> = collection
            .vias
            .iter()
            .filter_map(|via| {
                let span = via.via.as_ref()?;
                let center = via.anchor()?;
                let (da, _) = nearest_on(fa, center)?;
                let (db, _) = nearest_on(fb, center)?;
                let barrel = ctx.via_model.barrel_creepage(span, z_from, z_to);
                Some((da + db + barrel, *via, span, center))
            })
            .collect();
        vias.sort_by(|x, y| x.0.total_cmp(&y.0));
        vias.truncate(search.bridge_vias);

        for (lower_bound, via, span, center) in vias {
            if best.beats(lower_bound) {
                break;
            }
            let (Some((_, start)), Some((_, goal))) = (nearest_on(fa, center), nearest_on(fb, center))
            else {
                continue;
            };
            if straight_line_broken(outline, &collection.cutouts, start, center)
                || straight_line_broken(outline, &collection.cutouts, center, goal)
            {
                tracing::debug!("Via {} leg crosses a cutout or the board edge", via.id);
                best.broken = true;
                continue;
            }

            let leg_from = solve(
                solver_from,
                &field_from,
                &PathQuery {
                    source: Some(fa.geometry.as_slice()),
                    ..PathQuery::new(start, center).with_exempt(via.id)
                },
            );
            best.iterations += leg_from.iterations();
            let (len_from, path_from) = match leg_from {
                SolveOutcome::Found { length, path, .. } => (length, path),
                SolveOutcome::NotFound { limit, .. } => {
                    best.give_up(limit);
                    continue;
                }
            };

            let leg_to = solve(
                solver_to,
                &field_to,
                &PathQuery {
                    target: Some(fb.geometry.as_slice()),
                    ..PathQuery::new(center, goal).with_exempt(via.id)
                },
            );
            best.iterations += leg_to.iterations();
            let (len_to, path_to) = match leg_to {
                SolveOutcome::Found { length, path, .. } => (length, path),
                SolveOutcome::NotFound { limit, .. } => {
                    best.give_up(limit);
                    continue;
                }
            };

            let total = len_from + ctx.via_model.barrel_creepage(span, z_from, z_to) + len_to;
            tracing::debug!(
                "Bridge via {} ({}): {:.3} + barrel + {:.3} = {:.3} mm",
                via.id,
                ctx.via_model.name(),
                len_from,
                len_to,
                total
            );
            let mut path = path_from;
            path.extend(path_to.into_iter().skip(1));
            if best.length.map_or(true, |l| total < l) {
                endpoints = path_ends(&path).unwrap_or((start, goal));
            }
            best.offer(total, path);
        }
    }

    CreepageOutcome {
        // Never below the clearance across the same layers
        distance: best.distance(collection.closest.distance),
        path: best.path,
        from: endpoints.0,
        to: endpoints.1,
        algorithm: Some(algorithm),
        iterations: best.iterations,
    }
}
