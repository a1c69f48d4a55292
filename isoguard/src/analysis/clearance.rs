//! Clearance: straight-line edge-to-edge distance, obstacles ignored

use std::collections::HashSet;

use serde::Serialize;

use crate::board::{Feature, FeatureId};
use crate::geometry::index::{index_boxes, nearest_slots, slots_in};
use crate::geometry::{shape_distance, Point};

/// Closest approach between one feature of each domain
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClosestPair {
    /// Distance including any layer separation
    pub distance: f64,
    /// In-plane distance
    pub planar: f64,
    pub on_a: Point,
    pub on_b: Point,
    pub feature_a: FeatureId,
    pub feature_b: FeatureId,
}

/// Feature pairs in ascending distance, at most `cap` of them
///
/// `z_separation` folds the distance between two layers into a 3D
/// distance; pass `0.0` for features on the same layer.
///
/// The nearest neighbours of each `a` feature bound the search radius;
/// only `b` features whose boxes fall inside it are compared.
pub fn candidate_pairs(
    a: &[&Feature],
    b: &[&Feature],
    cap: usize,
    z_separation: f64,
) -> Vec<ClosestPair> {
    if cap == 0 || a.is_empty() {
        return Vec::new();
    }

    let tree = index_boxes(b.iter().map(|f| f.bbox()));
    let measure = |i: usize, j: usize| -> Option<ClosestPair> {
        let closest = shape_distance(&a[i].geometry, &b[j].geometry)?;
        Some(ClosestPair {
            distance: closest.distance.hypot(z_separation),
            planar: closest.distance,
            on_a: closest.on_a,
            on_b: closest.on_b,
            feature_a: a[i].id,
            feature_b: b[j].id,
        })
    };
    let mut best: Vec<ClosestPair> = Vec::with_capacity(cap + 1);
    let keep = |best: &mut Vec<ClosestPair>, pair: ClosestPair| {
        let at = best.partition_point(|p| p.planar <= pair.planar);
        if at < cap {
            best.insert(at, pair);
            best.truncate(cap);
        }
    };

    // Seed with box-nearest neighbours to get a search radius
    let per_a = cap.div_ceil(a.len());
    let mut seen = HashSet::new();
    for (i, fa) in a.iter().enumerate() {
        let Some(center) = fa.bbox().map(|bb| bb.center()) else { continue };
        for j in nearest_slots(&tree, center, per_a) {
            seen.insert((i, j));
            if let Some(pair) = measure(i, j) {
                keep(&mut best, pair);
            }
        }
    }
    let radius = if best.len() == cap {
        best[cap - 1].planar
    } else {
        f64::INFINITY
    };

    let mut order: Vec<(f64, usize, usize)> = Vec::new();
    for (i, fa) in a.iter().enumerate() {
        let Some(box_a) = fa.bbox() else { continue };
        let near: Vec<usize> = if radius.is_finite() {
            slots_in(&tree, &box_a.expand(radius))
        } else {
            tree.iter().map(|e| e.slot).collect()
        };
        for j in near {
            if seen.contains(&(i, j)) {
                continue;
            }
            if let Some(box_b) = b[j].bbox() {
                order.push((box_a.distance(&box_b), i, j));
            }
        }
    }
    order.sort_by(|x, y| x.0.total_cmp(&y.0).then_with(|| (x.1, x.2).cmp(&(y.1, y.2))));

    for (lower_bound, i, j) in order {
        // Box gap never exceeds the real gap
        if best.len() == cap && lower_bound >= best[cap - 1].planar {
            break;
        }
        if let Some(pair) = measure(i, j) {
            keep(&mut best, pair);
        }
    }
    best
}

/// Minimum clearance between two feature sets
pub fn closest_pair(a: &[&Feature], b: &[&Feature], z_separation: f64) -> Option<ClosestPair> {
    candidate_pairs(a, b, 1, z_separation).into_iter().next()
}
