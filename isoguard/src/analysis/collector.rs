//! Feature & obstacle collection
//!
//! For one domain pair and layer scope: find the closest pair of features,
//! grow its bounding box by the search margin, and gather the endpoint
//! candidates, obstacles and bridging vias inside that region.

use serde::Serialize;

use super::clearance::{closest_pair, ClosestPair};
use crate::board::Feature;
use crate::compliance::DomainId;
use crate::core::RunContext;
use crate::geometry::{BBox, Point};

/// Layers a unit of work measures across
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerScope {
    /// Both domains on one layer
    Single { layer: String },
    /// First domain on `from`, second on `to`, joined through vias
    Bridge { from: String, to: String },
}

impl LayerScope {
    /// Layer of the first domain's features and of the second's
    pub fn layers(&self) -> (&str, &str) {
        match self {
            LayerScope::Single { layer } => (layer, layer),
            LayerScope::Bridge { from, to } => (from, to),
        }
    }

    pub fn is_bridge(&self) -> bool {
        matches!(self, LayerScope::Bridge { .. })
    }
}

impl std::fmt::Display for LayerScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerScope::Single { layer } => f.write_str(layer),
            LayerScope::Bridge { from, to } => write!(f, "{} -> {}", from, to),
        }
    }
}

/// Everything one unit needs, borrowed from the board
#[derive(Debug)]
pub struct Collection<'a> {
    pub scope: LayerScope,
    pub region: BBox,
    pub closest: ClosestPair,
    pub endpoints_a: Vec<&'a Feature>,
    pub endpoints_b: Vec<&'a Feature>,
    /// Obstacles on the first domain's layer
    pub obstacles_from: Vec<&'a Feature>,
    /// Obstacles on the second domain's layer (bridge scopes only)
    pub obstacles_to: Vec<&'a Feature>,
    pub vias: Vec<&'a Feature>,
    pub cutouts: Vec<&'a [Point]>,
    pub measures_clearance: bool,
    pub measures_creepage: bool,
}

impl Collection<'_> {
    /// Obstacle count on the busiest layer of the scope
    pub fn obstacle_count(&self) -> usize {
        self.obstacles_from.len().max(self.obstacles_to.len())
    }

    /// Corner count of obstacles and cutouts on the busiest layer
    pub fn vertex_count(&self) -> usize {
        let corners = |features: &[&Feature]| -> usize {
            features.iter().map(|f| f.geometry.len()).sum()
        };
        let cutouts: usize = self.cutouts.iter().map(|c| c.len()).sum();
        corners(&self.obstacles_from).max(corners(&self.obstacles_to)) + cutouts
    }

    pub fn over_ceiling(&self, ctx: &RunContext<'_>) -> bool {
        let search = &ctx.config.search;
        self.obstacle_count() > search.obstacle_ceiling
            || self.vertex_count() > search.vertex_ceiling
    }
}

fn domain_features<'a>(ctx: &RunContext<'a>, domain: DomainId, layer: &str) -> Vec<&'a Feature> {
    ctx.domains
        .features_of(domain)
        .iter()
        .filter_map(|id| ctx.feature(*id))
        .filter(|f| f.on_layer(layer))
        .collect()
}

/// Layer scopes worth measuring for a domain pair, in board layer order
pub fn plan_scopes(ctx: &RunContext<'_>, pair: (DomainId, DomainId)) -> Vec<LayerScope> {
    let (a, b) = pair;
    let search = &ctx.config.search;
    let layers: Vec<&str> = ctx.board.layers().iter().map(|l| l.name.as_str()).collect();
    let on = |domain: DomainId, layer: &str| !domain_features(ctx, domain, layer).is_empty();

    let mut scopes = Vec::new();
    for layer in &layers {
        if on(a, layer) && on(b, layer) {
            scopes.push(LayerScope::Single {
                layer: layer.to_string(),
            });
        }
    }

    if !search.cross_layer && !search.clearance_3d {
        return scopes;
    }
    for from in &layers {
        for to in &layers {
            if from == to || !on(a, from) || !on(b, to) {
                continue;
            }
            let has_via = ctx.board.features().iter().any(|f| {
                f.bridges(from, to)
                    && !ctx.domains.is_degenerate(f.id)
                    && !matches!(ctx.domains.domain_of(f), Some(d) if d == a || d == b)
            });
            if search.clearance_3d || has_via {
                scopes.push(LayerScope::Bridge {
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
        }
    }
    scopes
}

/// Gather the unit's features, `None` when a side has no copper in scope
pub fn collect<'a>(
    ctx: &RunContext<'a>,
    pair: (DomainId, DomainId),
    scope: &LayerScope,
) -> Option<Collection<'a>> {
    let (a, b) = pair;
    let (layer_a, layer_b) = scope.layers();
    let search = &ctx.config.search;

    let all_a = domain_features(ctx, a, layer_a);
    let all_b = domain_features(ctx, b, layer_b);
    if all_a.is_empty() || all_b.is_empty() {
        return None;
    }

    let z_separation = if scope.is_bridge() && search.clearance_3d {
        match (ctx.board.layer_depth(layer_a), ctx.board.layer_depth(layer_b)) {
            (Some(za), Some(zb)) => (za - zb).abs(),
            _ => {
                tracing::warn!(
                    "No stackup depth for {} or {}, using planar clearance",
                    layer_a,
                    layer_b
                );
                0.0
            }
        }
    } else {
        0.0
    };

    let closest = closest_pair(&all_a, &all_b, z_separation)?;
    let region = [closest.feature_a, closest.feature_b]
        .iter()
        .filter_map(|id| ctx.feature(*id).and_then(Feature::bbox))
        .reduce(BBox::union)?
        .expand(search.search_margin_mm);

    let in_region = |f: &&Feature| f.bbox().is_some_and(|bb| bb.intersects(&region));
    let is_other = |f: &&Feature| {
        !ctx.domains.is_degenerate(f.id)
            && !matches!(ctx.domains.domain_of(f), Some(d) if d == a || d == b)
    };
    let obstacles_on = |layer: &str| -> Vec<&'a Feature> {
        ctx.features_in(layer, &region)
            .into_iter()
            .filter(|f| f.is_polygon())
            .filter(is_other)
            .collect()
    };

    let endpoints_a: Vec<&Feature> = all_a.into_iter().filter(in_region).collect();
    let endpoints_b: Vec<&Feature> = all_b.into_iter().filter(in_region).collect();
    let obstacles_from = obstacles_on(layer_a);

    let (obstacles_to, vias) = if scope.is_bridge() {
        let vias = ctx
            .features_in(layer_a, &region)
            .into_iter()
            .filter(|f| f.bridges(layer_a, layer_b))
            .filter(is_other)
            .filter(|f| f.anchor().is_some_and(|p| region.contains(p)))
            .collect();
        (obstacles_on(layer_b), vias)
    } else {
        (Vec::new(), Vec::new())
    };

    let cutouts: Vec<&[Point]> = ctx.board.cutouts().iter().map(Vec::as_slice).collect();

    let measures_clearance = !scope.is_bridge() || search.clearance_3d;
    let measures_creepage = !scope.is_bridge() || (search.cross_layer && !vias.is_empty());
    if !measures_clearance && !measures_creepage {
        return None;
    }

    let corners: usize = obstacles_from
        .iter()
        .chain(&obstacles_to)
        .map(|f| f.geometry.len())
        .sum();
    tracing::debug!(
        "Collected {}: {}+{} endpoints, {} obstacles ({} corners), {} vias in {:.1}x{:.1} mm",
        scope,
        endpoints_a.len(),
        endpoints_b.len(),
        obstacles_from.len().max(obstacles_to.len()),
        corners,
        vias.len(),
        region.width(),
        region.height()
    );

    Some(Collection {
        scope: scope.clone(),
        region,
        closest,
        endpoints_a,
        endpoints_b,
        obstacles_from,
        obstacles_to,
        vias,
        cutouts,
        measures_clearance,
        measures_creepage,
    })
}
