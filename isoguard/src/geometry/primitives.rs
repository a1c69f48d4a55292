//! Segment and polygon primitives
//!
//! Polygons are slices of vertices with an implicit closing edge. A slice of
//! one point is a point, a slice of two points is a segment.

use super::{Point, EPSILON};

/// Points closer than this to a polygon edge count as on its boundary (mm)
pub const BOUNDARY_TOLERANCE: f64 = 1e-7;

/// Result of intersecting two segments, parameterized along the first one
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentHit {
    Disjoint,
    /// Single contact at parameter `t` of the first segment
    Point { t: f64, point: Point },
    /// Collinear overlap between parameters `t0..t1` of the first segment
    Overlap { t0: f64, t1: f64 },
}

/// Closest-approach pair between two shapes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Closest {
    pub distance: f64,
    pub on_a: Point,
    pub on_b: Point,
}

impl Closest {
    fn touching(p: Point) -> Self {
        Self {
            distance: 0.0,
            on_a: p,
            on_b: p,
        }
    }

    fn swapped(self) -> Self {
        Self {
            distance: self.distance,
            on_a: self.on_b,
            on_b: self.on_a,
        }
    }
}

/// Point-to-segment minimum distance and the closest point on the segment
pub fn point_segment_distance(p: Point, a: Point, b: Point) -> (f64, Point) {
    let ab = b - a;
    let ab_len2 = ab.dot(ab);

    if ab_len2 < EPSILON * EPSILON {
        // Degenerate segment
        return (p.distance(&a), a);
    }

    let t = ((p - a).dot(ab) / ab_len2).clamp(0.0, 1.0);
    let closest = a.lerp(b, t);
    (p.distance(&closest), closest)
}

/// Intersect segment `a→b` with segment `c→d`
pub fn intersect_segments(a: Point, b: Point, c: Point, d: Point) -> SegmentHit {
    let r = b - a;
    let s = d - c;
    let qp = c - a;
    let r_len = r.length();
    let s_len = s.length();

    if r_len < EPSILON {
        let (dist, _) = point_segment_distance(a, c, d);
        return if dist <= BOUNDARY_TOLERANCE {
            SegmentHit::Point { t: 0.0, point: a }
        } else {
            SegmentHit::Disjoint
        };
    }
    if s_len < EPSILON {
        let (dist, closest) = point_segment_distance(c, a, b);
        if dist > BOUNDARY_TOLERANCE {
            return SegmentHit::Disjoint;
        }
        let t = (closest - a).dot(r) / (r_len * r_len);
        return SegmentHit::Point { t, point: closest };
    }

    let denom = r.cross(s);
    if denom.abs() <= EPSILON * r_len * s_len {
        // Parallel: only collinear segments can touch
        if (qp.cross(r) / r_len).abs() > BOUNDARY_TOLERANCE {
            return SegmentHit::Disjoint;
        }
        let r_len2 = r_len * r_len;
        let tc = qp.dot(r) / r_len2;
        let td = (d - a).dot(r) / r_len2;
        let lo = tc.min(td).max(0.0);
        let hi = tc.max(td).min(1.0);
        let tol = BOUNDARY_TOLERANCE / r_len;
        if lo > hi + tol {
            return SegmentHit::Disjoint;
        }
        if hi - lo <= tol {
            let t = lo.min(1.0);
            return SegmentHit::Point {
                t,
                point: a.lerp(b, t),
            };
        }
        return SegmentHit::Overlap { t0: lo, t1: hi };
    }

    let t = qp.cross(s) / denom;
    let u = qp.cross(r) / denom;
    let t_tol = BOUNDARY_TOLERANCE / r_len;
    let u_tol = BOUNDARY_TOLERANCE / s_len;
    if t < -t_tol || t > 1.0 + t_tol || u < -u_tol || u > 1.0 + u_tol {
        return SegmentHit::Disjoint;
    }
    let t = t.clamp(0.0, 1.0);
    SegmentHit::Point {
        t,
        point: a.lerp(b, t),
    }
}

/// Segment-to-segment minimum distance with the closest point on each segment
pub fn segment_distance(a1: Point, a2: Point, b1: Point, b2: Point) -> Closest {
    match intersect_segments(a1, a2, b1, b2) {
        SegmentHit::Point { point, .. } => return Closest::touching(point),
        SegmentHit::Overlap { t0, .. } => return Closest::touching(a1.lerp(a2, t0)),
        SegmentHit::Disjoint => {}
    }

    let mut best = Closest {
        distance: f64::INFINITY,
        on_a: a1,
        on_b: b1,
    };

    for (p, from_a) in [(a1, true), (a2, true), (b1, false), (b2, false)] {
        let (d, q) = if from_a {
            point_segment_distance(p, b1, b2)
        } else {
            point_segment_distance(p, a1, a2)
        };
        if d < best.distance {
            best = if from_a {
                Closest { distance: d, on_a: p, on_b: q }
            } else {
                Closest { distance: d, on_a: q, on_b: p }
            };
        }
    }

    best
}

/// Edges of a polygon, including the closing edge
pub fn edges(poly: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    let n = poly.len();
    let count = match n {
        0 | 1 => 0,
        2 => 1,
        _ => n,
    };
    (0..count).map(move |i| (poly[i], poly[(i + 1) % n]))
}

/// Shoelace signed area; positive for counter-clockwise winding
pub fn signed_area(poly: &[Point]) -> f64 {
    if poly.len() < 3 {
        return 0.0;
    }
    edges(poly).map(|(a, b)| a.cross(b)).sum::<f64>() / 2.0
}

/// Even-odd point-in-polygon test (boundary points may go either way)
pub fn point_in_polygon(p: Point, poly: &[Point]) -> bool {
    if poly.len() < 3 {
        return false;
    }
    let mut inside = false;
    for (a, b) in edges(poly) {
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    inside
}

pub fn point_on_boundary(p: Point, poly: &[Point]) -> bool {
    if poly.len() == 1 {
        return p.distance(&poly[0]) <= BOUNDARY_TOLERANCE;
    }
    edges(poly).any(|(a, b)| point_segment_distance(p, a, b).0 <= BOUNDARY_TOLERANCE)
}

/// Inside the polygon and not on its boundary
pub fn point_strictly_inside(p: Point, poly: &[Point]) -> bool {
    !point_on_boundary(p, poly) && point_in_polygon(p, poly)
}

/// Outside the polygon and not on its boundary
pub fn point_strictly_outside(p: Point, poly: &[Point]) -> bool {
    !point_on_boundary(p, poly) && !point_in_polygon(p, poly)
}

/// Sorted contact parameters of segment `a→b` with the polygon boundary,
/// always including both segment ends
fn boundary_parameters(a: Point, b: Point, poly: &[Point]) -> Vec<f64> {
    let mut ts = vec![0.0, 1.0];
    for (c, d) in edges(poly) {
        match intersect_segments(a, b, c, d) {
            SegmentHit::Disjoint => {}
            SegmentHit::Point { t, .. } => ts.push(t),
            SegmentHit::Overlap { t0, t1 } => {
                ts.push(t0);
                ts.push(t1);
            }
        }
    }
    ts.sort_by(|x, y| x.total_cmp(y));
    ts.dedup_by(|x, y| (*x - *y).abs() <= EPSILON);
    ts
}

/// Midpoints of the pieces a segment is cut into by the polygon boundary.
/// Each piece lies entirely inside, outside, or along the boundary.
fn piece_midpoints(a: Point, b: Point, poly: &[Point]) -> Vec<Point> {
    boundary_parameters(a, b, poly)
        .windows(2)
        .filter(|w| w[1] - w[0] > EPSILON)
        .map(|w| a.lerp(b, (w[0] + w[1]) / 2.0))
        .collect()
}

/// Does segment `a→b` pass through the interior of the polygon?
///
/// Touching a vertex or sliding along an edge does not count.
pub fn segment_crosses_interior(a: Point, b: Point, poly: &[Point]) -> bool {
    if poly.len() < 3 {
        return false;
    }
    if a.distance(&b) <= EPSILON {
        return point_strictly_inside(a, poly);
    }
    piece_midpoints(a, b, poly).into_iter().any(|m| point_strictly_inside(m, poly))
}

/// Does any part of segment `a→b` lie outside the polygon?
pub fn segment_leaves_polygon(a: Point, b: Point, poly: &[Point]) -> bool {
    if poly.len() < 3 {
        return false;
    }
    if a.distance(&b) <= EPSILON {
        return point_strictly_outside(a, poly);
    }
    piece_midpoints(a, b, poly).into_iter().any(|m| point_strictly_outside(m, poly))
}

/// Check for crossings between non-adjacent edges
pub fn is_self_intersecting(poly: &[Point]) -> bool {
    let n = poly.len();
    if n < 4 {
        return false;
    }
    let all: Vec<(Point, Point)> = edges(poly).collect();
    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            if adjacent {
                continue;
            }
            let (a, b) = all[i];
            let (c, d) = all[j];
            if intersect_segments(a, b, c, d) != SegmentHit::Disjoint {
                return true;
            }
        }
    }
    false
}

/// Whether vertex `i` bends outward (convex) given the polygon's winding.
/// Collinear vertices count as convex.
pub fn is_convex_vertex(poly: &[Point], i: usize) -> bool {
    let n = poly.len();
    if n < 4 {
        return true;
    }
    let prev = poly[(i + n - 1) % n];
    let cur = poly[i];
    let next = poly[(i + 1) % n];
    let turn = (cur - prev).cross(next - cur);
    let winding = signed_area(poly);
    turn * winding >= -EPSILON
}

/// Every corner turns the same way and none is collinear
pub fn is_strictly_convex(poly: &[Point]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let winding = signed_area(poly);
    if winding.abs() <= EPSILON {
        return false;
    }
    (0..n).all(|i| {
        let prev = poly[(i + n - 1) % n];
        let cur = poly[i];
        let next = poly[(i + 1) % n];
        (cur - prev).cross(next - cur) * winding > EPSILON
    })
}

/// Minimum edge-to-edge distance between two shapes (zero when they overlap)
pub fn shape_distance(a: &[Point], b: &[Point]) -> Option<Closest> {
    match (a.len(), b.len()) {
        (0, _) | (_, 0) => None,
        (1, 1) => Some(Closest {
            distance: a[0].distance(&b[0]),
            on_a: a[0],
            on_b: b[0],
        }),
        (1, _) => Some(point_shape_distance(a[0], b)),
        (_, 1) => Some(point_shape_distance(b[0], a).swapped()),
        _ => Some(polygon_distance(a, b)),
    }
}

fn point_shape_distance(p: Point, shape: &[Point]) -> Closest {
    if point_in_polygon(p, shape) {
        return Closest::touching(p);
    }
    let mut best = Closest {
        distance: f64::INFINITY,
        on_a: p,
        on_b: shape[0],
    };
    for (c, d) in edges(shape) {
        let (dist, q) = point_segment_distance(p, c, d);
        if dist < best.distance {
            best = Closest { distance: dist, on_a: p, on_b: q };
        }
    }
    best
}

fn polygon_distance(a: &[Point], b: &[Point]) -> Closest {
    if point_in_polygon(a[0], b) {
        return Closest::touching(a[0]);
    }
    if point_in_polygon(b[0], a) {
        return Closest::touching(b[0]);
    }
    let mut best = Closest {
        distance: f64::INFINITY,
        on_a: a[0],
        on_b: b[0],
    };
    for (a1, a2) in edges(a) {
        for (b1, b2) in edges(b) {
            let c = segment_distance(a1, a2, b1, b2);
            if c.distance < best.distance {
                best = c;
                if best.distance == 0.0 {
                    return best;
                }
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    #[test]
    fn test_point_segment_distance() {
        let (d, _) = point_segment_distance(
            Point::new(0.0, 1.0),
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
        );
        assert!((d - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_crossing_segments_touch() {
        let hit = intersect_segments(
            Point::new(0.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
            Point::new(2.0, 0.0),
        );
        match hit {
            SegmentHit::Point { t, point } => {
                assert!((t - 0.5).abs() < 1e-12);
                assert!(point.distance(&Point::new(1.0, 1.0)) < 1e-12);
            }
            other => panic!("expected point hit, got {:?}", other),
        }
    }

    #[test]
    fn test_collinear_overlap() {
        let hit = intersect_segments(
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 0.0),
        );
        assert_eq!(hit, SegmentHit::Overlap { t0: 0.25, t1: 0.5 });
    }

    #[test]
    fn test_segment_through_square_interior() {
        let sq = square(2.0, -1.0, 3.0, 1.0);
        assert!(segment_crosses_interior(Point::new(0.0, 0.0), Point::new(5.0, 0.0), &sq));
        // Diagonal between corners passes through the interior
        assert!(segment_crosses_interior(Point::new(2.0, 1.0), Point::new(3.0, -1.0), &sq));
    }

    #[test]
    fn test_segment_touching_square_is_clear() {
        let sq = square(2.0, -1.0, 3.0, 1.0);
        // Along the top edge
        assert!(!segment_crosses_interior(Point::new(2.0, 1.0), Point::new(3.0, 1.0), &sq));
        // Ending at a corner
        assert!(!segment_crosses_interior(Point::new(0.0, 0.0), Point::new(2.0, 1.0), &sq));
        // Grazing a corner from outside
        assert!(!segment_crosses_interior(Point::new(1.0, 0.0), Point::new(3.0, 2.0), &sq));
    }

    #[test]
    fn test_segment_entering_through_corner() {
        let sq = square(0.0, 0.0, 1.0, 1.0);
        assert!(segment_crosses_interior(Point::new(-10.0, -10.0), Point::new(1.0, 1.0), &sq));
    }

    #[test]
    fn test_segment_leaves_outline() {
        let outline = square(0.0, 0.0, 10.0, 10.0);
        assert!(!segment_leaves_polygon(Point::new(1.0, 1.0), Point::new(9.0, 9.0), &outline));
        assert!(!segment_leaves_polygon(Point::new(0.0, 0.0), Point::new(10.0, 0.0), &outline));
        assert!(segment_leaves_polygon(Point::new(1.0, 1.0), Point::new(12.0, 1.0), &outline));
    }

    #[test]
    fn test_self_intersection() {
        let bowtie = vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(2.0, 0.0),
            Point::new(0.0, 2.0),
        ];
        assert!(is_self_intersecting(&bowtie));
        assert!(!is_self_intersecting(&square(0.0, 0.0, 1.0, 1.0)));
    }

    #[test]
    fn test_convex_vertex_detection() {
        // L-shape, counter-clockwise; vertex 3 is the reflex corner
        let l = vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 2.0),
            Point::new(0.0, 2.0),
        ];
        assert!(is_convex_vertex(&l, 0));
        assert!(is_convex_vertex(&l, 2));
        assert!(!is_convex_vertex(&l, 3));
        assert!(!is_strictly_convex(&l));
    }

    #[test]
    fn test_strict_convexity() {
        assert!(is_strictly_convex(&square(0.0, 0.0, 1.0, 1.0)));
        let mut clockwise = square(0.0, 0.0, 1.0, 1.0);
        clockwise.reverse();
        assert!(is_strictly_convex(&clockwise));
        // Midpoint on the bottom edge
        let with_midpoint = vec![
            Point::new(0.0, 0.0),
            Point::new(0.5, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        assert!(!is_strictly_convex(&with_midpoint));
    }

    #[test]
    fn test_polygon_distance_edge_to_edge() {
        let a = square(0.0, 0.0, 1.0, 1.0);
        let b = square(3.0, 0.5, 4.0, 2.0);
        let c = shape_distance(&a, &b).unwrap();
        assert!((c.distance - 2.0).abs() < 1e-12);
        assert!((c.on_a.x - 1.0).abs() < 1e-12);
        assert!((c.on_b.x - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_point_inside_polygon_distance_is_zero() {
        let a = square(0.0, 0.0, 4.0, 4.0);
        let c = shape_distance(&[Point::new(1.0, 1.0)], &a).unwrap();
        assert_eq!(c.distance, 0.0);
    }
}
