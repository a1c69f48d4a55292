//! Uniform grid index over obstacle polygons
//!
//! Built fresh for every (domain pair × layer) unit and owned by it. Each
//! obstacle is registered in every cell its bounding box touches; segment
//! queries only test obstacles registered in the cells the segment passes.

use super::primitives::{
    is_convex_vertex, is_strictly_convex, point_strictly_inside, point_strictly_outside,
    segment_crosses_interior, segment_leaves_polygon,
};
use super::{BBox, Point, EPSILON};
use crate::board::FeatureId;

/// A blocking polygon registered in the field
#[derive(Debug, Clone)]
pub struct FieldObstacle {
    pub polygon: Vec<Point>,
    pub bbox: BBox,
    /// Owning board feature; `None` for board cutouts
    pub source: Option<FeatureId>,
    pub convex: bool,
}

/// An obstacle corner usable as a path waypoint
#[derive(Debug, Clone, Copy)]
pub struct FieldVertex {
    pub point: Point,
    /// Owning obstacle, `None` for reflex corners of the board outline
    pub obstacle: Option<usize>,
    /// Position in the owning polygon
    pub corner: usize,
    /// Reflex corners never lie on a shortest path
    pub convex: bool,
}

#[derive(Debug)]
pub struct ObstacleField {
    cell: f64,
    min_x: f64,
    min_y: f64,
    cols: usize,
    rows: usize,
    obstacles: Vec<FieldObstacle>,
    cell_obstacles: Vec<Vec<usize>>,
    vertices: Vec<FieldVertex>,
    cell_vertices: Vec<Vec<usize>>,
    outline: Option<Vec<Point>>,
}

impl ObstacleField {
    /// Build the index over `region` (grown to cover every obstacle).
    ///
    /// The cell size starts at `cell_size` and grows until the grid fits in
    /// `max_cells`.
    pub fn build(
        region: BBox,
        cell_size: f64,
        max_cells: usize,
        obstacles: Vec<(Vec<Point>, Option<FeatureId>)>,
        outline: Option<&[Point]>,
    ) -> Self {
        let obstacles: Vec<FieldObstacle> = obstacles
            .into_iter()
            .filter_map(|(polygon, source)| {
                let bbox = BBox::from_points(&polygon)?;
                (polygon.len() >= 3).then(|| FieldObstacle {
                    convex: is_strictly_convex(&polygon),
                    polygon,
                    bbox,
                    source,
                })
            })
            .collect();

        let bounds = obstacles
            .iter()
            .fold(region, |acc, o| acc.union(o.bbox))
            .expand(cell_size.max(EPSILON));

        let max_cells = max_cells.max(1);
        let mut cell = cell_size.max(1e-3);
        let (mut cols, mut rows) = grid_dims(&bounds, cell);
        while cols.saturating_mul(rows) > max_cells {
            cell *= 1.5;
            (cols, rows) = grid_dims(&bounds, cell);
        }

        let mut field = Self {
            cell,
            min_x: bounds.min_x,
            min_y: bounds.min_y,
            cols,
            rows,
            obstacles,
            cell_obstacles: vec![Vec::new(); cols * rows],
            vertices: Vec::new(),
            cell_vertices: vec![Vec::new(); cols * rows],
            outline: outline.filter(|o| o.len() >= 3).map(|o| o.to_vec()),
        };

        for idx in 0..field.obstacles.len() {
            let bbox = field.obstacles[idx].bbox;
            for cell_idx in field.cells_for_bbox(&bbox) {
                field.cell_obstacles[cell_idx].push(idx);
            }
        }

        let mut vertices = Vec::new();
        for (idx, obstacle) in field.obstacles.iter().enumerate() {
            for (i, &p) in obstacle.polygon.iter().enumerate() {
                if field.point_blocked_except(p, Some(idx)) {
                    continue;
                }
                vertices.push(FieldVertex {
                    point: p,
                    obstacle: Some(idx),
                    corner: i,
                    convex: is_convex_vertex(&obstacle.polygon, i),
                });
            }
        }
        // Paths bend around inward corners of the board edge
        if let Some(outline) = field.outline.as_deref() {
            for (i, &p) in outline.iter().enumerate() {
                if is_convex_vertex(outline, i) || field.point_blocked(p) {
                    continue;
                }
                vertices.push(FieldVertex {
                    point: p,
                    obstacle: None,
                    corner: i,
                    convex: true,
                });
            }
        }
        for (v_idx, v) in vertices.iter().enumerate() {
            let cell_idx = field.cell_index(v.point);
            field.cell_vertices[cell_idx].push(v_idx);
        }
        field.vertices = vertices;

        field
    }

    pub fn obstacle_count(&self) -> usize {
        self.obstacles.len()
    }

    pub fn obstacles(&self) -> &[FieldObstacle] {
        &self.obstacles
    }

    pub fn vertices(&self) -> &[FieldVertex] {
        &self.vertices
    }

    pub fn cell_size(&self) -> f64 {
        self.cell
    }

    fn clamp_col(&self, x: f64) -> usize {
        (((x - self.min_x) / self.cell).floor().max(0.0) as usize).min(self.cols - 1)
    }

    fn clamp_row(&self, y: f64) -> usize {
        (((y - self.min_y) / self.cell).floor().max(0.0) as usize).min(self.rows - 1)
    }

    fn cell_index(&self, p: Point) -> usize {
        self.clamp_row(p.y) * self.cols + self.clamp_col(p.x)
    }

    fn cells_for_bbox(&self, bbox: &BBox) -> Vec<usize> {
        let (c0, c1) = (self.clamp_col(bbox.min_x), self.clamp_col(bbox.max_x));
        let (r0, r1) = (self.clamp_row(bbox.min_y), self.clamp_row(bbox.max_y));
        let mut cells = Vec::with_capacity((c1 - c0 + 1) * (r1 - r0 + 1));
        for row in r0..=r1 {
            for col in c0..=c1 {
                cells.push(row * self.cols + col);
            }
        }
        cells
    }

    /// Cells crossed by segment `a→b`, walked row band by row band
    fn segment_cells(&self, a: Point, b: Point) -> Vec<usize> {
        let bbox = BBox::of_segment(a, b);
        let (r0, r1) = (self.clamp_row(bbox.min_y), self.clamp_row(bbox.max_y));
        let dy = b.y - a.y;
        let mut cells = Vec::new();

        for row in r0..=r1 {
            let band_lo = if row == r0 {
                bbox.min_y
            } else {
                self.min_y + row as f64 * self.cell
            };
            let band_hi = if row == r1 {
                bbox.max_y
            } else {
                self.min_y + (row + 1) as f64 * self.cell
            };
            let (x_lo, x_hi) = if dy.abs() <= EPSILON || r0 == r1 {
                (bbox.min_x, bbox.max_x)
            } else {
                let x_at = |y: f64| a.x + (y - a.y) * (b.x - a.x) / dy;
                let (x1, x2) = (x_at(band_lo), x_at(band_hi));
                (x1.min(x2), x1.max(x2))
            };
            let c0 = self.clamp_col(x_lo.max(bbox.min_x) - EPSILON);
            let c1 = self.clamp_col(x_hi.min(bbox.max_x) + EPSILON);
            for col in c0..=c1 {
                cells.push(row * self.cols + col);
            }
        }
        cells
    }

    fn candidate_obstacles(&self, cells: &[usize]) -> Vec<usize> {
        let mut candidates: Vec<usize> = cells
            .iter()
            .flat_map(|&c| self.cell_obstacles[c].iter().copied())
            .collect();
        candidates.sort_unstable();
        candidates.dedup();
        candidates
    }

    /// Does segment `a→b` pass through any obstacle or leave the board?
    ///
    /// `exempt` names a feature whose polygon is ignored, used when a path
    /// starts or ends inside that feature (a via bridge).
    pub fn segment_blocked(&self, a: Point, b: Point, exempt: Option<FeatureId>) -> bool {
        if self.leaves_outline(a, b) {
            return true;
        }
        let seg_box = BBox::of_segment(a, b);
        self.candidate_obstacles(&self.segment_cells(a, b))
            .into_iter()
            .map(|idx| &self.obstacles[idx])
            .filter(|o| exempt.is_none() || o.source != exempt)
            .filter(|o| o.bbox.intersects(&seg_box))
            .any(|o| segment_crosses_interior(a, b, &o.polygon))
    }

    /// Same answer as [`segment_blocked`](Self::segment_blocked), testing
    /// every obstacle without the grid
    pub fn segment_blocked_linear(&self, a: Point, b: Point, exempt: Option<FeatureId>) -> bool {
        if self.leaves_outline(a, b) {
            return true;
        }
        self.obstacles
            .iter()
            .filter(|o| exempt.is_none() || o.source != exempt)
            .any(|o| segment_crosses_interior(a, b, &o.polygon))
    }

    fn leaves_outline(&self, a: Point, b: Point) -> bool {
        self.outline
            .as_deref()
            .is_some_and(|outline| segment_leaves_polygon(a, b, outline))
    }

    /// Is `p` unusable as a waypoint (inside an obstacle or off the board)?
    pub fn point_blocked(&self, p: Point) -> bool {
        self.point_blocked_except(p, None)
    }

    fn point_blocked_except(&self, p: Point, skip: Option<usize>) -> bool {
        if self
            .outline
            .as_deref()
            .is_some_and(|outline| point_strictly_outside(p, outline))
        {
            return true;
        }
        self.cell_obstacles[self.cell_index(p)]
            .iter()
            .filter(|&&idx| Some(idx) != skip)
            .map(|&idx| &self.obstacles[idx])
            .any(|o| o.bbox.contains(p) && point_strictly_inside(p, &o.polygon))
    }

    /// Indices of the `k` waypoint vertices nearest to `p`, closest first
    pub fn nearest_vertices(&self, p: Point, k: usize) -> Vec<usize> {
        if k == 0 || self.vertices.is_empty() {
            return Vec::new();
        }
        let (col, row) = (self.clamp_col(p.x) as i64, self.clamp_row(p.y) as i64);
        let grid_box = BBox {
            min_x: self.min_x,
            min_y: self.min_y,
            max_x: self.min_x + self.cols as f64 * self.cell,
            max_y: self.min_y + self.rows as f64 * self.cell,
        };
        let outside = BBox::from_point(p).distance(&grid_box);
        let max_ring = self.cols.max(self.rows) as i64;

        let mut found: Vec<(f64, usize)> = Vec::new();
        for ring in 0..=max_ring {
            for r in (row - ring)..=(row + ring) {
                for c in (col - ring)..=(col + ring) {
                    let on_ring = (r - row).abs() == ring || (c - col).abs() == ring;
                    if !on_ring || r < 0 || c < 0 || r >= self.rows as i64 || c >= self.cols as i64
                    {
                        continue;
                    }
                    let cell_idx = r as usize * self.cols + c as usize;
                    for &v in &self.cell_vertices[cell_idx] {
                        found.push((p.distance(&self.vertices[v].point), v));
                    }
                }
            }
            if found.len() >= k {
                found.sort_by(|x, y| x.0.total_cmp(&y.0));
                // Anything in a farther ring is at least this far away
                let reach = ring as f64 * self.cell - outside;
                if found[k - 1].0 <= reach {
                    break;
                }
            }
        }
        found.sort_by(|x, y| x.0.total_cmp(&y.0));
        found.truncate(k);
        found.into_iter().map(|(_, v)| v).collect()
    }

    /// Is the segment between vertices `i` and `j` a chord of one convex
    /// obstacle? Such segments always cross its interior.
    pub fn hidden_chord(&self, i: usize, j: usize) -> bool {
        let (vi, vj) = (&self.vertices[i], &self.vertices[j]);
        let Some(owner) = vi.obstacle.filter(|&o| vj.obstacle == Some(o)) else {
            return false;
        };
        let obstacle = &self.obstacles[owner];
        if !obstacle.convex {
            return false;
        }
        let n = obstacle.polygon.len();
        let gap = vi.corner.abs_diff(vj.corner);
        gap != 1 && gap != n - 1
    }
}

fn grid_dims(bounds: &BBox, cell: f64) -> (usize, usize) {
    let cols = (bounds.width() / cell).ceil().max(1.0) as usize;
    let rows = (bounds.height() / cell).ceil().max(1.0) as usize;
    (cols, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    fn region() -> BBox {
        BBox::of_segment(Point::new(-5.0, -5.0), Point::new(15.0, 15.0))
    }

    #[test]
    fn test_segment_blocked_by_obstacle() {
        let field = ObstacleField::build(
            region(),
            1.0,
            10_000,
            vec![(rect(4.0, -1.0, 6.0, 1.0), Some(7))],
            None,
        );
        assert!(field.segment_blocked(Point::new(0.0, 0.0), Point::new(10.0, 0.0), None));
        assert!(!field.segment_blocked(Point::new(0.0, 2.0), Point::new(10.0, 2.0), None));
        // Exempting the owner clears the path
        assert!(!field.segment_blocked(Point::new(0.0, 0.0), Point::new(10.0, 0.0), Some(7)));
    }

    #[test]
    fn test_grid_and_linear_agree() {
        let field = ObstacleField::build(
            region(),
            0.5,
            10_000,
            vec![
                (rect(1.0, 1.0, 2.0, 8.0), Some(1)),
                (rect(5.0, -2.0, 6.0, 3.0), Some(2)),
                (rect(7.0, 6.0, 9.0, 7.0), Some(3)),
            ],
            None,
        );
        let segments = [
            (Point::new(0.0, 0.0), Point::new(10.0, 10.0)),
            (Point::new(0.0, 5.0), Point::new(10.0, 5.0)),
            (Point::new(3.0, -4.0), Point::new(3.0, 14.0)),
            (Point::new(8.0, 0.0), Point::new(8.0, 10.0)),
            (Point::new(-1.0, 9.0), Point::new(12.0, 8.5)),
        ];
        for (a, b) in segments {
            assert_eq!(
                field.segment_blocked(a, b, None),
                field.segment_blocked_linear(a, b, None),
                "disagreement on {:?} -> {:?}",
                a,
                b
            );
        }
    }

    #[test]
    fn test_outline_blocks_exit() {
        let outline = rect(0.0, 0.0, 10.0, 10.0);
        let field = ObstacleField::build(region(), 1.0, 10_000, vec![], Some(&outline));
        assert!(field.segment_blocked(Point::new(1.0, 1.0), Point::new(12.0, 1.0), None));
        assert!(!field.segment_blocked(Point::new(1.0, 1.0), Point::new(9.0, 1.0), None));
        assert!(field.point_blocked(Point::new(11.0, 5.0)));
    }

    #[test]
    fn test_vertices_inside_other_obstacles_are_dropped() {
        let field = ObstacleField::build(
            region(),
            1.0,
            10_000,
            vec![
                (rect(0.0, 0.0, 4.0, 4.0), Some(1)),
                (rect(1.0, 1.0, 2.0, 2.0), Some(2)),
            ],
            None,
        );
        assert_eq!(field.vertices().len(), 4);
    }

    #[test]
    fn test_nearest_vertices_ordering() {
        let field = ObstacleField::build(
            region(),
            1.0,
            10_000,
            vec![
                (rect(1.0, 1.0, 2.0, 2.0), Some(1)),
                (rect(8.0, 8.0, 9.0, 9.0), Some(2)),
            ],
            None,
        );
        let nearest = field.nearest_vertices(Point::new(0.0, 0.0), 3);
        assert_eq!(nearest.len(), 3);
        let first = field.vertices()[nearest[0]].point;
        assert_eq!(first, Point::new(1.0, 1.0));
        for idx in nearest {
            assert_eq!(field.vertices()[idx].obstacle, Some(0));
        }
    }

    #[test]
    fn test_grid_respects_cell_budget() {
        let field = ObstacleField::build(region(), 0.01, 400, vec![], None);
        assert!(field.cols * field.rows <= 400);
    }

    #[test]
    fn test_hidden_chords_of_convex_obstacles() {
        let l_shape = vec![
            Point::new(6.0, 0.0),
            Point::new(9.0, 0.0),
            Point::new(9.0, 3.0),
            Point::new(8.0, 3.0),
            Point::new(8.0, 1.0),
            Point::new(6.0, 1.0),
        ];
        let field = ObstacleField::build(
            region(),
            1.0,
            10_000,
            vec![(rect(0.0, 0.0, 2.0, 2.0), Some(1)), (l_shape, Some(2))],
            None,
        );
        assert!(field.obstacles()[0].convex);
        assert!(!field.obstacles()[1].convex);
        // Diagonal of the square
        assert!(field.hidden_chord(0, 2));
        // Shared edge
        assert!(!field.hidden_chord(0, 1));
        assert!(!field.hidden_chord(3, 0));
        // Different obstacles
        assert!(!field.hidden_chord(0, 4));
        // Concave obstacles are tested geometrically
        assert!(!field.hidden_chord(4, 6));
    }
}
