//! Indexed A* for dense obstacle fields
//!
//! Same node universe as the visibility graph, but each expansion only
//! looks at the `neighbors` obstacle corners nearest to the current node
//! (plus the target conductor). The search stops at the target, at
//! `iteration_cap` expansions, or after `stall_limit` expansions without
//! getting any closer to the target. The result is never shorter than the
//! exact one.

use std::collections::BinaryHeap;

use super::{Frontier, PathQuery, PathSolver, SearchLimit, SolveOutcome, SolverKind};
use crate::config::SearchConfig;
use crate::geometry::{ObstacleField, Point, BOUNDARY_TOLERANCE};

#[derive(Debug, Clone)]
pub struct AStarSolver {
    pub neighbors: usize,
    pub iteration_cap: usize,
    pub stall_limit: usize,
}

impl Default for AStarSolver {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default())
    }
}

impl AStarSolver {
    pub fn from_config(search: &SearchConfig) -> Self {
        Self {
            neighbors: search.astar_neighbors,
            iteration_cap: search.astar_iteration_cap,
            stall_limit: search.astar_stall_limit,
        }
    }

    /// Convex corners near `points`, nearest first, without repeats
    fn nearby(&self, field: &ObstacleField, points: &[Point], skip: Option<usize>) -> Vec<usize> {
        let vertices = field.vertices();
        let mut found = Vec::new();
        for &p in points {
            let near = field
                .nearest_vertices(p, self.neighbors + 1)
                .into_iter()
                .filter(|&v| Some(v) != skip && vertices[v].convex)
                .filter(|&v| skip.map_or(true, |s| !field.hidden_chord(s, v)))
                .take(self.neighbors);
            for v in near {
                if !found.contains(&v) {
                    found.push(v);
                }
            }
        }
        found
    }
}

/// Open set bookkeeping
struct Open {
    best_cost: Vec<f64>,
    prev: Vec<Option<usize>>,
    entry: Vec<Option<Point>>,
    heap: BinaryHeap<Frontier>,
}

impl Open {
    fn new(nodes: usize) -> Self {
        Self {
            best_cost: vec![f64::INFINITY; nodes],
            prev: vec![None; nodes],
            entry: vec![None; nodes],
            heap: BinaryHeap::new(),
        }
    }

    fn relax(&mut self, from: usize, next: usize, cost: f64, est: f64, at: Option<Point>) -> bool {
        if cost >= self.best_cost[next] {
            return false;
        }
        self.best_cost[next] = cost;
        self.prev[next] = Some(from);
        self.entry[next] = at;
        self.heap.push(Frontier { est, cost, node: next });
        true
    }
}

impl PathSolver for AStarSolver {
    fn kind(&self) -> SolverKind {
        SolverKind::AStar
    }

    fn shortest_path(&self, field: &ObstacleField, query: &PathQuery<'_>) -> SolveOutcome {
        let vertices = field.vertices();
        // Nodes: field vertices, then the source and target conductors
        let source = vertices.len();
        let target = source + 1;
        let position = |n: usize| -> Point {
            match n {
                n if n == source => query.start,
                n if n == target => query.goal,
                n => vertices[n].point,
            }
        };

        let mut open = Open::new(vertices.len() + 2);
        let mut closed = vec![false; vertices.len() + 2];
        let mut exit = query.goal;

        open.best_cost[source] = 0.0;
        open.heap.push(Frontier {
            est: query.remaining(query.start),
            cost: 0.0,
            node: source,
        });

        let mut steps = 0usize;
        let mut closest_to_target = f64::INFINITY;
        let mut since_progress = 0usize;

        while let Some(Frontier { cost, node, .. }) = open.heap.pop() {
            if closed[node] || cost > open.best_cost[node] {
                continue;
            }
            if node == target {
                let mut path = vec![exit];
                let mut cursor = open.prev[target];
                let mut first = open.entry[target];
                while let Some(n) = cursor.filter(|&n| n != source) {
                    path.push(position(n));
                    first = open.entry[n];
                    cursor = open.prev[n];
                }
                path.extend(first);
                path.reverse();
                path.dedup();
                return SolveOutcome::Found {
                    length: cost,
                    path,
                    iterations: steps,
                };
            }

            steps += 1;
            if steps > self.iteration_cap {
                return SolveOutcome::NotFound {
                    limit: SearchLimit::IterationCap,
                    iterations: steps,
                };
            }
            let here = position(node);
            let remaining = query.remaining(here);
            if remaining + BOUNDARY_TOLERANCE < closest_to_target {
                closest_to_target = remaining;
                since_progress = 0;
            } else {
                since_progress += 1;
                if since_progress >= self.stall_limit {
                    return SolveOutcome::NotFound {
                        limit: SearchLimit::Stalled,
                        iterations: steps,
                    };
                }
            }
            closed[node] = true;

            if node == source {
                if query.edge_clear(field, query.start, query.goal) {
                    let direct = query.start.distance(&query.goal);
                    open.relax(node, target, direct, direct, Some(query.start));
                }
                for v in self.nearby(field, &query.source_points(), None) {
                    if let Some((step, at)) = query.enter(field, vertices[v].point) {
                        let est = step + query.remaining(vertices[v].point);
                        open.relax(node, v, step, est, Some(at));
                    }
                }
                continue;
            }

            if let Some((step, at)) = query.leave(field, here) {
                if open.relax(node, target, cost + step, cost + step, None) {
                    exit = at;
                }
            }
            for next in self.nearby(field, &[here], Some(node)) {
                let there = vertices[next].point;
                let next_cost = cost + here.distance(&there);
                if closed[next] || next_cost >= open.best_cost[next] {
                    continue;
                }
                if !query.edge_clear(field, here, there) {
                    continue;
                }
                let est = next_cost + query.remaining(there);
                open.relax(node, next, next_cost, est, None);
            }
        }

        SolveOutcome::NotFound {
            limit: SearchLimit::Unreachable,
            iterations: steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::creepage::visibility::VisibilityGraphSolver;
    use crate::geometry::BBox;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    fn grid_of_pads(n: usize) -> ObstacleField {
        let mut obstacles = Vec::new();
        for i in 0..n {
            for j in 0..n {
                let (x, y) = (2.0 + i as f64 * 1.5, -4.0 + j as f64 * 1.5);
                obstacles.push((rect(x, y, x + 0.8, y + 0.8), Some((i * n + j) as u64)));
            }
        }
        ObstacleField::build(
            BBox::of_segment(Point::new(-5.0, -10.0), Point::new(25.0, 10.0)),
            1.0,
            10_000,
            obstacles,
            None,
        )
    }

    #[test]
    fn test_matches_exact_on_single_obstacle() {
        let field = ObstacleField::build(
            BBox::of_segment(Point::new(-5.0, -5.0), Point::new(10.0, 5.0)),
            1.0,
            10_000,
            vec![(rect(2.0, -1.0, 3.0, 1.0), Some(1))],
            None,
        );
        let query = PathQuery::new(Point::new(0.0, 0.0), Point::new(5.0, 0.0));
        let outcome = AStarSolver::default().shortest_path(&field, &query);
        let expected = 2.0 * 5.0f64.sqrt() + 1.0;
        assert!((outcome.length().unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_never_shorter_than_visibility_graph() {
        let field = grid_of_pads(6);
        let query = PathQuery::new(Point::new(0.0, -0.3), Point::new(14.0, 0.1));
        let exact = VisibilityGraphSolver::default()
            .shortest_path(&field, &query)
            .length()
            .unwrap();
        if let Some(approx) = AStarSolver::default().shortest_path(&field, &query).length() {
            assert!(approx + 1e-9 >= exact);
        }
    }

    #[test]
    fn test_iteration_cap() {
        let field = grid_of_pads(6);
        let solver = AStarSolver {
            neighbors: 4,
            iteration_cap: 1,
            stall_limit: 1000,
        };
        // Straight line runs through a pad row, goal far behind the grid
        let query = PathQuery::new(Point::new(0.0, 0.9), Point::new(20.0, 0.9));
        let outcome = solver.shortest_path(&field, &query);
        assert!(matches!(
            outcome,
            SolveOutcome::NotFound {
                limit: SearchLimit::IterationCap,
                ..
            }
        ));
    }
}
