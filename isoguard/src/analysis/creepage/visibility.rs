//! Visibility graph + Dijkstra
//!
//! Nodes are the obstacle corners plus the two conductors; an edge joins
//! two nodes when the straight segment between them is obstacle free.
//! Shortest obstacle-avoiding paths only bend at convex corners, so reflex
//! corners are left out unless `exhaustive` is set.
//!
//! The default solver discovers edges while Dijkstra runs: a corner's
//! neighbours are only tested once it is settled, and never across a chord
//! of a convex obstacle. The exhaustive variant builds the complete graph
//! up front and serves as the reference.

use std::collections::BinaryHeap;

use petgraph::algo::astar;
use petgraph::graph::{NodeIndex, UnGraph};

use super::{Frontier, PathQuery, PathSolver, SearchLimit, SolveOutcome, SolverKind};
use crate::geometry::{ObstacleField, Point};

#[derive(Debug, Clone, Default)]
pub struct VisibilityGraphSolver {
    /// Every corner as a node and every edge tested without the grid
    pub exhaustive: bool,
}

impl VisibilityGraphSolver {
    pub fn exhaustive() -> Self {
        Self { exhaustive: true }
    }

    fn lazy_dijkstra(&self, field: &ObstacleField, query: &PathQuery<'_>) -> SolveOutcome {
        let vertices = field.vertices();
        let waypoints: Vec<usize> = (0..vertices.len()).filter(|&v| vertices[v].convex).collect();
        let target = waypoints.len();

        let mut dist = vec![f64::INFINITY; target + 1];
        let mut prev: Vec<Option<usize>> = vec![None; target + 1];
        let mut entry: Vec<Option<Point>> = vec![None; target + 1];
        let mut settled = vec![false; target + 1];
        let mut exit = query.goal;
        let mut heap = BinaryHeap::new();
        let mut tested = 1usize;

        if query.edge_clear(field, query.start, query.goal) {
            dist[target] = query.start.distance(&query.goal);
            entry[target] = Some(query.start);
            heap.push(Frontier {
                est: dist[target],
                cost: dist[target],
                node: target,
            });
        }
        for (k, &v) in waypoints.iter().enumerate() {
            tested += 1;
            if let Some((cost, at)) = query.enter(field, vertices[v].point) {
                dist[k] = cost;
                entry[k] = Some(at);
                heap.push(Frontier {
                    est: cost,
                    cost,
                    node: k,
                });
            }
        }

        while let Some(Frontier { cost, node, .. }) = heap.pop() {
            if settled[node] || cost > dist[node] {
                continue;
            }
            if node == target {
                let mut path = vec![exit];
                let mut first = entry[target];
                let mut cursor = prev[target];
                while let Some(k) = cursor {
                    path.push(vertices[waypoints[k]].point);
                    first = entry[k];
                    cursor = prev[k];
                }
                path.extend(first);
                path.reverse();
                path.dedup();
                return SolveOutcome::Found {
                    length: cost,
                    path,
                    iterations: tested,
                };
            }
            settled[node] = true;
            let here = vertices[waypoints[node]].point;

            tested += 1;
            if let Some((step, at)) = query.leave(field, here) {
                if cost + step < dist[target] {
                    dist[target] = cost + step;
                    prev[target] = Some(node);
                    entry[target] = None;
                    exit = at;
                    heap.push(Frontier {
                        est: dist[target],
                        cost: dist[target],
                        node: target,
                    });
                }
            }

            for (k, &v) in waypoints.iter().enumerate() {
                if settled[k] || field.hidden_chord(waypoints[node], v) {
                    continue;
                }
                let there = vertices[v].point;
                let next = cost + here.distance(&there);
                // Only pay for a visibility test when the edge could help
                if next >= dist[k] {
                    continue;
                }
                tested += 1;
                if field.segment_blocked(here, there, None) {
                    continue;
                }
                dist[k] = next;
                prev[k] = Some(node);
                entry[k] = None;
                heap.push(Frontier {
                    est: next,
                    cost: next,
                    node: k,
                });
            }
        }

        SolveOutcome::NotFound {
            limit: SearchLimit::Unreachable,
            iterations: tested,
        }
    }

    fn full_graph(&self, field: &ObstacleField, query: &PathQuery<'_>) -> SolveOutcome {
        let vertices = field.vertices();
        let mut graph: UnGraph<Point, f64> = UnGraph::with_capacity(vertices.len() + 2, 0);
        let source = graph.add_node(query.start);
        let target = graph.add_node(query.goal);
        let nodes: Vec<NodeIndex> = vertices.iter().map(|v| graph.add_node(v.point)).collect();
        let mut entries = vec![query.start; vertices.len()];
        let mut exits = vec![query.goal; vertices.len()];
        let mut tested = 1usize;

        if !field.segment_blocked_linear(query.start, query.goal, query.exempt) {
            graph.add_edge(source, target, query.start.distance(&query.goal));
        }
        for (i, v) in vertices.iter().enumerate() {
            tested += 2;
            if let Some((cost, at)) = query.enter(field, v.point) {
                graph.add_edge(source, nodes[i], cost);
                entries[i] = at;
            }
            if let Some((cost, at)) = query.leave(field, v.point) {
                graph.add_edge(nodes[i], target, cost);
                exits[i] = at;
            }
        }
        for i in 0..vertices.len() {
            for j in (i + 1)..vertices.len() {
                tested += 1;
                let (a, b) = (vertices[i].point, vertices[j].point);
                if !field.segment_blocked_linear(a, b, None) {
                    graph.add_edge(nodes[i], nodes[j], a.distance(&b));
                }
            }
        }

        // Zero heuristic: plain Dijkstra with early exit at the target
        let Some((length, route)) = astar(&graph, source, |n| n == target, |e| *e.weight(), |_| 0.0)
        else {
            return SolveOutcome::NotFound {
                limit: SearchLimit::Unreachable,
                iterations: tested,
            };
        };
        let corner = |n: NodeIndex| n.index() - 2;
        let mut path: Vec<Point> = route.iter().map(|&n| graph[n]).collect();
        if route.len() > 2 {
            path[0] = entries[corner(route[1])];
            let last = path.len() - 1;
            path[last] = exits[corner(route[route.len() - 2])];
        }
        path.dedup();
        SolveOutcome::Found {
            length,
            path,
            iterations: tested,
        }
    }
}

impl PathSolver for VisibilityGraphSolver {
    fn kind(&self) -> SolverKind {
        SolverKind::VisibilityGraph
    }

    fn shortest_path(&self, field: &ObstacleField, query: &PathQuery<'_>) -> SolveOutcome {
        if self.exhaustive {
            self.full_graph(field, query)
        } else {
            self.lazy_dijkstra(field, query)
        }
    }
}
