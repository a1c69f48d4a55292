//! Solver selection by obstacle and corner count

use super::astar::AStarSolver;
use super::visibility::VisibilityGraphSolver;
use super::PathSolver;
use crate::config::SearchConfig;

/// Exact visibility graph for small fields, bounded A* for the rest
///
/// A field is small when it has fewer than `threshold` obstacles and fewer
/// than `vertex_threshold` corners. One poured zone can carry more corners
/// than a hundred pads.
#[derive(Debug, Clone)]
pub struct SolverPolicy {
    threshold: usize,
    vertex_threshold: usize,
    sparse: VisibilityGraphSolver,
    dense: AStarSolver,
}

impl SolverPolicy {
    pub fn new(
        threshold: usize,
        vertex_threshold: usize,
        sparse: VisibilityGraphSolver,
        dense: AStarSolver,
    ) -> Self {
        Self {
            threshold,
            vertex_threshold,
            sparse,
            dense,
        }
    }

    pub fn from_config(search: &SearchConfig) -> Self {
        Self::new(
            search.sparse_threshold,
            search.sparse_vertex_threshold,
            VisibilityGraphSolver::default(),
            AStarSolver::from_config(search),
        )
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn vertex_threshold(&self) -> usize {
        self.vertex_threshold
    }

    pub fn choose(&self, obstacle_count: usize, vertex_count: usize) -> &dyn PathSolver {
        if obstacle_count < self.threshold && vertex_count < self.vertex_threshold {
            &self.sparse
        } else {
            &self.dense
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::creepage::SolverKind;

    #[test]
    fn test_threshold_boundary() {
        let policy = SolverPolicy::from_config(&SearchConfig::default());
        assert_eq!(policy.choose(0, 0).kind(), SolverKind::VisibilityGraph);
        assert_eq!(policy.choose(99, 400).kind(), SolverKind::VisibilityGraph);
        assert_eq!(policy.choose(100, 400).kind(), SolverKind::AStar);
    }

    #[test]
    fn test_many_corners_go_dense() {
        // A single zone outline with 1200 corners
        let policy = SolverPolicy::from_config(&SearchConfig::default());
        assert_eq!(policy.choose(1, 1200).kind(), SolverKind::AStar);
        let limit = policy.vertex_threshold();
        assert_eq!(policy.choose(1, limit - 1).kind(), SolverKind::VisibilityGraph);
        assert_eq!(policy.choose(1, limit).kind(), SolverKind::AStar);
    }

    #[test]
    fn test_zero_threshold_always_dense() {
        let policy = SolverPolicy::new(
            0,
            1000,
            VisibilityGraphSolver::default(),
            AStarSolver::default(),
        );
        assert_eq!(policy.choose(0, 0).kind(), SolverKind::AStar);
    }
}
