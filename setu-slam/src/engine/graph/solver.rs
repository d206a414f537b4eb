//! Solver seam between the mapper and the optimizer.

use serde::Deserialize;

use crate::core::types::Pose2D;

use super::optimizer::{GraphOptimizer, GraphOptimizerConfig, OptimizationResult};
use super::pose_graph::{Information2D, PoseEdge, PoseGraph};
use super::scan_graph::ScanEdge;

/// Back end that owns the optimization problem.
///
/// The mapper feeds it vertices and constraints as they are created; the
/// session drives `compute` and reads the optimized embedding back.
pub trait ScanSolver: Send {
    fn add_node(&mut self, id: u64, pose: Pose2D);

    fn add_constraint(&mut self, edge: &ScanEdge);

    fn remove_node(&mut self, id: u64);

    /// Relocate a node. The heading is interpreted relative to the node's
    /// current heading. Returns false for unknown ids.
    fn modify_node(&mut self, id: u64, pose: Pose2D) -> bool;

    fn node_orientation(&self, id: u64) -> Option<f32>;

    /// Current optimized pose of every node.
    fn node_poses(&self) -> Vec<(u64, Pose2D)>;

    fn compute(&mut self);

    /// Drop every node and constraint.
    fn reset(&mut self);

    fn node_count(&self) -> usize;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub max_iterations: u32,
    pub convergence_threshold: f64,
    pub damping_factor: f64,
    pub use_levenberg_marquardt: bool,
    /// Standard deviation (m) of the prior that holds a manually moved node.
    pub manual_position_std_dev: f32,
    /// Standard deviation (rad) of the same prior.
    pub manual_heading_std_dev: f32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            convergence_threshold: 1e-6,
            damping_factor: 1e-3,
            use_levenberg_marquardt: true,
            manual_position_std_dev: 0.01,
            manual_heading_std_dev: 0.01,
        }
    }
}

impl SolverConfig {
    pub fn optimizer_config(&self) -> GraphOptimizerConfig {
        GraphOptimizerConfig {
            max_iterations: self.max_iterations,
            convergence_threshold: self.convergence_threshold,
            damping_factor: self.damping_factor,
            use_levenberg_marquardt: self.use_levenberg_marquardt,
        }
    }
}

/// Levenberg-Marquardt solver over a dense [`PoseGraph`].
///
/// The first node ever added anchors the gauge.
pub struct GaussNewtonSolver {
    config: SolverConfig,
    graph: PoseGraph,
    optimizer: GraphOptimizer,
    last_result: Option<OptimizationResult>,
}

impl GaussNewtonSolver {
    pub fn new(config: SolverConfig) -> Self {
        let optimizer = GraphOptimizer::new(config.optimizer_config());
        Self {
            config,
            graph: PoseGraph::new(),
            optimizer,
            last_result: None,
        }
    }

    pub fn last_result(&self) -> Option<&OptimizationResult> {
        self.last_result.as_ref()
    }

    pub fn graph(&self) -> &PoseGraph {
        &self.graph
    }
}

impl ScanSolver for GaussNewtonSolver {
    fn add_node(&mut self, id: u64, pose: Pose2D) {
        self.graph.add_node(id, pose);
        if self.graph.num_nodes() == 1 {
            self.graph.fix_first_node();
        }
    }

    fn add_constraint(&mut self, edge: &ScanEdge) {
        let added = self.graph.add_edge(PoseEdge {
            from: edge.source,
            to: edge.target,
            measurement: edge.measurement,
            information: edge.information,
        });
        if !added {
            log::warn!(
                "Skipping constraint {} -> {}: endpoint not in solver",
                edge.source,
                edge.target
            );
        }
    }

    fn remove_node(&mut self, id: u64) {
        self.graph.remove_node(id);
    }

    fn modify_node(&mut self, id: u64, pose: Pose2D) -> bool {
        let Some(node) = self.graph.get_node_mut(id) else {
            return false;
        };
        let target = Pose2D::new(pose.x, pose.y, node.pose.theta + pose.theta);
        node.pose = target;
        let information = Information2D::from_std_dev(
            self.config.manual_position_std_dev,
            self.config.manual_heading_std_dev,
        );
        self.graph.set_prior(id, target, information);
        true
    }

    fn node_orientation(&self, id: u64) -> Option<f32> {
        self.graph.get_node(id).map(|n| n.pose.theta)
    }

    fn node_poses(&self) -> Vec<(u64, Pose2D)> {
        self.graph.nodes().iter().map(|n| (n.id, n.pose)).collect()
    }

    fn compute(&mut self) {
        let result = self.optimizer.optimize(&mut self.graph);
        log::debug!(
            "Optimized {} nodes / {} edges: chi² {:.4} -> {:.4} in {} iterations ({:?})",
            self.graph.num_nodes(),
            self.graph.num_edges(),
            result.initial_error,
            result.final_error,
            result.iterations,
            result.termination_reason
        );
        self.last_result = Some(result);
    }

    fn reset(&mut self) {
        self.graph.clear();
        self.last_result = None;
    }

    fn node_count(&self) -> usize {
        self.graph.num_nodes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::graph::scan_graph::EdgeKind;
    use approx::assert_relative_eq;

    fn constraint(source: u64, target: u64, dx: f32) -> ScanEdge {
        ScanEdge {
            source,
            target,
            measurement: Pose2D::new(dx, 0.0, 0.0),
            information: Information2D::default(),
            kind: EdgeKind::Odometry,
        }
    }

    #[test]
    fn test_first_node_anchors_gauge() {
        let mut solver = GaussNewtonSolver::new(SolverConfig::default());
        solver.add_node(3, Pose2D::identity());
        solver.add_node(4, Pose2D::new(1.0, 0.0, 0.0));

        assert!(solver.graph().get_node(3).unwrap().fixed);
        assert!(!solver.graph().get_node(4).unwrap().fixed);
    }

    #[test]
    fn test_modify_node_heading_is_relative() {
        let mut solver = GaussNewtonSolver::new(SolverConfig::default());
        solver.add_node(0, Pose2D::identity());
        solver.add_node(1, Pose2D::new(1.0, 0.0, 0.5));

        assert!(solver.modify_node(1, Pose2D::new(2.0, 1.0, 0.25)));
        assert_relative_eq!(solver.node_orientation(1).unwrap(), 0.75, epsilon = 1e-6);
        assert!(!solver.modify_node(9, Pose2D::identity()));
    }

    #[test]
    fn test_manual_move_survives_compute() {
        let mut solver = GaussNewtonSolver::new(SolverConfig::default());
        for id in 0..3 {
            solver.add_node(id, Pose2D::new(id as f32, 0.0, 0.0));
        }
        solver.add_constraint(&constraint(0, 1, 1.0));
        solver.add_constraint(&constraint(1, 2, 1.0));

        solver.modify_node(2, Pose2D::new(2.0, 0.5, 0.0));
        solver.compute();

        let moved = solver
            .node_poses()
            .into_iter()
            .find(|(id, _)| *id == 2)
            .map(|(_, p)| p)
            .unwrap();
        assert!(moved.y > 0.4, "manual move was undone: {:?}", moved);
        assert!(solver.last_result().is_some());
    }

    #[test]
    fn test_dangling_constraint_is_skipped() {
        let mut solver = GaussNewtonSolver::new(SolverConfig::default());
        solver.add_node(0, Pose2D::identity());
        solver.add_constraint(&constraint(0, 5, 1.0));

        assert_eq!(solver.graph().num_edges(), 0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut solver = GaussNewtonSolver::new(SolverConfig::default());
        solver.add_node(0, Pose2D::identity());
        solver.compute();
        solver.reset();

        assert_eq!(solver.node_count(), 0);
        assert!(solver.last_result().is_none());
    }
}
