//! Nonlinear least-squares over the solver's pose graph.
//!
//! Minimizes
//!
//! ```text
//! F(x) = Σ_edges  e_ij^T Ω_ij e_ij  +  Σ_priors  e_k^T Ω_k e_k
//!
//!   e_ij = (x_i⁻¹ ⊕ x_j) ⊖ z_ij        relative constraint
//!   e_k  =  x_k ⊖ z_k                  absolute prior
//! ```
//!
//! Each iteration solves the damped normal equations `(H + λD) Δx = -b`
//! with a dense Cholesky factorization. Fixed nodes are removed from the
//! system by pinning their rows to the identity.

use crate::core::math::normalize_angle_f64;
use crate::core::types::Pose2D;

use super::pose_graph::{Information2D, PoseGraph};

#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub iterations: u32,
    pub initial_error: f64,
    pub final_error: f64,
    pub converged: bool,
    pub termination_reason: TerminationReason,
}

impl OptimizationResult {
    fn finished(
        iterations: u32,
        initial_error: f64,
        final_error: f64,
        termination_reason: TerminationReason,
    ) -> Self {
        Self {
            iterations,
            initial_error,
            final_error,
            converged: matches!(
                termination_reason,
                TerminationReason::Converged | TerminationReason::NoConstraints
            ),
            termination_reason,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Relative error change fell below threshold.
    Converged,
    MaxIterations,
    /// Damping grew without finding a descent step.
    Diverged,
    /// Normal equations not positive definite.
    SolveFailed,
    /// Nothing constrains the graph.
    NoConstraints,
}

#[derive(Debug, Clone)]
pub struct GraphOptimizerConfig {
    pub max_iterations: u32,
    /// Relative chi² change that counts as convergence.
    pub convergence_threshold: f64,
    /// Initial Levenberg-Marquardt λ.
    pub damping_factor: f64,
    pub use_levenberg_marquardt: bool,
}

impl Default for GraphOptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            convergence_threshold: 1e-6,
            damping_factor: 1e-3,
            use_levenberg_marquardt: true,
        }
    }
}

const MAX_DAMPING: f64 = 1e10;
const MIN_DAMPING: f64 = 1e-10;

pub struct GraphOptimizer {
    config: GraphOptimizerConfig,
}

impl GraphOptimizer {
    pub fn new(config: GraphOptimizerConfig) -> Self {
        Self { config }
    }

    /// Optimize node poses in place.
    pub fn optimize(&self, graph: &mut PoseGraph) -> OptimizationResult {
        if graph.num_edges() == 0 && graph.priors().is_empty() {
            return OptimizationResult::finished(0, 0.0, 0.0, TerminationReason::NoConstraints);
        }

        let dim = graph.num_nodes() * 3;
        let initial_error = chi_squared(graph);
        let mut current_error = initial_error;
        let mut lambda = self.config.damping_factor;
        let mut iterations = 0;

        for iter in 0..self.config.max_iterations {
            iterations = iter + 1;

            let (mut h, mut b) = build_linear_system(graph, dim);
            if self.config.use_levenberg_marquardt {
                for i in 0..dim {
                    h[i * dim + i] += lambda * h[i * dim + i].max(1.0);
                }
            }
            pin_fixed_nodes(graph, &mut h, &mut b, dim);

            let Some(dx) = solve_cholesky(&h, &b, dim) else {
                return OptimizationResult::finished(
                    iterations,
                    initial_error,
                    current_error,
                    TerminationReason::SolveFailed,
                );
            };

            let backup: Vec<Pose2D> = graph.nodes().iter().map(|n| n.pose).collect();
            apply_update(graph, &dx);
            let new_error = chi_squared(graph);

            if new_error > current_error {
                for (node, pose) in graph.nodes_mut().iter_mut().zip(backup) {
                    node.pose = pose;
                }
                if !self.config.use_levenberg_marquardt {
                    return OptimizationResult::finished(
                        iterations,
                        initial_error,
                        current_error,
                        TerminationReason::Diverged,
                    );
                }
                lambda *= 10.0;
                if lambda > MAX_DAMPING {
                    return OptimizationResult::finished(
                        iterations,
                        initial_error,
                        current_error,
                        TerminationReason::Diverged,
                    );
                }
                continue;
            }

            if self.config.use_levenberg_marquardt {
                lambda = (lambda * 0.1).max(MIN_DAMPING);
            }

            let relative_change = (current_error - new_error) / current_error.max(1e-12);
            current_error = new_error;
            if relative_change < self.config.convergence_threshold {
                return OptimizationResult::finished(
                    iterations,
                    initial_error,
                    current_error,
                    TerminationReason::Converged,
                );
            }
        }

        OptimizationResult::finished(
            iterations,
            initial_error,
            current_error,
            TerminationReason::MaxIterations,
        )
    }
}

/// Total weighted squared error of all constraints.
pub fn chi_squared(graph: &PoseGraph) -> f64 {
    let mut chi2 = 0.0;

    for edge in graph.edges() {
        let (Some(xi), Some(xj)) = (graph.get_node(edge.from), graph.get_node(edge.to)) else {
            continue;
        };
        let error = edge_error(&xi.pose, &xj.pose, &edge.measurement);
        chi2 += mahalanobis(&error, &edge.information);
    }

    for prior in graph.priors() {
        let Some(node) = graph.get_node(prior.node) else {
            continue;
        };
        let error = prior_error(&node.pose, &prior.pose);
        chi2 += mahalanobis(&error, &prior.information);
    }

    chi2
}

fn edge_error(xi: &Pose2D, xj: &Pose2D, measurement: &Pose2D) -> [f64; 3] {
    let predicted = xi.between(xj);
    [
        (predicted.x - measurement.x) as f64,
        (predicted.y - measurement.y) as f64,
        normalize_angle_f64((predicted.theta - measurement.theta) as f64),
    ]
}

fn prior_error(x: &Pose2D, target: &Pose2D) -> [f64; 3] {
    [
        (x.x - target.x) as f64,
        (x.y - target.y) as f64,
        normalize_angle_f64((x.theta - target.theta) as f64),
    ]
}

fn mahalanobis(error: &[f64; 3], info: &Information2D) -> f64 {
    let omega = info.to_matrix();
    let weighted = mat3_vec(&omega, error);
    error[0] * weighted[0] + error[1] * weighted[1] + error[2] * weighted[2]
}

/// Jacobians of `edge_error` with respect to `xi` and `xj` (row-major 3x3).
fn edge_jacobians(xi: &Pose2D, xj: &Pose2D) -> ([f64; 9], [f64; 9]) {
    let (sin_i, cos_i) = (xi.theta as f64).sin_cos();
    let dx = (xj.x - xi.x) as f64;
    let dy = (xj.y - xi.y) as f64;

    let ji = [
        -cos_i,
        -sin_i,
        -sin_i * dx + cos_i * dy,
        sin_i,
        -cos_i,
        -cos_i * dx - sin_i * dy,
        0.0,
        0.0,
        -1.0,
    ];
    let jj = [cos_i, sin_i, 0.0, -sin_i, cos_i, 0.0, 0.0, 0.0, 1.0];

    (ji, jj)
}

fn build_linear_system(graph: &PoseGraph, dim: usize) -> (Vec<f64>, Vec<f64>) {
    let mut h = vec![0.0; dim * dim];
    let mut b = vec![0.0; dim];

    for edge in graph.edges() {
        let (Some(i), Some(j)) = (
            graph.get_node_index(edge.from),
            graph.get_node_index(edge.to),
        ) else {
            continue;
        };
        let xi = &graph.nodes()[i].pose;
        let xj = &graph.nodes()[j].pose;

        let error = edge_error(xi, xj, &edge.measurement);
        let (ji, jj) = edge_jacobians(xi, xj);
        let omega = edge.information.to_matrix();

        let omega_ji = mat3_mul(&omega, &ji);
        let omega_jj = mat3_mul(&omega, &jj);
        let h_ii = mat3_transpose_mul(&ji, &omega_ji);
        let h_ij = mat3_transpose_mul(&ji, &omega_jj);
        let h_jj = mat3_transpose_mul(&jj, &omega_jj);

        let (bi, bj) = (i * 3, j * 3);
        for r in 0..3 {
            for c in 0..3 {
                h[(bi + r) * dim + bi + c] += h_ii[r * 3 + c];
                h[(bi + r) * dim + bj + c] += h_ij[r * 3 + c];
                h[(bj + r) * dim + bi + c] += h_ij[c * 3 + r];
                h[(bj + r) * dim + bj + c] += h_jj[r * 3 + c];
            }
        }

        let omega_e = mat3_vec(&omega, &error);
        for r in 0..3 {
            b[bi + r] += ji[r] * omega_e[0] + ji[3 + r] * omega_e[1] + ji[6 + r] * omega_e[2];
            b[bj + r] += jj[r] * omega_e[0] + jj[3 + r] * omega_e[1] + jj[6 + r] * omega_e[2];
        }
    }

    // Prior Jacobian is the identity: H += Ω, b += Ω e.
    for prior in graph.priors() {
        let Some(k) = graph.get_node_index(prior.node) else {
            continue;
        };
        let error = prior_error(&graph.nodes()[k].pose, &prior.pose);
        let omega = prior.information.to_matrix();
        let omega_e = mat3_vec(&omega, &error);
        let bk = k * 3;
        for r in 0..3 {
            for c in 0..3 {
                h[(bk + r) * dim + bk + c] += omega[r * 3 + c];
            }
            b[bk + r] += omega_e[r];
        }
    }

    (h, b)
}

fn pin_fixed_nodes(graph: &PoseGraph, h: &mut [f64], b: &mut [f64], dim: usize) {
    for (idx, node) in graph.nodes().iter().enumerate() {
        if !node.fixed {
            continue;
        }
        for r in idx * 3..idx * 3 + 3 {
            for c in 0..dim {
                h[r * dim + c] = 0.0;
                h[c * dim + r] = 0.0;
            }
            h[r * dim + r] = 1.0;
            b[r] = 0.0;
        }
    }
}

fn apply_update(graph: &mut PoseGraph, dx: &[f64]) {
    for (idx, node) in graph.nodes_mut().iter_mut().enumerate() {
        if node.fixed {
            continue;
        }
        let base = idx * 3;
        node.pose = Pose2D::new(
            node.pose.x + dx[base] as f32,
            node.pose.y + dx[base + 1] as f32,
            node.pose.theta + dx[base + 2] as f32,
        );
    }
}

/// Solve `H Δx = -b` via dense Cholesky.
fn solve_cholesky(h: &[f64], b: &[f64], dim: usize) -> Option<Vec<f64>> {
    let mut l = vec![0.0; dim * dim];

    for i in 0..dim {
        for j in 0..=i {
            let mut sum = h[i * dim + j];
            for k in 0..j {
                sum -= l[i * dim + k] * l[j * dim + k];
            }
            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                l[i * dim + j] = sum.sqrt();
            } else {
                l[i * dim + j] = sum / l[j * dim + j];
            }
        }
    }

    let mut y = vec![0.0; dim];
    for i in 0..dim {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i * dim + j] * y[j];
        }
        y[i] = sum / l[i * dim + i];
    }

    let mut x = vec![0.0; dim];
    for i in (0..dim).rev() {
        let mut sum = y[i];
        for j in (i + 1)..dim {
            sum -= l[j * dim + i] * x[j];
        }
        x[i] = sum / l[i * dim + i];
    }

    Some(x.into_iter().map(|v| -v).collect())
}

fn mat3_vec(m: &[f64; 9], v: &[f64; 3]) -> [f64; 3] {
    [
        m[0] * v[0] + m[1] * v[1] + m[2] * v[2],
        m[3] * v[0] + m[4] * v[1] + m[5] * v[2],
        m[6] * v[0] + m[7] * v[1] + m[8] * v[2],
    ]
}

fn mat3_mul(a: &[f64; 9], b: &[f64; 9]) -> [f64; 9] {
    let mut out = [0.0; 9];
    for r in 0..3 {
        for c in 0..3 {
            out[r * 3 + c] = (0..3).map(|k| a[r * 3 + k] * b[k * 3 + c]).sum();
        }
    }
    out
}

/// `aᵀ · b`
fn mat3_transpose_mul(a: &[f64; 9], b: &[f64; 9]) -> [f64; 9] {
    let mut out = [0.0; 9];
    for r in 0..3 {
        for c in 0..3 {
            out[r * 3 + c] = (0..3).map(|k| a[k * 3 + r] * b[k * 3 + c]).sum();
        }
    }
    out
}
