//! Constraint graph held inside the solver.
//!
//! Nodes are poses keyed by the mapper's vertex ids; edges are relative
//! pose constraints; priors pin single nodes to absolute poses (used for
//! manual relocations).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::types::Pose2D;

/// Information matrix (inverse covariance) for 2D pose.
///
/// Stored as the upper triangle of a 3x3 symmetric matrix:
/// ```text
/// | xx  xy  xt |
/// | xy  yy  yt |
/// | xt  yt  tt |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Information2D {
    pub xx: f32,
    pub xy: f32,
    pub xt: f32,
    pub yy: f32,
    pub yt: f32,
    pub tt: f32,
}

impl Information2D {
    pub fn diagonal(xx: f32, yy: f32, tt: f32) -> Self {
        Self {
            xx,
            xy: 0.0,
            xt: 0.0,
            yy,
            yt: 0.0,
            tt,
        }
    }

    /// Isotropic position noise plus heading noise.
    pub fn from_std_dev(sigma_xy: f32, sigma_theta: f32) -> Self {
        let pos = 1.0 / (sigma_xy * sigma_xy);
        Self::diagonal(pos, pos, 1.0 / (sigma_theta * sigma_theta))
    }

    /// Row-major 3x3 in double precision.
    pub(crate) fn to_matrix(self) -> [f64; 9] {
        [
            self.xx as f64,
            self.xy as f64,
            self.xt as f64,
            self.xy as f64,
            self.yy as f64,
            self.yt as f64,
            self.xt as f64,
            self.yt as f64,
            self.tt as f64,
        ]
    }
}

impl Default for Information2D {
    fn default() -> Self {
        // 10cm position, ~5 degree heading
        Self::from_std_dev(0.1, 0.087)
    }
}

#[derive(Debug, Clone)]
pub struct PoseNode {
    pub id: u64,
    pub pose: Pose2D,
    /// Held constant by the optimizer (gauge anchor).
    pub fixed: bool,
}

/// Relative constraint: `measurement ≈ from⁻¹ ⊕ to`.
#[derive(Debug, Clone)]
pub struct PoseEdge {
    pub from: u64,
    pub to: u64,
    pub measurement: Pose2D,
    pub information: Information2D,
}

/// Absolute constraint on one node.
#[derive(Debug, Clone)]
pub struct PosePrior {
    pub node: u64,
    pub pose: Pose2D,
    pub information: Information2D,
}

#[derive(Debug, Default)]
pub struct PoseGraph {
    nodes: Vec<PoseNode>,
    edges: Vec<PoseEdge>,
    priors: Vec<PosePrior>,
    node_index: HashMap<u64, usize>,
}

impl PoseGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, or overwrite the pose of an existing one.
    pub fn add_node(&mut self, id: u64, pose: Pose2D) {
        if let Some(&idx) = self.node_index.get(&id) {
            self.nodes[idx].pose = pose;
            return;
        }
        self.node_index.insert(id, self.nodes.len());
        self.nodes.push(PoseNode {
            id,
            pose,
            fixed: false,
        });
    }

    /// Remove a node with its edges and prior.
    pub fn remove_node(&mut self, id: u64) -> bool {
        let Some(idx) = self.node_index.remove(&id) else {
            return false;
        };
        self.nodes.remove(idx);
        for slot in self.node_index.values_mut() {
            if *slot > idx {
                *slot -= 1;
            }
        }
        self.edges.retain(|e| e.from != id && e.to != id);
        self.priors.retain(|p| p.node != id);
        true
    }

    /// Add a relative constraint. Both endpoints must exist.
    pub fn add_edge(&mut self, edge: PoseEdge) -> bool {
        if !self.node_index.contains_key(&edge.from) || !self.node_index.contains_key(&edge.to) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    /// Pin a node, replacing any earlier prior on it.
    pub fn set_prior(&mut self, node: u64, pose: Pose2D, information: Information2D) {
        self.priors.retain(|p| p.node != node);
        self.priors.push(PosePrior {
            node,
            pose,
            information,
        });
    }

    pub fn get_node(&self, id: u64) -> Option<&PoseNode> {
        self.node_index.get(&id).map(|&idx| &self.nodes[idx])
    }

    pub fn get_node_mut(&mut self, id: u64) -> Option<&mut PoseNode> {
        self.node_index.get(&id).map(|&idx| &mut self.nodes[idx])
    }

    pub fn get_node_index(&self, id: u64) -> Option<usize> {
        self.node_index.get(&id).copied()
    }

    pub fn nodes(&self) -> &[PoseNode] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [PoseNode] {
        &mut self.nodes
    }

    pub fn edges(&self) -> &[PoseEdge] {
        &self.edges
    }

    pub fn priors(&self) -> &[PosePrior] {
        &self.priors
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.priors.clear();
        self.node_index.clear();
    }

    /// Fix the first node (anchor for optimization).
    pub fn fix_first_node(&mut self) {
        if let Some(node) = self.nodes.first_mut() {
            node.fixed = true;
        }
    }
}
