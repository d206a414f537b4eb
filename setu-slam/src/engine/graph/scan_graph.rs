//! Persistent pose graph owned by the mapper.
//!
//! Vertices live in an arena indexed by id. Removing a vertex leaves an
//! empty slot so ids stay stable; archives preserve the holes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::types::{LocalizedScan, Pose2D};

use super::pose_graph::Information2D;

/// How a constraint was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    Odometry,
    Dock,
    NearRegion,
    Localization,
    LoopClosure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanVertex {
    pub id: u64,
    pub sensor: String,
    /// Position of this scan in its sensor's sequence.
    pub state_id: u64,
    pub stamp_us: u64,
    pub odometric: Pose2D,
    pub corrected: Pose2D,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEdge {
    pub source: u64,
    pub target: u64,
    pub measurement: Pose2D,
    pub information: Information2D,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanGraph {
    vertices: Vec<Option<ScanVertex>>,
    edges: Vec<ScanEdge>,
    next_state_ids: BTreeMap<String, u64>,
}

impl ScanGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a vertex for `scan` and return its id.
    pub fn add_vertex(&mut self, scan: &LocalizedScan) -> u64 {
        let id = self.vertices.len() as u64;
        let counter = self.next_state_ids.entry(scan.sensor.clone()).or_insert(0);
        let state_id = *counter;
        *counter += 1;

        self.vertices.push(Some(ScanVertex {
            id,
            sensor: scan.sensor.clone(),
            state_id,
            stamp_us: scan.stamp_us,
            odometric: scan.odometric,
            corrected: scan.corrected,
        }));
        id
    }

    /// Empty a vertex slot and drop its edges.
    pub fn remove_vertex(&mut self, id: u64) -> Option<ScanVertex> {
        let removed = self.vertices.get_mut(id as usize)?.take()?;
        self.edges.retain(|e| e.source != id && e.target != id);
        Some(removed)
    }

    pub fn add_edge(&mut self, edge: ScanEdge) {
        self.edges.push(edge);
    }

    pub fn vertex(&self, id: u64) -> Option<&ScanVertex> {
        self.vertices.get(id as usize)?.as_ref()
    }

    pub fn vertex_mut(&mut self, id: u64) -> Option<&mut ScanVertex> {
        self.vertices.get_mut(id as usize)?.as_mut()
    }

    /// Live vertices in id order.
    pub fn vertices(&self) -> impl Iterator<Item = &ScanVertex> {
        self.vertices.iter().flatten()
    }

    /// All slots, including removed ones.
    pub fn slots(&self) -> &[Option<ScanVertex>] {
        &self.vertices
    }

    pub fn edges(&self) -> &[ScanEdge] {
        &self.edges
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices().count()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_count() == 0
    }

    pub fn first_vertex(&self) -> Option<&ScanVertex> {
        self.vertices().next()
    }

    /// Most recent live vertex produced by `sensor`.
    pub fn last_vertex_of(&self, sensor: &str) -> Option<&ScanVertex> {
        self.vertices
            .iter()
            .rev()
            .flatten()
            .find(|v| v.sensor == sensor)
    }

    /// Closest live vertex to `pose` within `radius`, ignoring `exclude`.
    pub fn nearest_vertex(&self, pose: &Pose2D, radius: f32, exclude: &[u64]) -> Option<&ScanVertex> {
        let limit = radius * radius;
        self.vertices()
            .filter(|v| !exclude.contains(&v.id))
            .map(|v| (v.corrected.distance_squared(pose), v))
            .filter(|(d, _)| *d <= limit)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, v)| v)
    }
}
