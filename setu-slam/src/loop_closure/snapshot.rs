//! Visualization data derived from the pose graph.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::core::types::{Point2D, Pose2D};
use crate::engine::graph::{ScanGraph, ScanSolver, ScanVertex};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// Rendering class of a graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeClass {
    /// Consecutive scans of one sensor
    Adjacent,
    /// Same sensor, non-consecutive
    Loop,
    /// Endpoints from different sensors
    CrossAgent,
}

impl EdgeClass {
    pub fn classify(source: &ScanVertex, target: &ScanVertex) -> Self {
        if source.sensor != target.sensor {
            EdgeClass::CrossAgent
        } else if source.state_id.abs_diff(target.state_id) > 1 {
            EdgeClass::Loop
        } else {
            EdgeClass::Adjacent
        }
    }

    pub fn color(self) -> Color {
        match self {
            EdgeClass::Adjacent => Color { r: 0.0, g: 0.7, b: 0.0, a: 0.3 },
            EdgeClass::Loop => Color { r: 0.0, g: 0.0, b: 0.7, a: 0.3 },
            EdgeClass::CrossAgent => Color { r: 0.7, g: 0.0, b: 0.0, a: 0.3 },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMarker {
    pub id: u64,
    pub sensor: String,
    pub pose: Pose2D,
    pub color: Color,
    /// Draggable in the viewer
    pub interactive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSegment {
    pub source: u64,
    pub target: u64,
    pub from: Point2D,
    pub to: Point2D,
    pub class: EdgeClass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub frame: String,
    pub nodes: Vec<NodeMarker>,
    pub edges: Vec<EdgeSegment>,
}

impl GraphSnapshot {
    pub fn count(&self, class: EdgeClass) -> usize {
        self.edges.iter().filter(|e| e.class == class).count()
    }

    pub fn node(&self, id: u64) -> Option<&NodeMarker> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Random but stable per-sensor colors.
pub struct SensorPalette {
    rng: StdRng,
    colors: HashMap<String, Color>,
}

impl SensorPalette {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            colors: HashMap::new(),
        }
    }

    /// Color for `sensor`, drawn on first request.
    pub fn color_for(&mut self, sensor: &str) -> Color {
        if let Some(color) = self.colors.get(sensor) {
            return *color;
        }
        let color = Color {
            r: self.rng.random_range(0..100) as f32 / 100.0,
            g: self.rng.random_range(0..100) as f32 / 100.0,
            b: self.rng.random_range(0..100) as f32 / 100.0,
            a: 1.0,
        };
        self.colors.insert(sensor.to_string(), color);
        color
    }
}

/// Build a snapshot, placing vertices at the solver's embedding when one
/// is available and at their stored corrected pose otherwise.
pub fn build_snapshot(
    graph: &ScanGraph,
    solver: Option<&dyn ScanSolver>,
    palette: &mut SensorPalette,
    frame: &str,
    interactive: bool,
) -> GraphSnapshot {
    let embedding: HashMap<u64, Pose2D> = solver
        .map(|s| s.node_poses().into_iter().collect())
        .unwrap_or_default();
    let pose_of = |v: &ScanVertex| embedding.get(&v.id).copied().unwrap_or(v.corrected);

    let nodes = graph
        .vertices()
        .map(|v| NodeMarker {
            id: v.id,
            sensor: v.sensor.clone(),
            pose: pose_of(v),
            color: palette.color_for(&v.sensor),
            interactive,
        })
        .collect();

    let edges = graph
        .edges()
        .iter()
        .filter_map(|e| {
            let source = graph.vertex(e.source)?;
            let target = graph.vertex(e.target)?;
            Some(EdgeSegment {
                source: e.source,
                target: e.target,
                from: pose_of(source).position(),
                to: pose_of(target).position(),
                class: EdgeClass::classify(source, target),
            })
        })
        .collect();

    GraphSnapshot {
        frame: frame.to_string(),
        nodes,
        edges,
    }
}
