//! Scan-to-graph mapping.
//!
//! [`PoseGraphMapper`] is the seam the session drives: one `process_*`
//! entry point per dispatch strategy, plus access to the owned graph and
//! solver. [`OdometryMapper`] is the in-crate implementation. It links
//! scans by odometry and anchoring rules only; scan matching is left to
//! alternative mappers behind the same trait.

use std::collections::VecDeque;

use serde::Deserialize;

use crate::core::types::{LocalizedScan, Pose2D};

use super::graph::{EdgeKind, Information2D, ScanEdge, ScanGraph, ScanSolver, ScanVertex};

/// Incremental pose-graph builder.
///
/// Every `process_*` method returns true when the scan became a vertex;
/// on success `scan.id` is set and `scan.corrected` holds the pose it was
/// placed at.
pub trait PoseGraphMapper: Send {
    /// Extend the graph from the previous scan of the same sensor.
    fn process(&mut self, scan: &mut LocalizedScan) -> bool;

    /// Anchor the scan to the graph's first vertex.
    fn process_at_dock(&mut self, scan: &mut LocalizedScan) -> bool;

    /// Anchor the scan to an existing vertex near its (pre-set) pose.
    fn process_near_region(&mut self, scan: &mut LocalizedScan) -> bool;

    /// Track against the map without growing it permanently.
    fn process_localization(&mut self, scan: &mut LocalizedScan) -> bool;

    /// Run the solver and write the optimized poses back into the graph.
    fn correct_poses(&mut self);

    fn graph(&self) -> &ScanGraph;

    fn solver(&self) -> Option<&(dyn ScanSolver + 'static)>;

    fn solver_mut(&mut self) -> Option<&mut (dyn ScanSolver + 'static)>;

    fn set_solver(&mut self, solver: Box<dyn ScanSolver>);

    fn take_solver(&mut self) -> Option<Box<dyn ScanSolver>>;

    fn sensor_of(&self, node: u64) -> Option<&str> {
        self.graph().vertex(node).map(|v| v.sensor.as_str())
    }

    /// Corrected pose of any node the mapper still tracks, temporary
    /// localization nodes included.
    fn node_pose(&self, node: u64) -> Option<Pose2D> {
        self.graph().vertex(node).map(|v| v.corrected)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Standard deviation (m) assigned to generated links.
    pub link_position_std_dev: f32,
    /// Standard deviation (rad) assigned to generated links.
    pub link_heading_std_dev: f32,
    /// Search radius (m) when anchoring near a given pose.
    pub near_region_radius: f32,
    /// Temporary localization vertices kept outside the persistent graph.
    pub localization_buffer_size: usize,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            link_position_std_dev: 0.05,
            link_heading_std_dev: 0.05,
            near_region_radius: 3.0,
            localization_buffer_size: 10,
        }
    }
}

pub struct OdometryMapper {
    config: MapperConfig,
    graph: ScanGraph,
    solver: Option<Box<dyn ScanSolver>>,
    /// Never archived; ids continue past the graph's slots.
    localization: VecDeque<ScanVertex>,
    next_localization_id: u64,
}

impl OdometryMapper {
    pub fn new(config: MapperConfig, solver: Box<dyn ScanSolver>) -> Self {
        Self {
            config,
            graph: ScanGraph::new(),
            solver: Some(solver),
            localization: VecDeque::new(),
            next_localization_id: 0,
        }
    }

    /// Rebuild a mapper around a deserialized graph. The solver is
    /// installed later by the session.
    pub fn from_graph(graph: ScanGraph, config: MapperConfig) -> Self {
        Self {
            config,
            graph,
            solver: None,
            localization: VecDeque::new(),
            next_localization_id: 0,
        }
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    fn link_information(&self) -> Information2D {
        Information2D::from_std_dev(
            self.config.link_position_std_dev,
            self.config.link_heading_std_dev,
        )
    }

    /// Temporary vertices currently tracked by localization, oldest first.
    pub fn localization_vertices(&self) -> impl Iterator<Item = &ScanVertex> {
        self.localization.iter()
    }

    /// Add `scan` as a vertex, optionally constrained to `anchor`.
    fn insert(&mut self, scan: &mut LocalizedScan, anchor: Option<(u64, Pose2D, EdgeKind)>) -> u64 {
        self.clear_localization();
        let id = self.graph.add_vertex(scan);
        scan.id = Some(id);
        if let Some(solver) = self.solver.as_deref_mut() {
            solver.add_node(id, scan.corrected);
        }

        if let Some((source, source_pose, kind)) = anchor {
            let edge = ScanEdge {
                source,
                target: id,
                measurement: source_pose.between(&scan.corrected),
                information: self.link_information(),
                kind,
            };
            if let Some(solver) = self.solver.as_deref_mut() {
                solver.add_constraint(&edge);
            }
            self.graph.add_edge(edge);
        }
        id
    }

    fn evict_localization_nodes(&mut self) {
        while self.localization.len() > self.config.localization_buffer_size {
            let Some(old) = self.localization.pop_front() else {
                break;
            };
            if let Some(solver) = self.solver.as_deref_mut() {
                solver.remove_node(old.id);
            }
        }
    }

    fn clear_localization(&mut self) {
        while let Some(old) = self.localization.pop_front() {
            if let Some(solver) = self.solver.as_deref_mut() {
                solver.remove_node(old.id);
            }
        }
    }
}

impl PoseGraphMapper for OdometryMapper {
    fn process(&mut self, scan: &mut LocalizedScan) -> bool {
        let previous = self
            .graph
            .last_vertex_of(&scan.sensor)
            .map(|v| (v.id, v.odometric, v.corrected));

        match previous {
            Some((id, odometric, corrected)) => {
                let delta = odometric.between(&scan.odometric);
                scan.corrected = corrected.compose(&delta);
                self.insert(scan, Some((id, corrected, EdgeKind::Odometry)));
            }
            None => {
                self.insert(scan, None);
            }
        }
        true
    }

    fn process_at_dock(&mut self, scan: &mut LocalizedScan) -> bool {
        let Some(dock) = self.graph.first_vertex().map(|v| (v.id, v.corrected)) else {
            return self.process(scan);
        };
        // Odometry restarts at the dock
        scan.place_at(dock.1);
        self.insert(scan, Some((dock.0, dock.1, EdgeKind::Dock)));
        true
    }

    fn process_near_region(&mut self, scan: &mut LocalizedScan) -> bool {
        if self.graph.is_empty() {
            self.insert(scan, None);
            return true;
        }
        let nearest = self
            .graph
            .nearest_vertex(&scan.corrected, self.config.near_region_radius, &[])
            .map(|v| (v.id, v.corrected));

        match nearest {
            Some((id, pose)) => {
                self.insert(scan, Some((id, pose, EdgeKind::NearRegion)));
                true
            }
            None => {
                log::warn!(
                    "No vertex within {:.1}m of ({:.2}, {:.2})",
                    self.config.near_region_radius,
                    scan.corrected.x,
                    scan.corrected.y
                );
                false
            }
        }
    }

    fn process_localization(&mut self, scan: &mut LocalizedScan) -> bool {
        let tracked = self
            .localization
            .iter()
            .rev()
            .find(|v| v.sensor == scan.sensor)
            .map(|v| (v.id, v.odometric, v.corrected));

        let (anchor, anchor_pose) = match tracked {
            Some((id, odometric, corrected)) => {
                scan.corrected = corrected.compose(&odometric.between(&scan.odometric));
                (id, corrected)
            }
            None => {
                let Some(nearest) = self
                    .graph
                    .nearest_vertex(&scan.corrected, self.config.near_region_radius, &[])
                    .map(|v| (v.id, v.corrected))
                else {
                    log::debug!("Localization scan from {} has no nearby vertex", scan.sensor);
                    return false;
                };
                nearest
            }
        };

        let id = self.next_localization_id.max(self.graph.slots().len() as u64);
        self.next_localization_id = id + 1;
        scan.id = Some(id);

        let edge = ScanEdge {
            source: anchor,
            target: id,
            measurement: anchor_pose.between(&scan.corrected),
            information: self.link_information(),
            kind: EdgeKind::Localization,
        };
        if let Some(solver) = self.solver.as_deref_mut() {
            solver.add_node(id, scan.corrected);
            solver.add_constraint(&edge);
        }

        self.localization.push_back(ScanVertex {
            id,
            sensor: scan.sensor.clone(),
            state_id: id,
            stamp_us: scan.stamp_us,
            odometric: scan.odometric,
            corrected: scan.corrected,
        });
        self.evict_localization_nodes();
        true
    }

    fn correct_poses(&mut self) {
        let Some(solver) = self.solver.as_deref_mut() else {
            log::warn!("No solver installed, skipping pose correction");
            return;
        };
        solver.compute();
        for (id, pose) in solver.node_poses() {
            if let Some(vertex) = self.graph.vertex_mut(id) {
                vertex.corrected = pose;
            } else if let Some(vertex) = self.localization.iter_mut().find(|v| v.id == id) {
                vertex.corrected = pose;
            }
        }
    }

    fn graph(&self) -> &ScanGraph {
        &self.graph
    }

    fn solver(&self) -> Option<&(dyn ScanSolver + 'static)> {
        self.solver.as_deref()
    }

    fn solver_mut(&mut self) -> Option<&mut (dyn ScanSolver + 'static)> {
        self.solver.as_deref_mut()
    }

    fn set_solver(&mut self, solver: Box<dyn ScanSolver>) {
        self.solver = Some(solver);
    }

    fn take_solver(&mut self) -> Option<Box<dyn ScanSolver>> {
        self.solver.take()
    }

    fn sensor_of(&self, node: u64) -> Option<&str> {
        self.graph
            .vertex(node)
            .or_else(|| self.localization.iter().find(|v| v.id == node))
            .map(|v| v.sensor.as_str())
    }

    fn node_pose(&self, node: u64) -> Option<Pose2D> {
        self.graph
            .vertex(node)
            .or_else(|| self.localization.iter().find(|v| v.id == node))
            .map(|v| v.corrected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::graph::{GaussNewtonSolver, SolverConfig};
    use approx::assert_relative_eq;

    fn mapper() -> OdometryMapper {
        OdometryMapper::new(
            MapperConfig::default(),
            Box::new(GaussNewtonSolver::new(SolverConfig::default())),
        )
    }

    fn scan(sensor: &str, x: f32, y: f32) -> LocalizedScan {
        let pose = Pose2D::new(x, y, 0.0);
        LocalizedScan {
            id: None,
            sensor: sensor.to_string(),
            stamp_us: 0,
            readings: vec![2.0; 8],
            odometric: pose,
            corrected: pose,
        }
    }

    #[test]
    fn test_process_chains_by_odometry() {
        let mut mapper = mapper();
        let mut first = scan("a/base_link", 0.0, 0.0);
        let mut second = scan("a/base_link", 1.0, 0.0);

        assert!(mapper.process(&mut first));
        assert!(mapper.process(&mut second));

        assert_eq!(first.id, Some(0));
        assert_eq!(second.id, Some(1));
        assert_eq!(mapper.graph().edge_count(), 1);
        assert_eq!(mapper.graph().edges()[0].kind, EdgeKind::Odometry);
        assert_relative_eq!(second.corrected.x, 1.0);
        assert_eq!(mapper.solver().unwrap().node_count(), 2);
    }

    #[test]
    fn test_new_sensor_starts_unlinked() {
        let mut mapper = mapper();
        mapper.process(&mut scan("a/base_link", 0.0, 0.0));
        mapper.process(&mut scan("b/base_link", 5.0, 5.0));

        assert_eq!(mapper.graph().edge_count(), 0);
        assert_eq!(mapper.sensor_of(1), Some("b/base_link"));
    }

    #[test]
    fn test_dock_links_to_first_vertex() {
        let mut mapper = mapper();
        mapper.process(&mut scan("a/base_link", 0.0, 0.0));
        mapper.process(&mut scan("a/base_link", 2.0, 0.0));

        let mut docked = scan("a/base_link", 40.0, -3.0);
        assert!(mapper.process_at_dock(&mut docked));

        assert_relative_eq!(docked.corrected.x, 0.0);
        assert_relative_eq!(docked.odometric.x, 0.0);
        let edge = mapper.graph().edges().last().unwrap();
        assert_eq!((edge.source, edge.target, edge.kind), (0, 2, EdgeKind::Dock));
    }

    #[test]
    fn test_dock_on_empty_graph_behaves_like_process() {
        let mut mapper = mapper();
        let mut docked = scan("a/base_link", 1.0, 1.0);
        assert!(mapper.process_at_dock(&mut docked));
        assert_eq!(docked.id, Some(0));
        assert_relative_eq!(docked.corrected.x, 1.0);
    }

    #[test]
    fn test_near_region_requires_nearby_vertex() {
        let mut mapper = mapper();
        mapper.process(&mut scan("a/base_link", 0.0, 0.0));

        let mut far = scan("a/base_link", 20.0, 0.0);
        assert!(!mapper.process_near_region(&mut far));
        assert_eq!(far.id, None);

        let mut near = scan("a/base_link", 1.0, 1.0);
        assert!(mapper.process_near_region(&mut near));
        assert_eq!(mapper.graph().edges()[0].kind, EdgeKind::NearRegion);
    }

    #[test]
    fn test_localization_buffer_is_bounded() {
        let config = MapperConfig {
            localization_buffer_size: 3,
            ..MapperConfig::default()
        };
        let mut mapper = OdometryMapper::new(
            config,
            Box::new(GaussNewtonSolver::new(SolverConfig::default())),
        );
        mapper.process(&mut scan("a/base_link", 0.0, 0.0));

        for step in 0..6 {
            let mut localized = scan("a/base_link", 0.1 * step as f32, 0.0);
            assert!(mapper.process_localization(&mut localized));
        }

        // The persistent graph is untouched; only the buffer holds the track
        assert_eq!(mapper.graph().vertex_count(), 1);
        assert_eq!(mapper.graph().slots().len(), 1);
        assert_eq!(mapper.graph().edge_count(), 0);
        assert_eq!(mapper.localization_vertices().count(), 3);
        assert_eq!(mapper.solver().unwrap().node_count(), 4);

        let ids: Vec<u64> = mapper.localization_vertices().map(|v| v.id).collect();
        assert_eq!(ids, vec![4, 5, 6]);
        assert_relative_eq!(mapper.node_pose(6).unwrap().x, 0.5, epsilon = 1e-5);
        assert_eq!(mapper.node_pose(1), None);
    }

    #[test]
    fn test_mapping_after_localization_drops_buffer() {
        let mut mapper = mapper();
        mapper.process(&mut scan("a/base_link", 0.0, 0.0));
        assert!(mapper.process_localization(&mut scan("a/base_link", 0.2, 0.0)));
        assert_eq!(mapper.solver().unwrap().node_count(), 2);

        let mut next = scan("a/base_link", 1.0, 0.0);
        assert!(mapper.process(&mut next));
        assert_eq!(next.id, Some(1));
        assert_eq!(mapper.localization_vertices().count(), 0);
        assert_eq!(mapper.solver().unwrap().node_count(), 2);
    }

    #[test]
    fn test_localization_without_nearby_map_is_rejected() {
        let mut mapper = mapper();
        mapper.process(&mut scan("a/base_link", 0.0, 0.0));
        let mut lost = scan("a/base_link", 50.0, 50.0);
        assert!(!mapper.process_localization(&mut lost));
    }

    #[test]
    fn test_correct_poses_writes_back() {
        let mut mapper = mapper();
        mapper.process(&mut scan("a/base_link", 0.0, 0.0));
        mapper.process(&mut scan("a/base_link", 1.0, 0.0));

        mapper
            .solver_mut()
            .unwrap()
            .modify_node(1, Pose2D::new(1.0, 0.3, 0.0));
        mapper.correct_poses();

        assert!(mapper.graph().vertex(1).unwrap().corrected.y > 0.2);
    }

    #[test]
    fn test_restored_mapper_has_no_solver() {
        let mut source = mapper();
        source.process(&mut scan("a/base_link", 0.0, 0.0));
        let restored = OdometryMapper::from_graph(source.graph().clone(), MapperConfig::default());

        assert!(restored.solver().is_none());
        assert_eq!(restored.graph().vertex_count(), 1);
    }
}
