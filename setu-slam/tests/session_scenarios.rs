//! Session behavior driven through `SlamNode`.
//!
//! Covers admission against live odometry, world corrections, fiducial
//! association and interactive editing.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use approx::assert_relative_eq;
use common::{SEC, fleet_config, range_scan, session};
use setu_slam::core::types::{
    FiducialDetection, FiducialDetections, LocalizedScan, OdometrySample, Pose2D,
};
use setu_slam::engine::graph::{GaussNewtonSolver, ScanGraph, ScanSolver};
use setu_slam::engine::{MapperConfig, OdometryMapper, PoseGraphMapper};
use setu_slam::io::archive::PostcardArchive;
use setu_slam::io::broadcast::{Broadcast, ChannelBroadcaster};
use setu_slam::loop_closure::CommitOutcome;
use setu_slam::session::{OdometryBuffer, PausedApplication, ProcessingMode, SlamNode};
use setu_slam::SlamError;

fn accepted(throttle: u64, last_seq: u64, moved_at: u64) -> Vec<u64> {
    let mut config = fleet_config(&["a"]);
    config.admission.throttle_scans = throttle;
    let s = session(config);

    (0..=last_seq)
        .filter(|&seq| {
            let x = if seq >= moved_at { 1.0 } else { 0.05 * seq as f32 };
            s.drive("a", seq, Pose2D::new(x, 0.0, 0.0)).is_some()
        })
        .collect()
}

#[test]
fn test_throttled_frame_accepts_first_and_moved_multiple() {
    assert_eq!(accepted(2, 7, 6), vec![0, 6]);
}

#[test]
fn test_unthrottled_frame_accepts_first_and_first_moved() {
    assert_eq!(accepted(1, 5, 5), vec![0, 5]);
}

#[test]
fn test_throttle_rejects_every_non_multiple() {
    let mut config = fleet_config(&["a"]);
    config.admission.throttle_scans = 3;
    let s = session(config);
    s.drive("a", 0, Pose2D::identity());

    for seq in 5..30u64 {
        let node = s.drive("a", seq, Pose2D::new(seq as f32, 0.0, 0.0));
        if seq % 3 != 0 {
            assert!(node.is_none(), "seq {} passed the throttle", seq);
        }
    }
}

#[test]
fn test_unconfigured_frame_is_ignored() {
    let s = session(fleet_config(&["a"]));
    assert_eq!(s.drive("z", 0, Pose2D::identity()), None);
    assert_eq!(s.node.dataset_len(), 0);
}

#[test]
fn test_scan_without_odometry_is_dropped() {
    let s = session(fleet_config(&["a"]));
    assert_eq!(s.node.handle_scan(common::range_scan("a", 3)), None);
    assert_eq!(s.counts(), (0, 0));

    // The next scan with odometry is still the first reading.
    assert!(s.drive("a", 4, Pose2D::identity()).is_some());
}

#[test]
fn test_accepted_scans_update_dataset_and_correction() {
    let s = session(fleet_config(&["a", "b"]));
    let nodes = s.drive_line("a", 3);
    assert_eq!(nodes.len(), 3);
    assert_eq!(s.node.dataset_len(), 3);
    assert_eq!(s.counts(), (3, 2));
    assert_eq!(s.node.latest_scan("a"), nodes.last().copied());
    assert_eq!(s.node.latest_scan("b"), None);

    // Odometry-only mapping keeps corrected == odometric
    let correction = s.node.world_correction("a/odom").unwrap();
    assert!(correction.transform.is_identity(1e-4));
    assert_eq!(correction.stamp_us, 6 * SEC);
    assert!(s.node.world_correction("b/odom").is_none());

    let published = s.node.publish_transforms(10 * SEC);
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].parent_frame, "map");
    assert_eq!(published[0].child_frame, "a/odom");
    assert_eq!(published[0].stamp_us, 10 * SEC + 200_000);
}

#[test]
fn test_agents_chain_independently() {
    let s = session(fleet_config(&["a", "b"]));
    s.drive_line("a", 2);
    s.drive_line("b", 2);

    // Each agent gets its own odometry chain, no edge between them.
    assert_eq!(s.counts(), (4, 2));
    s.node.with_graph(|g| {
        for edge in g.edges() {
            let source = g.vertex(edge.source).unwrap();
            let target = g.vertex(edge.target).unwrap();
            assert_eq!(source.sensor, target.sensor);
        }
    });
}

#[test]
fn test_fiducial_keeps_first_association() {
    let s = session(fleet_config(&["a"]));
    let detections = |pose: Pose2D, stamp_us: u64| FiducialDetections {
        frame_id: "a/camera".to_string(),
        stamp_us,
        detections: vec![FiducialDetection { id: 7, pose }],
    };

    // No accepted scan yet: nothing to attach to.
    assert_eq!(s.node.add_fiducials(&detections(Pose2D::identity(), 0)), 0);
    assert!(matches!(s.node.fiducial(7), Err(SlamError::FiducialNotFound(7))));

    let first = s.drive("a", 0, Pose2D::identity()).unwrap();
    let seen = Pose2D::new(1.0, 0.5, 0.0);
    assert_eq!(s.node.add_fiducials(&detections(seen, SEC)), 1);

    let second = s.drive("a", 5, Pose2D::new(3.0, 0.0, 0.0)).unwrap();
    assert_ne!(first, second);
    assert_eq!(
        s.node.add_fiducials(&detections(Pose2D::new(9.0, 9.0, 0.0), 6 * SEC)),
        0
    );

    let record = s.node.fiducial(7).unwrap();
    assert_eq!(record.scan, first);
    assert_eq!(record.relative_pose, seen);
    assert_eq!(record.agent, "a");

    let markers = s.node.fiducial_markers();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].namespace, "a");
    assert_eq!(markers[0].frame, "map");
}

#[test]
fn test_fiducial_detections_are_republished() {
    let s = session(fleet_config(&["a"]));
    s.drive("a", 0, Pose2D::identity());
    let detections = FiducialDetections {
        frame_id: "a/camera".to_string(),
        stamp_us: SEC,
        detections: vec![FiducialDetection {
            id: 3,
            pose: Pose2D::identity(),
        }],
    };
    s.node.add_fiducials(&detections);
    s.node.add_fiducials(&detections);

    let markers = s
        .broadcasts
        .try_iter()
        .filter(|b| matches!(b, Broadcast::Markers(_)))
        .count();
    assert_eq!(markers, 2);
}

#[test]
fn test_pause_new_measurements_toggles() {
    let s = session(fleet_config(&["a"]));
    s.drive("a", 0, Pose2D::identity());

    assert!(s.node.pause_new_measurements());
    assert_eq!(s.drive("a", 5, Pose2D::new(5.0, 0.0, 0.0)), None);

    assert!(!s.node.pause_new_measurements());
    assert!(s.drive("a", 6, Pose2D::new(6.0, 0.0, 0.0)).is_some());
}

#[test]
fn test_toggle_interactive_twice_restores_flags() {
    let s = session(fleet_config(&["a"]));
    let paused = s.node.paused();

    assert!(s.node.toggle_interactive_mode().unwrap());
    assert!(paused.get(PausedApplication::Processing));
    assert!(paused.get(PausedApplication::VisualizingGraph));

    assert!(!s.node.toggle_interactive_mode().unwrap());
    assert!(!paused.get(PausedApplication::Processing));
    assert!(!paused.get(PausedApplication::VisualizingGraph));
}

#[test]
fn test_commit_without_moves_is_noop() {
    let s = session(fleet_config(&["a"]));
    s.drive_line("a", 3);
    let before = s.node.with_graph(|g| g.clone());

    assert_eq!(
        s.node.manual_loop_closure().unwrap(),
        CommitOutcome::NothingToCommit
    );
    s.node.with_graph(|g| assert_eq!(*g, before));
}

#[test]
fn test_manual_move_pulls_node_toward_target() {
    let s = session(fleet_config(&["a"]));
    let nodes = s.drive_line("a", 3);
    let last = *nodes.last().unwrap();
    let target = Pose2D::new(7.0, 2.0, 0.0);
    let before = s.node.with_graph(|g| g.vertex(last).unwrap().corrected);

    s.node.assistant().record_move(last, target).unwrap();
    assert_eq!(s.node.assistant().pending_moves().len(), 1);
    assert_eq!(
        s.node.manual_loop_closure().unwrap(),
        CommitOutcome::Committed { moved: 1 }
    );
    assert!(s.node.assistant().pending_moves().is_empty());

    let after = s.node.with_graph(|g| g.vertex(last).unwrap().corrected);
    assert!(after.distance_squared(&target) < 0.25 * before.distance_squared(&target));

    // The anchor stays put
    let first = s.node.with_graph(|g| g.vertex(nodes[0]).unwrap().corrected);
    assert_relative_eq!(first.x, 0.0, epsilon = 1e-4);
    assert_relative_eq!(first.y, 0.0, epsilon = 1e-4);
}

#[test]
fn test_clear_manual_changes_drops_pending() {
    let s = session(fleet_config(&["a"]));
    let nodes = s.drive_line("a", 2);
    s.node
        .assistant()
        .record_move(nodes[1], Pose2D::new(0.0, 3.0, 0.0))
        .unwrap();

    s.node.clear_manual_changes().unwrap();
    assert_eq!(
        s.node.manual_loop_closure().unwrap(),
        CommitOutcome::NothingToCommit
    );
}

#[test]
fn test_editing_declined_when_disabled() {
    let mut config = fleet_config(&["a"]);
    config.interactive.enable_interactive_mode = false;
    let s = session(config);
    let node = s.drive("a", 0, Pose2D::identity()).unwrap();

    assert!(matches!(
        s.node.assistant().record_move(node, Pose2D::identity()),
        Err(SlamError::InteractiveDisabled)
    ));
    assert!(matches!(
        s.node.manual_loop_closure(),
        Err(SlamError::InteractiveDisabled)
    ));
    assert!(matches!(
        s.node.toggle_interactive_mode(),
        Err(SlamError::InteractiveDisabled)
    ));
    assert!(!s.node.paused().get(PausedApplication::Processing));
}

#[test]
fn test_preview_uses_held_scan() {
    let s = session(fleet_config(&["a"]));
    let node = s.drive("a", 0, Pose2D::identity()).unwrap();

    let preview = s
        .node
        .assistant()
        .preview_move(node, Pose2D::new(1.0, 1.0, 0.0))
        .unwrap()
        .unwrap();
    assert_eq!(preview.node, node);
    assert_eq!(preview.scan.frame_id, "a/base_link");
    assert_relative_eq!(preview.transform.x, 1.0);

    assert!(s.node.assistant().preview_move(999, Pose2D::identity()).unwrap().is_none());
}

#[test]
fn test_snapshot_classifies_edges() {
    let s = session(fleet_config(&["a", "b"]));
    s.drive_line("a", 3);
    s.drive_line("b", 1);

    let snapshot = s.node.assistant().snapshot();
    assert_eq!(snapshot.nodes.len(), 4);
    assert_eq!(snapshot.edges.len(), 2);
    assert_eq!(snapshot.frame, "map");
    assert_eq!(s.node.mode(), ProcessingMode::Continuous);
}

/// Odometry mapper whose re-optimization takes `delay`.
struct SlowMapper {
    inner: OdometryMapper,
    delay: Duration,
}

impl PoseGraphMapper for SlowMapper {
    fn process(&mut self, scan: &mut LocalizedScan) -> bool {
        self.inner.process(scan)
    }

    fn process_at_dock(&mut self, scan: &mut LocalizedScan) -> bool {
        self.inner.process_at_dock(scan)
    }

    fn process_near_region(&mut self, scan: &mut LocalizedScan) -> bool {
        self.inner.process_near_region(scan)
    }

    fn process_localization(&mut self, scan: &mut LocalizedScan) -> bool {
        self.inner.process_localization(scan)
    }

    fn correct_poses(&mut self) {
        thread::sleep(self.delay);
        self.inner.correct_poses();
    }

    fn graph(&self) -> &ScanGraph {
        self.inner.graph()
    }

    fn solver(&self) -> Option<&(dyn ScanSolver + 'static)> {
        self.inner.solver()
    }

    fn solver_mut(&mut self) -> Option<&mut (dyn ScanSolver + 'static)> {
        self.inner.solver_mut()
    }

    fn set_solver(&mut self, solver: Box<dyn ScanSolver>) {
        self.inner.set_solver(solver)
    }

    fn take_solver(&mut self) -> Option<Box<dyn ScanSolver>> {
        self.inner.take_solver()
    }
}

#[test]
fn test_publishing_does_not_wait_for_commit() {
    let config = fleet_config(&["a"]);
    let solver = Box::new(GaussNewtonSolver::new(config.solver.clone()));
    let mapper = SlowMapper {
        inner: OdometryMapper::new(config.mapper.clone(), solver),
        delay: Duration::from_millis(1500),
    };
    let odometry = Arc::new(OdometryBuffer::new(60.0, 0.2));
    let (broadcaster, _broadcasts) = ChannelBroadcaster::new(1024);
    let node = Arc::new(
        SlamNode::new(
            config,
            Box::new(mapper),
            odometry.clone(),
            Arc::new(broadcaster),
            Box::new(PostcardArchive::new(MapperConfig::default())),
        )
        .unwrap(),
    );

    let mut last = 0;
    for (seq, x) in [(0u64, 0.0f32), (5, 5.0)] {
        odometry.insert(&OdometrySample {
            base_frame: "a/base_link".to_string(),
            odom_frame: "a/odom".to_string(),
            stamp_us: seq * SEC,
            pose: Pose2D::new(x, 0.0, 0.0),
        });
        last = node.handle_scan(range_scan("a", seq)).unwrap();
    }
    node.add_fiducials(&FiducialDetections {
        frame_id: "a/camera".to_string(),
        stamp_us: 5 * SEC,
        detections: vec![FiducialDetection {
            id: 2,
            pose: Pose2D::identity(),
        }],
    });
    node.assistant()
        .record_move(last, Pose2D::new(5.0, 3.0, 0.0))
        .unwrap();

    let committing = {
        let node = node.clone();
        thread::spawn(move || node.manual_loop_closure())
    };
    thread::sleep(Duration::from_millis(200));

    let started = Instant::now();
    assert_eq!(node.publish_transforms(6 * SEC).len(), 1);
    node.publish_fiducial_markers();
    assert!(started.elapsed() < Duration::from_millis(500));

    assert_eq!(
        committing.join().unwrap().unwrap(),
        CommitOutcome::Committed { moved: 1 }
    );

    // The marker follows its observer to the re-optimized pose
    let markers = node.fiducial_markers();
    assert_eq!(markers.len(), 1);
    assert!(markers[0].position.y > 1.5);
}
