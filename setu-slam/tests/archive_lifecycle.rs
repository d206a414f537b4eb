//! Serialize / deserialize round trips and the modes a restore arms.

mod common;

use approx::assert_relative_eq;
use common::{fleet_config, metadata_source, session};
use crossbeam_channel::unbounded;
use setu_slam::core::types::Pose2D;
use setu_slam::io::archive::PostcardArchive;
use setu_slam::session::{MatchType, ProcessingMode};
use setu_slam::SlamError;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Map a short line with agent `a` and write it to `path`.
fn saved_map(path: &Path) -> (usize, usize) {
    let s = session(fleet_config(&["a"]));
    s.drive_line("a", 4);
    s.node.serialize(path).unwrap();
    s.counts()
}

#[test]
fn test_round_trip_preserves_counts() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("first.setu");
    let second = dir.path().join("second.setu");
    let saved = saved_map(&first);
    assert_eq!(saved, (4, 3));

    let restored = session(fleet_config(&["a"]));
    restored
        .node
        .deserialize(&first, MatchType::StartAtFirstNode, Pose2D::identity(), &metadata_source("a"))
        .unwrap();
    assert_eq!(restored.counts(), saved);
    assert_eq!(restored.node.dataset_len(), 4);
    assert!(restored.node.laser("a/base_link").is_some());

    restored.node.serialize(&second).unwrap();
    let again = session(fleet_config(&["a"]));
    again
        .node
        .deserialize(&second, MatchType::StartAtFirstNode, Pose2D::identity(), &metadata_source("a"))
        .unwrap();
    assert_eq!(again.counts(), saved);
}

#[test]
fn test_start_at_dock_sets_reprocessing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("map.setu");
    saved_map(&path);

    let s = session(fleet_config(&["a"]));
    s.node
        .deserialize(&path, MatchType::StartAtFirstNode, Pose2D::identity(), &metadata_source("a"))
        .unwrap();
    assert_eq!(s.node.mode(), ProcessingMode::StartAtDock);
    assert!(s.node.reprocessing_transform().is_identity(1e-6));

    // Robot woke up with odometry far from the map origin
    let node = s.drive("a", 100, Pose2D::new(5.0, 3.0, 0.5)).unwrap();
    assert_eq!(s.node.mode(), ProcessingMode::Continuous);
    assert!(!s.node.reprocessing_transform().is_identity(1e-3));

    let docked = s.node.with_graph(|g| g.vertex(node).unwrap().corrected);
    assert_relative_eq!(docked.x, 0.0, epsilon = 1e-4);
    assert_relative_eq!(docked.y, 0.0, epsilon = 1e-4);

    // Later odometry lands relative to the dock
    let next = s.drive("a", 101, Pose2D::new(5.0 + 2.0 * 0.5f32.cos(), 3.0 + 2.0 * 0.5f32.sin(), 0.5)).unwrap();
    let pose = s.node.with_graph(|g| g.vertex(next).unwrap().corrected);
    assert_relative_eq!(pose.x, 2.0, epsilon = 1e-3);
    assert_relative_eq!(pose.y, 0.0, epsilon = 1e-3);
    assert_relative_eq!(pose.theta, 0.0, epsilon = 1e-3);
}

#[test]
fn test_start_near_pose_anchors_to_nearby_vertex() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("map.setu");
    saved_map(&path);

    let s = session(fleet_config(&["a"]));
    let start = Pose2D::new(5.2, 0.3, 0.0);
    s.node
        .deserialize(&path, MatchType::StartAtGivenPose, start, &metadata_source("a"))
        .unwrap();
    assert_eq!(s.node.mode(), ProcessingMode::StartNearPose(start));

    let node = s.drive("a", 50, Pose2D::new(-1.0, -1.0, 0.0)).unwrap();
    assert_eq!(s.node.mode(), ProcessingMode::Continuous);
    let pose = s.node.with_graph(|g| g.vertex(node).unwrap().corrected);
    assert_relative_eq!(pose.x, 5.2, epsilon = 1e-4);
    assert_relative_eq!(pose.y, 0.3, epsilon = 1e-4);
}

#[test]
fn test_localize_mode_persists() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("map.setu");
    saved_map(&path);

    let s = session(fleet_config(&["a"]));
    let seed = Pose2D::new(6.0, 0.0, 0.0);
    s.node
        .deserialize(&path, MatchType::LocalizeAtPose, seed, &metadata_source("a"))
        .unwrap();

    s.drive("a", 10, Pose2D::new(1.0, 1.0, 0.0)).unwrap();
    assert_eq!(s.node.mode(), ProcessingMode::Localize(seed));
    assert!(!s.node.reprocessing_transform().is_identity(1e-3));

    let reprocessing = s.node.reprocessing_transform();
    s.drive("a", 11, Pose2D::new(2.0, 1.0, 0.0)).unwrap();
    assert_eq!(s.node.mode(), ProcessingMode::Localize(seed));
    assert_eq!(s.node.reprocessing_transform(), reprocessing);
}

#[test]
fn test_localization_leaves_saved_map_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("map.setu");
    let resaved = dir.path().join("resaved.setu");
    saved_map(&path);

    let s = session(fleet_config(&["a"]));
    s.node
        .deserialize(&path, MatchType::LocalizeAtPose, Pose2D::new(6.0, 0.0, 0.0), &metadata_source("a"))
        .unwrap();

    for seq in 10..60u64 {
        assert!(s.drive("a", seq, Pose2D::new(seq as f32, 1.0, 0.0)).is_some());
    }
    assert_eq!(s.node.mode(), ProcessingMode::Localize(Pose2D::new(6.0, 0.0, 0.0)));
    assert_eq!(s.node.dataset_len(), 4);
    assert_eq!(s.counts(), (4, 3));
    assert_eq!(s.node.with_graph(|g| g.slots().len()), 4);

    s.node.serialize(&resaved).unwrap();
    let archive = PostcardArchive::decode(&fs::read(&resaved).unwrap()).unwrap();
    let graph = archive.graph.unwrap();
    assert_eq!(graph.slots().len(), 4);
    assert_eq!(graph.edge_count(), 3);
    assert_eq!(archive.dataset.len(), 4);
}

#[test]
fn test_restore_keeps_descriptors_of_registered_agents() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("map.setu");
    let resaved = dir.path().join("resaved.setu");
    saved_map(&path);

    let s = session(fleet_config(&["a", "b"]));
    s.drive_line("b", 2);
    s.node
        .deserialize(&path, MatchType::StartAtFirstNode, Pose2D::identity(), &metadata_source("a"))
        .unwrap();

    // b's laser was registered before the restore replaced the dataset
    assert!(s.drive("b", 20, Pose2D::new(20.0, 0.0, 0.0)).is_some());
    assert!(s.drive("b", 21, Pose2D::new(21.0, 0.0, 0.0)).is_some());
    s.node.serialize(&resaved).unwrap();

    let archive = PostcardArchive::decode(&fs::read(&resaved).unwrap()).unwrap();
    let mut lasers: Vec<&str> = archive.dataset.lasers().iter().map(|l| l.name.as_str()).collect();
    lasers.sort();
    assert_eq!(lasers, vec!["a/base_link", "b/base_link"]);
    let b_scans = archive
        .dataset
        .scans()
        .iter()
        .filter(|scan| scan.sensor == "b/base_link")
        .count();
    assert_eq!(b_scans, 2);
}

#[test]
fn test_unset_match_type_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("map.setu");
    saved_map(&path);

    let s = session(fleet_config(&["a"]));
    let result = s
        .node
        .deserialize(&path, MatchType::Unset, Pose2D::identity(), &metadata_source("a"));
    assert!(matches!(result, Err(SlamError::Rejected(_))));
    assert_eq!(s.counts(), (0, 0));
}

#[test]
fn test_empty_path_is_a_noop() {
    let s = session(fleet_config(&["a"]));
    s.drive_line("a", 2);

    s.node
        .deserialize(Path::new(""), MatchType::StartAtFirstNode, Pose2D::identity(), &metadata_source("a"))
        .unwrap();
    assert_eq!(s.counts(), (2, 1));
    assert_eq!(s.node.mode(), ProcessingMode::Continuous);
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    let s = session(fleet_config(&["a"]));
    let result = s.node.deserialize(
        &dir.path().join("absent.setu"),
        MatchType::StartAtFirstNode,
        Pose2D::identity(),
        &metadata_source("a"),
    );
    assert!(matches!(result, Err(SlamError::Io(_))));
    assert_eq!(s.node.mode(), ProcessingMode::Continuous);
}

#[test]
fn test_archive_without_lasers_is_fatal() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.setu");
    session(fleet_config(&["a"])).node.serialize(&path).unwrap();

    let s = session(fleet_config(&["a"]));
    let err = s
        .node
        .deserialize(&path, MatchType::StartAtFirstNode, Pose2D::identity(), &metadata_source("a"))
        .unwrap_err();
    assert!(matches!(err, SlamError::CorruptArchive(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_restore_clears_session_tables() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("map.setu");
    saved_map(&path);

    let s = session(fleet_config(&["a"]));
    let nodes = s.drive_line("a", 2);
    s.node
        .assistant()
        .record_move(nodes[1], Pose2D::new(1.0, 1.0, 0.0))
        .unwrap();

    s.node
        .deserialize(&path, MatchType::StartAtFirstNode, Pose2D::identity(), &metadata_source("a"))
        .unwrap();
    assert!(s.node.assistant().pending_moves().is_empty());
    assert_eq!(s.node.latest_scan("a"), None);

    // Admission is re-armed: any first scan passes.
    assert!(s.drive("a", 1, Pose2D::identity()).is_some());
}

#[test]
fn test_restore_without_live_scan_continues() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("map.setu");
    saved_map(&path);

    let s = session(fleet_config(&["a"]));
    let (_tx, silent) = unbounded();
    s.node
        .deserialize(&path, MatchType::StartAtFirstNode, Pose2D::identity(), &silent)
        .unwrap();
    assert_eq!(s.counts(), (4, 3));
    assert!(s.node.laser("a/base_link").is_some());
}
