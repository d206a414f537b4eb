//! Shared session fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use crossbeam_channel::{Receiver, unbounded};
use setu_slam::config::SlamConfig;
use setu_slam::core::types::{OdometrySample, Pose2D, RangeScan};
use setu_slam::io::broadcast::{Broadcast, ChannelBroadcaster};
use setu_slam::session::{FramesConfig, OdometryBuffer, SlamNode};

pub const SEC: u64 = 1_000_000;

pub struct Session {
    pub node: SlamNode,
    pub odometry: Arc<OdometryBuffer>,
    pub broadcasts: Receiver<Broadcast>,
}

pub fn fleet_config(agents: &[&str]) -> SlamConfig {
    let mut config = SlamConfig::default();
    config.frames = FramesConfig::for_fleet(agents);
    config.admission.throttle_scans = 1;
    config.admission.minimum_time_interval = 0.5;
    config.admission.minimum_travel_distance = 0.5;
    config.interactive.enable_interactive_mode = true;
    config.restore.metadata_wait_attempts = 1;
    config
}

pub fn session(config: SlamConfig) -> Session {
    let odometry = Arc::new(OdometryBuffer::new(60.0, 0.2));
    let (broadcaster, broadcasts) = ChannelBroadcaster::new(1024);
    let node = SlamNode::with_defaults(config, odometry.clone(), Arc::new(broadcaster))
        .expect("valid fleet configuration");
    Session {
        node,
        odometry,
        broadcasts,
    }
}

pub fn range_scan(agent: &str, seq: u64) -> RangeScan {
    RangeScan::new(format!("{agent}/base_link"), seq * SEC, seq, vec![2.0; 36])
}

impl Session {
    /// Record odometry for `agent` at `seq` seconds and offer the matching scan.
    pub fn drive(&self, agent: &str, seq: u64, pose: Pose2D) -> Option<u64> {
        self.odometry.insert(&OdometrySample {
            base_frame: format!("{agent}/base_link"),
            odom_frame: format!("{agent}/odom"),
            stamp_us: seq * SEC,
            pose,
        });
        self.node.handle_scan(range_scan(agent, seq))
    }

    /// Straight run along x, one meter per scan, starting at seq 0.
    pub fn drive_line(&self, agent: &str, scans: u64) -> Vec<u64> {
        let mut nodes = Vec::new();
        for seq in 0..scans {
            // Grace period: sequence numbers below 5 only pass as first readings.
            let seq = if seq == 0 { 0 } else { seq + 4 };
            if let Some(node) = self.drive(agent, seq, Pose2D::new(seq as f32, 0.0, 0.0)) {
                nodes.push(node);
            }
        }
        nodes
    }

    pub fn counts(&self) -> (usize, usize) {
        self.node
            .with_graph(|g| (g.vertex_count(), g.edge_count()))
    }
}

/// A scan source that already holds one scan from `agent`.
pub fn metadata_source(agent: &str) -> Receiver<RangeScan> {
    let (tx, rx) = unbounded();
    tx.send(range_scan(agent, 0)).expect("receiver alive");
    rx
}
