//! Non-scan sensor messages: odometry samples and fiducial detections.

use serde::{Deserialize, Serialize};

use super::pose::Pose2D;

/// Pose of an agent's base frame in its odometry frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdometrySample {
    pub base_frame: String,
    pub odom_frame: String,
    pub stamp_us: u64,
    pub pose: Pose2D,
}

/// A single fiducial tag seen by a camera, relative to the observer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FiducialDetection {
    pub id: u32,
    pub pose: Pose2D,
}

/// All tags detected in one camera frame.
///
/// `frame_id` belongs to the observing agent (`agent/camera`, `agent/base_link`);
/// only the agent prefix is used for association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiducialDetections {
    pub frame_id: String,
    pub stamp_us: u64,
    pub detections: Vec<FiducialDetection>,
}
