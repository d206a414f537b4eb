//! Range scans as they arrive from a sensor and as the pose graph keeps them.

use serde::{Deserialize, Serialize};

use super::pose::Pose2D;

/// Raw planar range scan in polar coordinates.
///
/// `frame_id` names the sensor frame (which is also the agent's base frame,
/// e.g. `a/base_link`), `seq` is the sensor's monotonically increasing
/// message counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeScan {
    pub frame_id: String,
    /// Timestamp in microseconds since epoch
    pub stamp_us: u64,
    pub seq: u64,
    /// Start angle in radians
    pub angle_min: f32,
    /// End angle in radians
    pub angle_max: f32,
    /// Angular step between consecutive readings
    pub angle_increment: f32,
    /// Minimum valid range in meters
    pub range_min: f32,
    /// Maximum valid range in meters
    pub range_max: f32,
    /// Range measurements in meters
    pub ranges: Vec<f32>,
}

impl RangeScan {
    /// Uniform scan covering `[angle_min, angle_max]` with one reading per step.
    pub fn new(frame_id: impl Into<String>, stamp_us: u64, seq: u64, ranges: Vec<f32>) -> Self {
        let count = ranges.len().max(1);
        let angle_min = -std::f32::consts::PI;
        let angle_increment = 2.0 * std::f32::consts::PI / count as f32;
        Self {
            frame_id: frame_id.into(),
            stamp_us,
            seq,
            angle_min,
            angle_max: angle_min + angle_increment * (count - 1) as f32,
            angle_increment,
            range_min: 0.15,
            range_max: 12.0,
            ranges,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Static description of a range sensor.
///
/// One descriptor per sensor frame is stored in the dataset the first time
/// that frame is seen. Runtime copies are rebuilt from a live scan after a
/// session restore since the sensor may have been remounted in between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaserDescriptor {
    /// Sensor name, equal to the frame id of its scans
    pub name: String,
    pub angle_min: f32,
    pub angle_max: f32,
    pub angle_increment: f32,
    pub range_min: f32,
    pub range_max: f32,
    /// Number of readings per scan
    pub reading_count: usize,
    /// Mounted upside down; readings are stored in reverse order
    pub inverted: bool,
}

impl LaserDescriptor {
    /// Derive sensor metadata from a live scan.
    pub fn from_scan(scan: &RangeScan, inverted: bool) -> Self {
        Self {
            name: scan.frame_id.clone(),
            angle_min: scan.angle_min,
            angle_max: scan.angle_max,
            angle_increment: scan.angle_increment,
            range_min: scan.range_min,
            range_max: scan.range_max,
            reading_count: scan.ranges.len(),
            inverted,
        }
    }

    /// Readings in the order the graph stores them.
    pub fn readings(&self, scan: &RangeScan) -> Vec<f32> {
        if self.inverted {
            scan.ranges.iter().rev().copied().collect()
        } else {
            scan.ranges.clone()
        }
    }
}

/// A scan anchored in the graph: readings plus odometric and corrected pose.
///
/// `id` is assigned by the mapper when the scan becomes a vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedScan {
    pub id: Option<u64>,
    pub sensor: String,
    pub stamp_us: u64,
    pub readings: Vec<f32>,
    /// Pose reported by odometry, after the reprocessing transform
    pub odometric: Pose2D,
    /// Pose after graph optimization
    pub corrected: Pose2D,
}

impl LocalizedScan {
    pub fn new(laser: &LaserDescriptor, scan: &RangeScan, odometric: Pose2D) -> Self {
        Self {
            id: None,
            sensor: laser.name.clone(),
            stamp_us: scan.stamp_us,
            readings: laser.readings(scan),
            odometric,
            corrected: odometric,
        }
    }

    /// Place the scan at a known pose, overriding odometry.
    pub fn place_at(&mut self, pose: Pose2D) {
        self.odometric = pose;
        self.corrected = pose;
    }
}
