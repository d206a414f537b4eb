//! Per-frame scan admission.
//!
//! Decides whether an incoming scan is worth handing to the optimizer.
//! Rules are evaluated in order:
//!
//! 1. First scan of a frame, or first scan since start/restore: accept
//! 2. New measurements paused: reject
//! 3. `seq % throttle_scans != 0`: reject
//! 4. Less than `minimum_time_interval` since the last accepted scan: reject
//! 5. Travelled less than `0.8 * minimum_travel_distance²` (squared), or
//!    `seq < 5`: reject
//! 6. Accept and move the frame's baseline

use std::collections::HashMap;

use serde::Deserialize;

use super::paused::{PausedApplication, PausedState};
use crate::core::types::Pose2D;
use crate::utils::secs_to_us;

/// Slack on the travel threshold.
const TRAVEL_TOLERANCE: f32 = 0.8;

/// Sequence numbers below this are startup noise.
const STARTUP_GRACE_SEQ: u64 = 5;

/// Admission thresholds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Keep every Nth scan by sequence number.
    pub throttle_scans: u64,
    /// Minimum time between accepted scans of one frame (seconds).
    pub minimum_time_interval: f64,
    /// Minimum travel between accepted scans of one frame (meters).
    pub minimum_travel_distance: f32,
    /// Admitted scans waiting for the optimizer before the oldest is dropped.
    pub max_queue_size: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            throttle_scans: 1,
            minimum_time_interval: 0.5,
            minimum_travel_distance: 0.5,
            max_queue_size: 100,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FrameBaseline {
    pose: Pose2D,
    stamp_us: u64,
}

/// Admission state for every sensor frame seen so far.
#[derive(Debug)]
pub struct ScanAdmissionFilter {
    throttle: u64,
    min_interval_us: u64,
    min_dist2: f32,
    baselines: HashMap<String, FrameBaseline>,
    first_measurement: bool,
}

impl ScanAdmissionFilter {
    pub fn new(config: &AdmissionConfig) -> Self {
        Self {
            throttle: config.throttle_scans.max(1),
            min_interval_us: secs_to_us(config.minimum_time_interval),
            min_dist2: config.minimum_travel_distance * config.minimum_travel_distance,
            baselines: HashMap::new(),
            first_measurement: true,
        }
    }

    /// Decide on one scan, updating the frame's baseline on acceptance.
    pub fn should_process(
        &mut self,
        frame: &str,
        stamp_us: u64,
        seq: u64,
        pose: &Pose2D,
        paused: &PausedState,
    ) -> bool {
        let known = if self.first_measurement {
            None
        } else {
            self.baselines.get(frame).copied()
        };
        let Some(baseline) = known else {
            self.first_measurement = false;
            self.accept(frame, stamp_us, pose);
            return true;
        };

        if paused.get(PausedApplication::NewMeasurements) {
            return false;
        }

        if seq % self.throttle != 0 {
            return false;
        }

        if stamp_us.saturating_sub(baseline.stamp_us) < self.min_interval_us {
            return false;
        }

        let dist2 = baseline.pose.distance_squared(pose);
        if dist2 < TRAVEL_TOLERANCE * self.min_dist2 || seq < STARTUP_GRACE_SEQ {
            return false;
        }

        self.accept(frame, stamp_us, pose);
        true
    }

    fn accept(&mut self, frame: &str, stamp_us: u64, pose: &Pose2D) {
        self.baselines
            .insert(frame.to_string(), FrameBaseline { pose: *pose, stamp_us });
    }

    /// Let the next scan through unconditionally, as after a restore.
    pub fn rearm(&mut self) {
        self.first_measurement = true;
    }

    /// Number of frames with a baseline.
    pub fn frame_count(&self) -> usize {
        self.baselines.len()
    }
}
