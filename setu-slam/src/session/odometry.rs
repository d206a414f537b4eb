//! Odometry pose lookup.
//!
//! Scans are stamped by the sensor; the base pose at that instant is
//! interpolated from buffered odometry samples.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::core::types::{OdometrySample, Pose2D, Timestamped};
use crate::error::{Result, SlamError};
use crate::utils::secs_to_us;

/// Source of base-in-odometry poses.
pub trait OdometryLookup: Send + Sync {
    /// Pose of `base_frame` in `odom_frame` at `stamp_us`.
    fn pose_at(&self, base_frame: &str, odom_frame: &str, stamp_us: u64) -> Result<Pose2D>;
}

#[derive(Debug)]
struct Track {
    odom_frame: String,
    samples: VecDeque<Timestamped<Pose2D>>,
}

/// Time-ordered odometry history per base frame.
#[derive(Debug)]
pub struct OdometryBuffer {
    history_us: u64,
    tolerance_us: u64,
    tracks: Mutex<HashMap<String, Track>>,
}

impl OdometryBuffer {
    /// Keep `history_secs` of samples and serve stamps up to `tolerance_secs`
    /// past the newest one.
    pub fn new(history_secs: f64, tolerance_secs: f64) -> Self {
        Self {
            history_us: secs_to_us(history_secs),
            tolerance_us: secs_to_us(tolerance_secs),
            tracks: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, sample: &OdometrySample) {
        let mut tracks = self.tracks.lock();
        let track = tracks
            .entry(sample.base_frame.clone())
            .or_insert_with(|| Track {
                odom_frame: sample.odom_frame.clone(),
                samples: VecDeque::new(),
            });

        if let Some(newest) = track.samples.back()
            && sample.stamp_us < newest.timestamp_us
        {
            log::debug!(
                "Dropping out-of-order odometry for {} ({} < {})",
                sample.base_frame,
                sample.stamp_us,
                newest.timestamp_us
            );
            return;
        }

        track.odom_frame = sample.odom_frame.clone();
        track
            .samples
            .push_back(Timestamped::new(sample.pose, sample.stamp_us));

        while let Some(oldest) = track.samples.front() {
            if oldest.timestamp_us + self.history_us < sample.stamp_us {
                track.samples.pop_front();
            } else {
                break;
            }
        }
    }
}

impl OdometryLookup for OdometryBuffer {
    fn pose_at(&self, base_frame: &str, odom_frame: &str, stamp_us: u64) -> Result<Pose2D> {
        let tracks = self.tracks.lock();
        let track = tracks
            .get(base_frame)
            .ok_or_else(|| SlamError::Lookup(format!("no odometry for {}", base_frame)))?;

        if track.odom_frame != odom_frame {
            return Err(SlamError::Lookup(format!(
                "{} is tracked in {}, not {}",
                base_frame, track.odom_frame, odom_frame
            )));
        }

        let (Some(oldest), Some(newest)) = (track.samples.front(), track.samples.back()) else {
            return Err(SlamError::Lookup(format!("no odometry for {}", base_frame)));
        };

        if stamp_us > newest.timestamp_us {
            return if stamp_us - newest.timestamp_us <= self.tolerance_us {
                Ok(newest.data)
            } else {
                Err(SlamError::Lookup(format!(
                    "{} odometry is {} us behind the scan",
                    base_frame,
                    stamp_us - newest.timestamp_us
                )))
            };
        }
        if stamp_us < oldest.timestamp_us {
            return Err(SlamError::Lookup(format!(
                "scan at {} predates buffered odometry for {}",
                stamp_us, base_frame
            )));
        }

        let end_idx = track
            .samples
            .partition_point(|s| s.timestamp_us < stamp_us)
            .min(track.samples.len() - 1);
        let start_idx = end_idx.saturating_sub(1);

        Pose2D::interpolate(&track.samples[start_idx], &track.samples[end_idx], stamp_us)
            .ok_or_else(|| {
                SlamError::Lookup(format!("cannot interpolate {} at {}", base_frame, stamp_us))
            })
    }
}
