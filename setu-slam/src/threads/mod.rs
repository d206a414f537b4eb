//! Thread management for the SLAM daemon.
//!
//! - `SlamThread`: drains sensor channels and operator commands into the session
//! - `TransformThread`: republishes world corrections and fiducial markers
//! - `VisualizationThread`: periodic graph snapshots
//! - `ReplayThread`: feeds a recorded sensor log into the sensor channels
//! - `ConsoleThread`: operator commands from stdin

mod console_thread;
mod replay_thread;
mod slam_thread;
mod transform_thread;
mod visualization_thread;

pub use console_thread::ConsoleThread;
pub use replay_thread::{ReplayThread, replay_log};
pub use slam_thread::SlamThread;
pub use transform_thread::TransformThread;
pub use visualization_thread::VisualizationThread;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::core::types::{FiducialDetections, OdometrySample, RangeScan};

/// Producer ends of the sensor channels.
#[derive(Debug, Clone)]
pub struct SensorSenders {
    pub scans: Sender<RangeScan>,
    pub odometry: Sender<OdometrySample>,
    pub fiducials: Sender<FiducialDetections>,
}

/// Consumer ends of the sensor channels, owned by the SLAM thread.
#[derive(Debug)]
pub struct SensorChannels {
    pub scans: Receiver<RangeScan>,
    pub odometry: Receiver<OdometrySample>,
    pub fiducials: Receiver<FiducialDetections>,
}

pub fn create_sensor_channels() -> (SensorSenders, SensorChannels) {
    let (scan_tx, scan_rx) = unbounded();
    let (odom_tx, odom_rx) = unbounded();
    let (fid_tx, fid_rx) = unbounded();
    (
        SensorSenders {
            scans: scan_tx,
            odometry: odom_tx,
            fiducials: fid_tx,
        },
        SensorChannels {
            scans: scan_rx,
            odometry: odom_rx,
            fiducials: fid_rx,
        },
    )
}

/// Sleep for `period`, waking every 100ms to check `running`.
///
/// Returns false once shutdown was requested.
fn sleep_while_running(period: Duration, running: &Arc<AtomicBool>) -> bool {
    const STEP: Duration = Duration::from_millis(100);
    let deadline = Instant::now() + period;
    while running.load(Ordering::Relaxed) {
        let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
            return true;
        };
        std::thread::sleep(remaining.min(STEP));
    }
    false
}
