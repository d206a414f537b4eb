//! Replay Thread - recorded sensor logs as a live source.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crate::error::{Result, SlamError};
use crate::io::sensor_log::{LogMessage, LogPlayer};

use super::SensorSenders;

pub struct ReplayThread {
    handle: JoinHandle<Result<u64>>,
}

impl ReplayThread {
    /// Play `path` into `senders` at `speed` (0 = as fast as possible).
    ///
    /// The senders are dropped when playback ends, closing the channels.
    pub fn spawn(
        path: PathBuf,
        speed: f32,
        senders: SensorSenders,
        running: Arc<AtomicBool>,
    ) -> std::io::Result<Self> {
        let handle = thread::Builder::new().name("replay".into()).spawn(move || {
            let mut player = LogPlayer::open(&path)
                .inspect_err(|e| log::error!("Cannot open {}: {}", path.display(), e))?;
            player.set_speed(speed);
            log::info!(
                "Replaying {} ({} messages, {:.1}s recorded)",
                path.display(),
                player.header().message_count,
                player.header().duration_us() as f64 / 1e6
            );
            replay_log(&mut player, &senders, &running)
        })?;
        Ok(Self { handle })
    }

    /// Number of messages played.
    pub fn join(self) -> thread::Result<Result<u64>> {
        self.handle.join()
    }
}

/// Forward every message of `player` to the matching sensor channel.
///
/// Stops early when `running` is cleared. Returns the number of messages sent.
pub fn replay_log(
    player: &mut LogPlayer,
    senders: &SensorSenders,
    running: &AtomicBool,
) -> Result<u64> {
    let mut sent = 0u64;
    while running.load(Ordering::Relaxed) {
        let Some(msg) = player.next_paced()? else {
            break;
        };
        let delivered = match msg {
            LogMessage::Scan(scan) => senders.scans.send(scan).is_ok(),
            LogMessage::Odometry(sample) => senders.odometry.send(sample).is_ok(),
            LogMessage::Fiducials(detections) => senders.fiducials.send(detections).is_ok(),
        };
        if !delivered {
            return Err(SlamError::ChannelClosed("sensor channel".into()));
        }
        sent += 1;
    }

    log::info!("Replay finished after {} messages", sent);
    Ok(sent)
}
