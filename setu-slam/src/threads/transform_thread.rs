//! Transform Thread - fixed-rate world correction broadcast.
//!
//! Every tick republishes all cached map → odom corrections; every
//! `tag_publish_ticks` ticks the fiducial markers go out as well.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::session::SlamNode;
use crate::utils::now_us;

pub struct TransformThread {
    handle: JoinHandle<()>,
}

impl TransformThread {
    /// Spawn the publish loop. Returns `None` when the period is zero.
    pub fn spawn(node: Arc<SlamNode>, running: Arc<AtomicBool>) -> std::io::Result<Option<Self>> {
        let publish = &node.config().publish;
        if publish.transform_publish_period <= 0.0 {
            log::info!("  Transform publishing disabled");
            return Ok(None);
        }
        let period = Duration::from_secs_f64(publish.transform_publish_period);
        let tag_ticks = publish.tag_publish_ticks();

        let handle = thread::Builder::new()
            .name("transforms".into())
            .spawn(move || run(node, period, tag_ticks, running))?;
        Ok(Some(Self { handle }))
    }

    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

fn run(node: Arc<SlamNode>, period: Duration, tag_ticks: u64, running: Arc<AtomicBool>) {
    log::info!(
        "Transform thread started ({:?} period, markers every {} ticks)",
        period,
        tag_ticks
    );

    let mut tick: u64 = 0;
    while running.load(Ordering::Relaxed) {
        node.publish_transforms(now_us());

        tick += 1;
        if tick % tag_ticks == 0 {
            node.publish_fiducial_markers();
        }

        thread::sleep(period);
    }

    log::info!("Transform thread stopped after {} ticks", tick);
}
