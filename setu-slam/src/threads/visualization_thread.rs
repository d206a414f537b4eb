//! Visualization Thread - periodic graph snapshots.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::session::{PausedApplication, SlamNode};

use super::sleep_while_running;

pub struct VisualizationThread {
    handle: JoinHandle<()>,
}

impl VisualizationThread {
    pub fn spawn(node: Arc<SlamNode>, running: Arc<AtomicBool>) -> std::io::Result<Self> {
        let interval = Duration::from_secs_f64(node.config().publish.map_update_interval.max(0.1));
        let handle = thread::Builder::new()
            .name("visualization".into())
            .spawn(move || run(node, interval, running))?;
        Ok(Self { handle })
    }

    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

fn run(node: Arc<SlamNode>, interval: Duration, running: Arc<AtomicBool>) {
    log::info!("Visualization thread started ({:?} interval)", interval);

    while sleep_while_running(interval, &running) {
        // Interactive editing publishes its own snapshots.
        if node.paused().get(PausedApplication::VisualizingGraph) {
            continue;
        }
        node.assistant().publish_graph();
    }

    log::info!("Visualization thread stopped");
}
