//! Independently toggleable pause flags.

use std::sync::atomic::{AtomicBool, Ordering};

/// Parts of the session that can be paused at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PausedApplication {
    /// Draining queued scans into the optimizer
    Processing,
    /// Publishing graph snapshots
    VisualizingGraph,
    /// Admitting new scans at all
    NewMeasurements,
}

/// One atomic flag per [`PausedApplication`].
///
/// Writers are the service handlers and the loop closure assistant;
/// the admission filter, the SLAM thread and the visualization thread only read.
#[derive(Debug, Default)]
pub struct PausedState {
    processing: AtomicBool,
    visualizing_graph: AtomicBool,
    new_measurements: AtomicBool,
}

impl PausedState {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self, app: PausedApplication) -> &AtomicBool {
        match app {
            PausedApplication::Processing => &self.processing,
            PausedApplication::VisualizingGraph => &self.visualizing_graph,
            PausedApplication::NewMeasurements => &self.new_measurements,
        }
    }

    #[inline]
    pub fn get(&self, app: PausedApplication) -> bool {
        self.flag(app).load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, app: PausedApplication, paused: bool) {
        self.flag(app).store(paused, Ordering::Release);
    }

    /// Flip a flag and return its new value.
    pub fn toggle(&self, app: PausedApplication) -> bool {
        !self.flag(app).fetch_xor(true, Ordering::AcqRel)
    }
}
