//! Processing mode state machine.
//!
//! ```text
//!   deserialize(StartAtFirstNode) ──▶ StartAtDock ───────┐
//!   deserialize(StartAtGivenPose) ──▶ StartNearPose(p) ──┼──▶ Continuous
//!                                                         │   (after one scan)
//!   deserialize(LocalizeAtPose)   ──▶ Localize(p) ◀──┐    │
//!                                        └───────────┘    │
//!                                       (persists)    Continuous ◀┘
//! ```

use serde::{Deserialize, Serialize};

use crate::core::types::Pose2D;

/// How the next scan is applied to the pose graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum ProcessingMode {
    /// Incremental mapping
    #[default]
    Continuous,
    /// Resume a restored map with the robot sitting on the first node
    StartAtDock,
    /// Resume a restored map with the robot near a known pose
    StartNearPose(Pose2D),
    /// Localize against the restored map without extending it
    Localize(Pose2D),
}

/// Optimizer entry point selected for one scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dispatch {
    Continuous,
    AtDock,
    /// Scan must be placed at the pose before processing
    NearRegion(Pose2D),
    /// `seed` is set for the first scan after arming
    Localize { seed: Option<Pose2D> },
}

impl Dispatch {
    /// Whether a successful scan re-derives the reprocessing transform.
    pub fn updates_reprocessing(&self) -> bool {
        match self {
            Dispatch::Continuous => false,
            Dispatch::AtDock | Dispatch::NearRegion(_) => true,
            Dispatch::Localize { seed } => seed.is_some(),
        }
    }
}

/// Current mode plus the one-shot localization seed.
///
/// Lives behind the pose guard.
#[derive(Debug, Default)]
pub struct ModeState {
    mode: ProcessingMode,
    seed_pending: bool,
}

impl ModeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> ProcessingMode {
        self.mode
    }

    /// Arm a mode for the next scan.
    pub fn arm(&mut self, mode: ProcessingMode) {
        self.seed_pending = matches!(mode, ProcessingMode::Localize(_));
        self.mode = mode;
    }

    /// Select the entry point for one scan and advance the machine.
    ///
    /// One-shot modes fall back to `Continuous` here, whether or not the
    /// optimizer then accepts the scan.
    pub fn take_dispatch(&mut self) -> Dispatch {
        match self.mode {
            ProcessingMode::Continuous => Dispatch::Continuous,
            ProcessingMode::StartAtDock => {
                self.mode = ProcessingMode::Continuous;
                Dispatch::AtDock
            }
            ProcessingMode::StartNearPose(pose) => {
                self.mode = ProcessingMode::Continuous;
                Dispatch::NearRegion(pose)
            }
            ProcessingMode::Localize(pose) => {
                let seed = self.seed_pending.then_some(pose);
                self.seed_pending = false;
                Dispatch::Localize { seed }
            }
        }
    }
}
