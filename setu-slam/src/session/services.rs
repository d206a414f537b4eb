//! Operator-facing session services.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::StartupRestore;
use crate::core::types::Pose2D;
use crate::error::{Result, SlamError};
use crate::loop_closure::CommitOutcome;

use super::coordinator::SlamNode;
use super::lifecycle::ScanSource;
use super::mode::ProcessingMode;
use super::paused::PausedApplication;

/// How a deserialized map is resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchType {
    #[default]
    Unset,
    /// Robot sits on the map's first node
    StartAtFirstNode,
    /// Robot is near the given pose
    StartAtGivenPose,
    /// Track against the map without extending it
    LocalizeAtPose,
}

impl MatchType {
    /// Mode to arm after restore. `None` for [`MatchType::Unset`].
    pub fn processing_mode(self, pose: Pose2D) -> Option<ProcessingMode> {
        match self {
            MatchType::Unset => None,
            MatchType::StartAtFirstNode => Some(ProcessingMode::StartAtDock),
            MatchType::StartAtGivenPose => Some(ProcessingMode::StartNearPose(pose)),
            MatchType::LocalizeAtPose => Some(ProcessingMode::Localize(pose)),
        }
    }
}

impl SlamNode {
    /// Toggle the admission gate. Returns true when new scans are now paused.
    pub fn pause_new_measurements(&self) -> bool {
        let paused = self.paused.toggle(PausedApplication::NewMeasurements);
        log::info!(
            "{} new measurements",
            if paused { "Pausing" } else { "Resuming" }
        );
        paused
    }

    pub fn manual_loop_closure(&self) -> Result<CommitOutcome> {
        let outcome = self.assistant.commit_moves()?;
        if let CommitOutcome::Committed { .. } = outcome {
            self.refresh_cached_poses();
        }
        Ok(outcome)
    }

    pub fn clear_manual_changes(&self) -> Result<()> {
        self.assistant.clear_pending()
    }

    pub fn toggle_interactive_mode(&self) -> Result<bool> {
        self.assistant.toggle_interactive_mode()
    }

    /// Write the graph and dataset under the optimizer guard.
    pub fn serialize(&self, path: &Path) -> Result<()> {
        let state = self.optimizer.lock();
        self.archive
            .write(path, &*state.mapper, &state.dataset)
            .inspect_err(|e| log::error!("Failed to serialize to {}: {}", path.display(), e))
    }

    /// Load an archive, install it and arm the requested start mode.
    pub fn deserialize(
        &self,
        path: &Path,
        match_type: MatchType,
        initial_pose: Pose2D,
        source: &dyn ScanSource,
    ) -> Result<()> {
        let Some(mode) = match_type.processing_mode(initial_pose) else {
            log::error!("Deserialization called without a valid processing type");
            return Err(SlamError::Rejected("match type must be set".into()));
        };

        if path.as_os_str().is_empty() {
            log::warn!("No map file given, nothing to deserialize");
            return Ok(());
        }

        log::info!("Deserializing {} ({:?})", path.display(), match_type);
        let restored = self
            .archive
            .read(path)
            .inspect_err(|e| log::error!("Failed to read {}: {}", path.display(), e))?;

        self.restore(restored.mapper, restored.dataset, source)?;
        self.mode.lock().arm(mode);
        log::info!("Session restored, processing mode {:?}", mode);
        Ok(())
    }

    /// Restore the map named in the startup configuration.
    pub fn restore_at_startup(&self, request: &StartupRestore, source: &dyn ScanSource) -> Result<()> {
        log::info!("Loading startup map {}", request.path.display());
        self.deserialize(&request.path, request.match_type, request.initial_pose, source)
    }
}
