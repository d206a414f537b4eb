//! Interactive graph editing.
//!
//! Operators drag graph nodes in a viewer; each drop is recorded as a
//! pending move. Committing pushes every pending move into the solver and
//! re-optimizes the whole graph in one pass.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::types::{Pose2D, RangeScan};
use crate::error::{Result, SlamError};
use crate::io::broadcast::Broadcaster;
use crate::session::{
    ModeState, OptimizerState, PausedApplication, PausedState, ProcessingMode, SharedOptimizer,
};

use super::snapshot::{build_snapshot, GraphSnapshot, SensorPalette};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InteractiveConfig {
    /// Master switch; when off every editing request is declined.
    pub enable_interactive_mode: bool,
    /// Seed for per-sensor snapshot colors.
    pub color_seed: u64,
}

impl Default for InteractiveConfig {
    fn default() -> Self {
        Self {
            enable_interactive_mode: false,
            color_seed: 0x5e70,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    NothingToCommit,
    Committed { moved: usize },
}

/// Raw scan of a node rendered at its in-progress drag pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanPreview {
    pub node: u64,
    pub transform: Pose2D,
    pub scan: RangeScan,
}

pub struct LoopClosureAssistant {
    enabled: bool,
    map_frame: String,
    optimizer: SharedOptimizer,
    mode: Arc<Mutex<ModeState>>,
    paused: Arc<PausedState>,
    broadcaster: Arc<dyn Broadcaster>,
    moved_nodes: Mutex<BTreeMap<u64, Pose2D>>,
    interactive: Mutex<bool>,
    palette: Mutex<SensorPalette>,
}

impl LoopClosureAssistant {
    pub fn new(
        config: &InteractiveConfig,
        map_frame: &str,
        optimizer: SharedOptimizer,
        mode: Arc<Mutex<ModeState>>,
        paused: Arc<PausedState>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        Self {
            enabled: config.enable_interactive_mode,
            map_frame: map_frame.to_string(),
            optimizer,
            mode,
            paused,
            broadcaster,
            moved_nodes: Mutex::new(BTreeMap::new()),
            interactive: Mutex::new(false),
            palette: Mutex::new(SensorPalette::new(config.color_seed)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_interactive(&self) -> bool {
        *self.interactive.lock()
    }

    fn require_enabled(&self) -> Result<()> {
        if self.enabled {
            Ok(())
        } else {
            log::warn!("Interactive mode is disabled; enable it in [interactive] to edit the graph");
            Err(SlamError::InteractiveDisabled)
        }
    }

    fn require_mapping(&self) -> Result<()> {
        match self.mode.lock().current() {
            ProcessingMode::Continuous => Ok(()),
            other => Err(SlamError::Rejected(format!(
                "graph edits are only accepted while mapping (mode {:?})",
                other
            ))),
        }
    }

    /// Record the drop position of a dragged node.
    pub fn record_move(&self, node: u64, pose: Pose2D) -> Result<()> {
        self.require_enabled()?;
        self.require_mapping()?;
        self.moved_nodes.lock().insert(node, pose);
        Ok(())
    }

    pub fn pending_moves(&self) -> Vec<(u64, Pose2D)> {
        self.moved_nodes
            .lock()
            .iter()
            .map(|(id, pose)| (*id, *pose))
            .collect()
    }

    /// Apply every pending move and re-optimize.
    ///
    /// Holds the optimizer guard for the whole solve.
    pub fn commit_moves(&self) -> Result<CommitOutcome> {
        self.require_enabled()?;
        let mut state = self.optimizer.lock();
        let mut moved_nodes = self.moved_nodes.lock();

        if moved_nodes.is_empty() {
            log::warn!("No moved nodes to attempt manual loop closure");
            return Ok(CommitOutcome::NothingToCommit);
        }

        log::info!("Attempting to manually close loop with {} moved nodes", moved_nodes.len());
        match state.mapper.solver_mut() {
            Some(solver) => {
                for (node, pose) in moved_nodes.iter() {
                    if !solver.modify_node(*node, *pose) {
                        log::warn!("  Node {} is not in the solver, skipping", node);
                    }
                }
            }
            None => log::warn!("  No solver installed, moves dropped"),
        }
        state.mapper.correct_poses();

        let moved = moved_nodes.len();
        moved_nodes.clear();
        drop(moved_nodes);

        let snapshot = self.snapshot_locked(&state);
        drop(state);
        self.broadcaster.send_graph(snapshot);
        Ok(CommitOutcome::Committed { moved })
    }

    /// Drop pending moves without touching the optimizer.
    pub fn clear_pending(&self) -> Result<()> {
        self.require_enabled()?;
        self.publish_graph();
        self.moved_nodes.lock().clear();
        Ok(())
    }

    /// Flip interactive mode. While on, graph processing and periodic
    /// graph publication are paused so the viewer state stays still.
    pub fn toggle_interactive_mode(&self) -> Result<bool> {
        self.require_enabled()?;
        let interactive = {
            let mut flag = self.interactive.lock();
            *flag = !*flag;
            *flag
        };
        log::info!(
            "{} interactive mode",
            if interactive { "Enabling" } else { "Disabling" }
        );

        self.publish_graph();
        self.moved_nodes.lock().clear();
        self.paused.set(PausedApplication::Processing, interactive);
        self.paused.set(PausedApplication::VisualizingGraph, interactive);
        Ok(interactive)
    }

    /// Render the raw scan of `node` at its drag pose.
    pub fn preview_move(&self, node: u64, drag: Pose2D) -> Result<Option<ScanPreview>> {
        self.require_enabled()?;
        self.require_mapping()?;

        let preview = {
            let state = self.optimizer.lock();
            let Some(scan) = state.scan_holder.get(node) else {
                return Ok(None);
            };
            let yaw = state
                .mapper
                .solver()
                .and_then(|s| s.node_orientation(node))
                .unwrap_or(0.0);
            ScanPreview {
                node,
                transform: Pose2D::new(drag.x, drag.y, yaw + drag.theta),
                scan: scan.clone(),
            }
        };

        self.broadcaster.send_scan_preview(preview.clone());
        Ok(Some(preview))
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        let state = self.optimizer.lock();
        self.snapshot_locked(&state)
    }

    pub(crate) fn snapshot_locked(&self, state: &OptimizerState) -> GraphSnapshot {
        build_snapshot(
            state.mapper.graph(),
            state.mapper.solver(),
            &mut self.palette.lock(),
            &self.map_frame,
            self.is_interactive(),
        )
    }

    pub fn publish_graph(&self) {
        let snapshot = self.snapshot();
        log::debug!(
            "Publishing graph: {} nodes, {} edges",
            snapshot.nodes.len(),
            snapshot.edges.len()
        );
        self.broadcaster.send_graph(snapshot);
    }

    /// Forget pending moves after the graph they refer to was replaced.
    pub(crate) fn reset_pending(&self) {
        self.moved_nodes.lock().clear();
    }
}
