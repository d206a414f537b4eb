//! Session coordinator.
//!
//! Owns every guarded resource of a running session and routes admitted
//! scans through the processing-mode dispatch into the mapper.
//!
//! ```text
//!  RangeScan ─▶ roster ─▶ laser registry ─▶ odometry lookup ─▶ admission
//!                                                                  │
//!                         ┌────────────────────────────────────────┘
//!                         ▼
//!   optimizer guard: reprocessing ⊕ odom ─▶ mode dispatch ─▶ mapper
//!                         │
//!                         ▼ on success
//!   scan holder · dataset · world correction · latest scan per agent
//! ```
//!
//! Guard order, outermost first: optimizer, pose (mode), moved nodes,
//! palette, interactive flag. The fiducial, admission, laser and
//! latest-scan guards are leaves and are never held across another lock.
//! The publish path reads only leaf guards, so a long re-optimization
//! never stalls transform or marker broadcasts.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::SlamConfig;
use crate::core::types::{FiducialDetections, LaserDescriptor, LocalizedScan, Pose2D, RangeScan};
use crate::engine::graph::{GaussNewtonSolver, ScanGraph};
use crate::engine::{OdometryMapper, PoseGraphMapper};
use crate::error::Result;
use crate::io::archive::{GraphArchive, PostcardArchive};
use crate::io::broadcast::Broadcaster;
use crate::loop_closure::LoopClosureAssistant;

use super::admission::ScanAdmissionFilter;
use super::agents::{agent_name, Agent, AgentRoster};
use super::fiducials::{FiducialMarker, FiducialRecord, FiducialTable};
use super::mode::{Dispatch, ModeState, ProcessingMode};
use super::odometry::OdometryLookup;
use super::optimizer::{OptimizerState, SharedOptimizer};
use super::paused::PausedState;
use super::transforms::{StampedTransform, TransformCache, WorldCorrection};

/// Newest accepted scan of one agent.
#[derive(Debug, Clone, Copy)]
pub(super) struct LatestScan {
    pub node: u64,
    pub corrected: Pose2D,
}

/// A scan that passed admission, with the raw odometry pose it was taken at.
#[derive(Debug, Clone)]
pub struct PosedScan {
    pub laser: LaserDescriptor,
    pub scan: RangeScan,
    pub odom_pose: Pose2D,
}

pub struct SlamNode {
    pub(super) config: SlamConfig,
    pub(super) roster: AgentRoster,
    pub(super) optimizer: SharedOptimizer,
    pub(super) mode: Arc<Mutex<ModeState>>,
    pub(super) paused: Arc<PausedState>,
    pub(super) transforms: TransformCache,
    pub(super) fiducials: Mutex<FiducialTable>,
    pub(super) admission: Mutex<ScanAdmissionFilter>,
    pub(super) lasers: Mutex<HashMap<String, LaserDescriptor>>,
    pub(super) latest_scans: Mutex<HashMap<String, LatestScan>>,
    pub(super) assistant: LoopClosureAssistant,
    pub(super) odometry: Arc<dyn OdometryLookup>,
    pub(super) broadcaster: Arc<dyn Broadcaster>,
    pub(super) archive: Box<dyn GraphArchive>,
}

impl SlamNode {
    /// Build a node around explicit collaborators.
    ///
    /// Fails with a configuration error when the frame lists are inconsistent.
    pub fn new(
        config: SlamConfig,
        mapper: Box<dyn PoseGraphMapper>,
        odometry: Arc<dyn OdometryLookup>,
        broadcaster: Arc<dyn Broadcaster>,
        archive: Box<dyn GraphArchive>,
    ) -> Result<Self> {
        let roster = AgentRoster::from_config(&config.frames)?;
        let optimizer: SharedOptimizer = Arc::new(Mutex::new(OptimizerState::new(mapper)));
        let mode = Arc::new(Mutex::new(ModeState::new()));
        let paused = Arc::new(PausedState::new());
        let assistant = LoopClosureAssistant::new(
            &config.interactive,
            &config.frames.map_frame,
            optimizer.clone(),
            mode.clone(),
            paused.clone(),
            broadcaster.clone(),
        );

        log::info!("Session configured for {} agent(s)", roster.len());
        for agent in roster.iter() {
            log::info!(
                "  {}: {} in {} (laser {})",
                agent.name,
                agent.base_frame,
                agent.odom_frame,
                agent.laser_topic
            );
        }

        Ok(Self {
            admission: Mutex::new(ScanAdmissionFilter::new(&config.admission)),
            config,
            roster,
            optimizer,
            mode,
            paused,
            transforms: TransformCache::new(),
            fiducials: Mutex::new(FiducialTable::new()),
            lasers: Mutex::new(HashMap::new()),
            latest_scans: Mutex::new(HashMap::new()),
            assistant,
            odometry,
            broadcaster,
            archive,
        })
    }

    /// Build a node with the in-crate mapper, solver and archive codec.
    pub fn with_defaults(
        config: SlamConfig,
        odometry: Arc<dyn OdometryLookup>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Result<Self> {
        let solver = Box::new(GaussNewtonSolver::new(config.solver.clone()));
        let mapper = Box::new(OdometryMapper::new(config.mapper.clone(), solver));
        let archive = Box::new(PostcardArchive::new(config.mapper.clone()));
        Self::new(config, mapper, odometry, broadcaster, archive)
    }

    pub fn config(&self) -> &SlamConfig {
        &self.config
    }

    pub fn roster(&self) -> &AgentRoster {
        &self.roster
    }

    pub fn paused(&self) -> &PausedState {
        &self.paused
    }

    pub fn assistant(&self) -> &LoopClosureAssistant {
        &self.assistant
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode.lock().current()
    }

    pub fn reprocessing_transform(&self) -> Pose2D {
        self.optimizer.lock().reprocessing
    }

    pub fn world_correction(&self, odom_frame: &str) -> Option<WorldCorrection> {
        self.transforms.get(odom_frame)
    }

    pub fn fiducial(&self, tag: u32) -> Result<FiducialRecord> {
        self.fiducials.lock().lookup(tag).cloned()
    }

    pub fn latest_scan(&self, agent: &str) -> Option<u64> {
        self.latest_scans.lock().get(agent).map(|latest| latest.node)
    }

    pub fn laser(&self, frame: &str) -> Option<LaserDescriptor> {
        self.lasers.lock().get(frame).cloned()
    }

    /// Run `f` against the current graph under the optimizer guard.
    pub fn with_graph<R>(&self, f: impl FnOnce(&ScanGraph) -> R) -> R {
        f(self.optimizer.lock().mapper.graph())
    }

    pub fn dataset_len(&self) -> usize {
        self.optimizer.lock().dataset.len()
    }

    /// Descriptor for the scan's sensor, registering it on first sight.
    fn laser_for(&self, agent: &Agent, scan: &RangeScan) -> LaserDescriptor {
        let mut lasers = self.lasers.lock();
        if let Some(laser) = lasers.get(&scan.frame_id) {
            return laser.clone();
        }

        let laser = LaserDescriptor::from_scan(scan, agent.laser_inverted);
        log::info!(
            "Registered laser {} ({} readings, {:.2}-{:.2}m{})",
            laser.name,
            laser.reading_count,
            laser.range_min,
            laser.range_max,
            if laser.inverted { ", inverted" } else { "" }
        );
        lasers.insert(laser.name.clone(), laser.clone());
        laser
    }

    /// Resolve agent, odometry and admission for one scan.
    pub fn admit_scan(&self, scan: RangeScan) -> Option<PosedScan> {
        let Some(agent) = self.roster.for_frame(&scan.frame_id) else {
            log::debug!("Ignoring scan from unconfigured frame {}", scan.frame_id);
            return None;
        };
        let laser = self.laser_for(agent, &scan);

        let odom_pose = match self
            .odometry
            .pose_at(&agent.base_frame, &agent.odom_frame, scan.stamp_us)
        {
            Ok(pose) => pose,
            Err(e) => {
                log::warn!("Dropping scan {} from {}: {}", scan.seq, scan.frame_id, e);
                return None;
            }
        };

        let admitted = self.admission.lock().should_process(
            &scan.frame_id,
            scan.stamp_us,
            scan.seq,
            &odom_pose,
            &self.paused,
        );
        if !admitted {
            log::trace!("Scan {} from {} not admitted", scan.seq, scan.frame_id);
            return None;
        }

        Some(PosedScan {
            laser,
            scan,
            odom_pose,
        })
    }

    /// Hand an admitted scan to the mapper.
    pub fn process_posed(&self, posed: &PosedScan) -> Option<u64> {
        self.add_scan(&posed.laser, &posed.scan, posed.odom_pose)
    }

    /// Admit and process in one step.
    pub fn handle_scan(&self, scan: RangeScan) -> Option<u64> {
        let posed = self.admit_scan(scan)?;
        self.process_posed(&posed)
    }

    /// Insert a scan into the graph according to the current processing mode.
    ///
    /// Returns the new node id, or `None` when the mapper declined the scan.
    pub fn add_scan(
        &self,
        laser: &LaserDescriptor,
        scan: &RangeScan,
        odom_pose: Pose2D,
    ) -> Option<u64> {
        let Some(agent) = self.roster.for_frame(&scan.frame_id) else {
            log::debug!("No agent owns frame {}", scan.frame_id);
            return None;
        };

        let mut state = self.optimizer.lock();
        if state.dataset.laser(&laser.name).is_none() {
            state.dataset.add_laser(laser.clone());
        }
        let mut localized = LocalizedScan::new(laser, scan, state.reprocessing.compose(&odom_pose));
        let dispatch = self.mode.lock().take_dispatch();

        let processed = match dispatch {
            Dispatch::Continuous => state.mapper.process(&mut localized),
            Dispatch::AtDock => state.mapper.process_at_dock(&mut localized),
            Dispatch::NearRegion(pose) => {
                localized.place_at(pose);
                state.mapper.process_near_region(&mut localized)
            }
            Dispatch::Localize { seed } => {
                if let Some(pose) = seed {
                    localized.place_at(pose);
                }
                state.mapper.process_localization(&mut localized)
            }
        };

        let node = match (processed, localized.id) {
            (true, Some(node)) => node,
            _ => {
                log::debug!("Mapper declined scan {} from {} ({:?})", scan.seq, scan.frame_id, dispatch);
                return None;
            }
        };

        // Localization tracks against the map without growing it
        let persistent = !matches!(dispatch, Dispatch::Localize { .. });
        if persistent && self.assistant.is_enabled() {
            state.scan_holder.insert(node, scan.clone());
        }

        if dispatch.updates_reprocessing() {
            state.reprocessing = localized.corrected.compose(&odom_pose.inverse());
            log::info!(
                "Reprocessing transform set to ({:.3}, {:.3}, {:.3})",
                state.reprocessing.x,
                state.reprocessing.y,
                state.reprocessing.theta
            );
        }

        if persistent {
            state.dataset.add_scan(&localized);
        }
        drop(state);

        self.transforms.update(WorldCorrection::from_poses(
            agent.odom_frame.as_str(),
            &localized.corrected,
            &odom_pose,
            scan.stamp_us,
        ));
        self.latest_scans.lock().insert(
            agent.name.clone(),
            LatestScan {
                node,
                corrected: localized.corrected,
            },
        );
        Some(node)
    }

    /// Attach detected tags to the observing agent's latest scan.
    ///
    /// Returns how many tags were newly associated. Markers for every
    /// detection are broadcast either way.
    pub fn add_fiducials(&self, detections: &FiducialDetections) -> usize {
        let agent = agent_name(&detections.frame_id);
        let Some(latest) = self.latest_scans.lock().get(agent).copied() else {
            log::debug!("No accepted scan for {} yet, dropping {} tag(s)", agent, detections.detections.len());
            return 0;
        };

        let (inserted, markers) = {
            let mut table = self.fiducials.lock();
            let mut inserted = 0;
            for detection in &detections.detections {
                if table.associate(detection.id, detection.pose, latest.node, latest.corrected, agent) {
                    log::info!("Fiducial {} attached to scan {} of {}", detection.id, latest.node, agent);
                    inserted += 1;
                }
            }
            let markers: Vec<FiducialMarker> = detections
                .detections
                .iter()
                .filter_map(|d| {
                    let record = table.lookup(d.id).ok()?;
                    Some(record.marker(d.id, &self.config.frames.map_frame))
                })
                .collect();
            (inserted, markers)
        };

        if !markers.is_empty() {
            self.broadcaster.send_markers(markers);
        }
        inserted
    }

    /// World markers for every known tag.
    pub fn fiducial_markers(&self) -> Vec<FiducialMarker> {
        self.fiducials
            .lock()
            .records()
            .map(|(id, record)| record.marker(id, &self.config.frames.map_frame))
            .collect()
    }

    /// Pull re-optimized poses into the fiducial observers and the
    /// per-agent latest scans.
    pub(super) fn refresh_cached_poses(&self) {
        let mut nodes = self.fiducials.lock().scans();
        nodes.extend(self.latest_scans.lock().values().map(|latest| latest.node));

        let poses: HashMap<u64, Pose2D> = {
            let state = self.optimizer.lock();
            nodes
                .into_iter()
                .filter_map(|node| state.mapper.node_pose(node).map(|pose| (node, pose)))
                .collect()
        };

        self.fiducials.lock().update_observers(&poses);
        for latest in self.latest_scans.lock().values_mut() {
            if let Some(pose) = poses.get(&latest.node) {
                latest.corrected = *pose;
            }
        }
    }

    pub fn publish_fiducial_markers(&self) {
        let markers = self.fiducial_markers();
        if !markers.is_empty() {
            self.broadcaster.send_markers(markers);
        }
    }

    /// Refresh the correction table and broadcast every entry, future-dated
    /// by the transform timeout.
    pub fn publish_transforms(&self, now_us: u64) -> Vec<StampedTransform> {
        let stamp_us = now_us + self.config.publish.transform_timeout_us();
        let transforms: Vec<StampedTransform> = self
            .transforms
            .refresh()
            .into_iter()
            .map(|correction| StampedTransform {
                parent_frame: self.config.frames.map_frame.clone(),
                child_frame: correction.odom_frame,
                transform: correction.transform,
                stamp_us,
            })
            .collect();

        if !transforms.is_empty() {
            self.broadcaster.send_transforms(transforms.clone());
        }
        transforms
    }
}
