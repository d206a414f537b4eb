//! Installing a restored pose graph into a running session.

use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::core::types::{LaserDescriptor, Pose2D, RangeScan};
use crate::engine::graph::GaussNewtonSolver;
use crate::engine::{Dataset, PoseGraphMapper};
use crate::error::{Result, SlamError};

use super::coordinator::SlamNode;

/// Live scans consulted while waiting for sensor metadata.
pub trait ScanSource {
    /// Block up to `timeout` for the next scan.
    fn next_scan(&self, timeout: Duration) -> Option<RangeScan>;
}

impl ScanSource for Receiver<RangeScan> {
    fn next_scan(&self, timeout: Duration) -> Option<RangeScan> {
        self.recv_timeout(timeout).ok()
    }
}

const METADATA_WAIT_STEP: Duration = Duration::from_secs(1);

impl SlamNode {
    /// Replace the live mapper and dataset with restored ones.
    ///
    /// The live solver is reset, refilled from the restored graph and moved
    /// into the new mapper. Afterwards the first laser's runtime metadata
    /// is rebuilt from a live scan (waiting without the optimizer guard)
    /// and the solver runs once.
    pub fn restore(
        &self,
        mapper: Option<Box<dyn PoseGraphMapper>>,
        dataset: Dataset,
        source: &dyn ScanSource,
    ) -> Result<()> {
        let Some(mut mapper) = mapper else {
            log::error!("Restored archive holds no pose graph");
            return Err(SlamError::CorruptArchive("archive holds no pose graph".into()));
        };
        let Some(first_laser) = dataset.lasers().first().cloned() else {
            log::error!("Restored dataset has no laser descriptors");
            return Err(SlamError::CorruptArchive("dataset has no laser descriptors".into()));
        };

        {
            let mut state = self.optimizer.lock();
            let mut solver = state.mapper.take_solver().unwrap_or_else(|| {
                log::warn!("Live mapper had no solver, creating one");
                Box::new(GaussNewtonSolver::new(self.config.solver.clone()))
            });
            solver.reset();

            let graph = mapper.graph();
            for vertex in graph.vertices() {
                solver.add_node(vertex.id, vertex.corrected);
            }
            for edge in graph.edges() {
                solver.add_constraint(edge);
            }
            log::info!(
                "Restored {} vertices and {} edges into solver",
                graph.vertex_count(),
                graph.edge_count()
            );
            mapper.set_solver(solver);

            state.mapper = mapper;
            state.dataset = dataset;
            state.reprocessing = Pose2D::identity();
            state.scan_holder.clear();
        }

        self.assistant.reset_pending();
        self.admission.lock().rearm();
        self.latest_scans.lock().clear();
        self.fiducials.lock().clear();

        self.register_restored_laser(first_laser);
        self.await_laser_metadata(source);

        if let Some(solver) = self.optimizer.lock().mapper.solver_mut() {
            solver.compute();
        }
        Ok(())
    }

    fn register_restored_laser(&self, laser: LaserDescriptor) {
        log::info!("Registering restored laser {}", laser.name);
        self.lasers.lock().insert(laser.name.clone(), laser);
    }

    /// Wait for one scan from the first agent to refresh its laser metadata.
    ///
    /// Returns false if no matching scan arrived within the configured attempts.
    fn await_laser_metadata(&self, source: &dyn ScanSource) -> bool {
        let Some(agent) = self.roster.first() else {
            return false;
        };
        let attempts = self.config.restore.metadata_wait_attempts;

        for attempt in 1..=attempts {
            log::info!(
                "Waiting for incoming scan on {} to get metadata ({}/{})",
                agent.laser_topic,
                attempt,
                attempts
            );
            let deadline = Instant::now() + METADATA_WAIT_STEP;
            while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
                let Some(scan) = source.next_scan(remaining) else {
                    break;
                };
                if scan.frame_id != agent.base_frame {
                    log::debug!("Ignoring scan from {} while waiting", scan.frame_id);
                    continue;
                }
                let laser = LaserDescriptor::from_scan(&scan, agent.laser_inverted);
                log::info!("Got scan, laser metadata for {} refreshed", laser.name);
                self.lasers.lock().insert(laser.name.clone(), laser);
                return true;
            }
        }

        log::warn!(
            "No scan from {} after {} attempts; continuing with restored metadata",
            agent.base_frame,
            attempts
        );
        false
    }
}
