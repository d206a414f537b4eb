//! SLAM session coordination.
//!
//! - [`SlamNode`]: guarded session state, scan dispatch and services
//! - [`ScanAdmissionFilter`]: per-frame gate in front of the mapper
//! - [`ModeState`]: continuous / docked / near-pose / localization modes
//! - [`TransformCache`]: per-agent world corrections
//! - [`FiducialTable`]: tag to scan association
//! - [`AgentRoster`]: frame and topic layout of the fleet

mod admission;
mod agents;
mod coordinator;
mod fiducials;
mod lifecycle;
mod mode;
mod odometry;
mod optimizer;
mod paused;
mod services;
mod transforms;

pub use admission::{AdmissionConfig, ScanAdmissionFilter};
pub use agents::{agent_name, Agent, AgentRoster, FramesConfig};
pub use coordinator::{PosedScan, SlamNode};
pub use fiducials::{FiducialMarker, FiducialRecord, FiducialTable};
pub use lifecycle::ScanSource;
pub use mode::{Dispatch, ModeState, ProcessingMode};
pub use odometry::{OdometryBuffer, OdometryLookup};
pub use optimizer::{OptimizerState, ScanHolder, SharedOptimizer};
pub use paused::{PausedApplication, PausedState};
pub use services::MatchType;
pub use transforms::{StampedTransform, TransformCache, WorldCorrection};
