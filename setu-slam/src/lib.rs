//! SetuSLAM - Multi-agent SLAM session coordinator
//!
//! # Architecture
//!
//! The crate is organized into 5 logical layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 main / threads/                     │  ← Daemon
//! │   (slam, transforms, visualization, replay, console)│
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                      io/                            │  ← Infrastructure
//! │          (archive, broadcast, sensor_log)           │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │              session/ + loop_closure/               │  ← Coordination
//! │  (admission, modes, transforms, fiducials, editing) │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                    engine/                          │  ← Mapping back end
//! │          (mapper, scan graph, solver, dataset)      │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │                (types, math)                        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! A [`SlamNode`] owns the session: scans are admitted per sensor frame,
//! dispatched through the processing mode into a [`PoseGraphMapper`], and
//! every accepted scan refreshes its agent's map → odom correction.
//! Operators edit the graph through the [`LoopClosureAssistant`] and save
//! or restore whole sessions as archives.

// ============================================================================
// Layer 1: Core foundation (no internal deps)
// ============================================================================
pub mod core;
pub mod error;

// ============================================================================
// Layer 2: Mapping back end (depends on core)
// ============================================================================
pub mod engine;

// ============================================================================
// Layer 3: Session coordination (depends on core, engine)
// ============================================================================
pub mod config;
pub mod loop_closure;
pub mod session;

// ============================================================================
// Layer 4: I/O infrastructure
// ============================================================================
pub mod io;

// ============================================================================
// Layer 5: Daemon plumbing
// ============================================================================
pub mod state;
pub mod threads;
pub mod utils;

// ============================================================================
// Convenience re-exports (flat namespace for common use)
// ============================================================================

// Core types
pub use core::math;
pub use core::types::{
    FiducialDetection, FiducialDetections, LaserDescriptor, LocalizedScan, OdometrySample, Point2D,
    Pose2D, RangeScan, Timestamped,
};

// Errors and configuration
pub use config::SlamConfig;
pub use error::{Result, SlamError};

// Engine
pub use engine::graph::{
    GaussNewtonSolver, GraphOptimizer, GraphOptimizerConfig, Information2D, OptimizationResult,
    ScanEdge, ScanGraph, ScanSolver, ScanVertex, SolverConfig, TerminationReason,
};
pub use engine::{Dataset, MapperConfig, OdometryMapper, PoseGraphMapper};

// Session
pub use session::{
    AgentRoster, MatchType, OdometryBuffer, OdometryLookup, PausedApplication, ProcessingMode,
    ScanAdmissionFilter, ScanSource, SlamNode, StampedTransform, WorldCorrection,
};

// Loop closure
pub use loop_closure::{CommitOutcome, EdgeClass, GraphSnapshot, LoopClosureAssistant};

// I/O
pub use io::archive::{GraphArchive, PostcardArchive};
pub use io::broadcast::{Broadcast, Broadcaster, ChannelBroadcaster};
pub use io::sensor_log::{LogMessage, LogPlayer, LogRecorder};
