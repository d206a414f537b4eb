//! Pose graph storage and optimization.
//!
//! ```text
//!  ScanGraph (mapper-owned, persisted)        PoseGraph (solver-owned)
//!  ┌──────────────────────────────┐          ┌──────────────────────┐
//!  │ vertices: [Some, None, Some] │ ──add──▶ │ nodes + edges        │
//!  │ edges: odometry/dock/...     │          │ priors (manual moves)│
//!  └──────────────────────────────┘          └──────────┬───────────┘
//!                 ▲                                     │ compute()
//!                 └────────── corrected poses ──────────┘
//! ```
//!
//! - [`ScanGraph`]: arena of scan vertices with stable ids
//! - [`ScanSolver`]: seam to the optimization back end
//! - [`GaussNewtonSolver`]: dense Levenberg-Marquardt implementation

mod optimizer;
mod pose_graph;
mod scan_graph;
mod solver;

pub use optimizer::{
    chi_squared, GraphOptimizer, GraphOptimizerConfig, OptimizationResult, TerminationReason,
};
pub use pose_graph::{Information2D, PoseEdge, PoseGraph, PoseNode, PosePrior};
pub use scan_graph::{EdgeKind, ScanEdge, ScanGraph, ScanVertex};
pub use solver::{GaussNewtonSolver, ScanSolver, SolverConfig};
