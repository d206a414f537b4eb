//! Manual loop closure and graph visualization.
//!
//! - [`LoopClosureAssistant`]: pending node moves, commit, interactive toggle
//! - [`GraphSnapshot`]: node and edge markers derived from the pose graph

mod assistant;
mod snapshot;

pub use assistant::{CommitOutcome, InteractiveConfig, LoopClosureAssistant, ScanPreview};
pub use snapshot::{
    build_snapshot, Color, EdgeClass, EdgeSegment, GraphSnapshot, NodeMarker, SensorPalette,
};
