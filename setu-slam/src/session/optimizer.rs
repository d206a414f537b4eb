//! State behind the optimizer guard.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::types::{Pose2D, RangeScan};
use crate::engine::{Dataset, PoseGraphMapper};

/// Raw scans retained for interactive drag previews, keyed by node.
#[derive(Debug, Default)]
pub struct ScanHolder {
    scans: HashMap<u64, RangeScan>,
}

impl ScanHolder {
    pub fn insert(&mut self, node: u64, scan: RangeScan) {
        self.scans.insert(node, scan);
    }

    pub fn get(&self, node: u64) -> Option<&RangeScan> {
        self.scans.get(&node)
    }

    pub fn clear(&mut self) {
        self.scans.clear();
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }
}

/// Mapper, dataset and the transforms that must change together with them.
pub struct OptimizerState {
    pub mapper: Box<dyn PoseGraphMapper>,
    pub dataset: Dataset,
    /// Maps new-session odometry into the restored map's frame.
    pub reprocessing: Pose2D,
    pub scan_holder: ScanHolder,
}

impl OptimizerState {
    pub fn new(mapper: Box<dyn PoseGraphMapper>) -> Self {
        Self {
            mapper,
            dataset: Dataset::new(),
            reprocessing: Pose2D::identity(),
            scan_holder: ScanHolder::default(),
        }
    }
}

pub type SharedOptimizer = Arc<Mutex<OptimizerState>>;
