//! Raw sensor data kept alongside the pose graph.
//!
//! Poses live in the graph; the dataset keeps what is needed to rebuild
//! geometry later: the laser descriptors and each vertex's readings.

use serde::{Deserialize, Serialize};

use crate::core::types::{LaserDescriptor, LocalizedScan};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetScan {
    pub node: u64,
    pub sensor: String,
    pub stamp_us: u64,
    pub readings: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    lasers: Vec<LaserDescriptor>,
    scans: Vec<DatasetScan>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a laser. Returns false if one with the same name exists.
    pub fn add_laser(&mut self, laser: LaserDescriptor) -> bool {
        if self.laser(&laser.name).is_some() {
            return false;
        }
        self.lasers.push(laser);
        true
    }

    pub fn laser(&self, name: &str) -> Option<&LaserDescriptor> {
        self.lasers.iter().find(|l| l.name == name)
    }

    pub fn lasers(&self) -> &[LaserDescriptor] {
        &self.lasers
    }

    /// Record the readings of a scan that became a vertex.
    pub fn add_scan(&mut self, scan: &LocalizedScan) -> bool {
        let Some(node) = scan.id else {
            return false;
        };
        self.scans.push(DatasetScan {
            node,
            sensor: scan.sensor.clone(),
            stamp_us: scan.stamp_us,
            readings: scan.readings.clone(),
        });
        true
    }

    pub fn scans(&self) -> &[DatasetScan] {
        &self.scans
    }

    pub fn scan_for(&self, node: u64) -> Option<&DatasetScan> {
        self.scans.iter().find(|s| s.node == node)
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Pose2D, RangeScan};

    #[test]
    fn test_lasers_are_unique_by_name() {
        let scan = RangeScan::new("a/base_link", 0, 0, vec![1.0; 16]);
        let mut dataset = Dataset::new();

        assert!(dataset.add_laser(LaserDescriptor::from_scan(&scan, false)));
        assert!(!dataset.add_laser(LaserDescriptor::from_scan(&scan, true)));
        assert_eq!(dataset.lasers().len(), 1);
        assert!(!dataset.laser("a/base_link").unwrap().inverted);
    }

    #[test]
    fn test_only_placed_scans_are_recorded() {
        let raw = RangeScan::new("a/base_link", 42, 0, vec![1.5; 16]);
        let laser = LaserDescriptor::from_scan(&raw, false);
        let mut localized = LocalizedScan::new(&laser, &raw, Pose2D::identity());
        let mut dataset = Dataset::new();

        assert!(!dataset.add_scan(&localized));
        localized.id = Some(3);
        assert!(dataset.add_scan(&localized));
        assert_eq!(dataset.scan_for(3).unwrap().stamp_us, 42);
        assert_eq!(dataset.len(), 1);
    }
}
