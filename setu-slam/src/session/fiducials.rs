//! Fiducial tag → observing scan association.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::core::types::{Point2D, Pose2D};
use crate::error::{Result, SlamError};

/// Marker edge length in meters.
const MARKER_SCALE: f32 = 0.2;

/// First sighting of a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiducialRecord {
    /// Tag pose relative to the observer
    pub relative_pose: Pose2D,
    /// Graph node of the scan the tag was attached to
    pub scan: u64,
    /// Agent that observed it
    pub agent: String,
    /// Corrected pose of `scan`, refreshed after every re-optimization
    pub observer: Pose2D,
}

/// World-frame marker for one tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiducialMarker {
    pub id: u32,
    /// Observing agent
    pub namespace: String,
    pub frame: String,
    pub position: Point2D,
    pub scale: f32,
    pub label: String,
}

/// Insert-once table of tag associations.
#[derive(Debug, Default)]
pub struct FiducialTable {
    records: BTreeMap<u32, FiducialRecord>,
}

impl FiducialTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a tag to a scan unless it is already known.
    ///
    /// Returns true if the association was inserted.
    pub fn associate(
        &mut self,
        tag: u32,
        relative_pose: Pose2D,
        scan: u64,
        observer: Pose2D,
        agent: &str,
    ) -> bool {
        if self.records.contains_key(&tag) {
            return false;
        }
        self.records.insert(
            tag,
            FiducialRecord {
                relative_pose,
                scan,
                agent: agent.to_string(),
                observer,
            },
        );
        true
    }

    pub fn lookup(&self, tag: u32) -> Result<&FiducialRecord> {
        self.records.get(&tag).ok_or(SlamError::FiducialNotFound(tag))
    }

    pub fn records(&self) -> impl Iterator<Item = (u32, &FiducialRecord)> {
        self.records.iter().map(|(id, record)| (*id, record))
    }

    /// Owning scans of every known tag.
    pub fn scans(&self) -> Vec<u64> {
        self.records.values().map(|r| r.scan).collect()
    }

    /// Move observers to their re-optimized poses. Scans missing from
    /// `poses` keep their last known pose.
    pub fn update_observers(&mut self, poses: &HashMap<u64, Pose2D>) {
        for record in self.records.values_mut() {
            if let Some(pose) = poses.get(&record.scan) {
                record.observer = *pose;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Forget every association, as when the graph is replaced.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FiducialRecord {
    /// World marker for this tag.
    ///
    /// The tag is reported at the observer's pose; the relative pose is
    /// kept but not applied.
    pub fn marker(&self, id: u32, map_frame: &str) -> FiducialMarker {
        FiducialMarker {
            id,
            namespace: self.agent.clone(),
            frame: map_frame.to_string(),
            position: self.observer.position(),
            scale: MARKER_SCALE,
            label: id.to_string(),
        }
    }
}
