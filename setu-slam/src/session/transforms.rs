//! World→odometry corrections, one per agent.
//!
//! The coordinator writes the latest correction after every accepted scan;
//! the transform publisher folds it into the table on its next tick and
//! republishes every entry so idle agents never go stale.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::types::Pose2D;

/// Rigid transform taking an agent's odometry frame into the world frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldCorrection {
    pub odom_frame: String,
    /// `world_T_odom = corrected ⊕ raw_odom⁻¹`
    pub transform: Pose2D,
    pub stamp_us: u64,
}

impl WorldCorrection {
    /// Derive the correction from one optimized scan.
    ///
    /// `raw_odom` is the pose reported by odometry before the reprocessing
    /// transform was applied.
    pub fn from_poses(
        odom_frame: impl Into<String>,
        corrected: &Pose2D,
        raw_odom: &Pose2D,
        stamp_us: u64,
    ) -> Self {
        Self {
            odom_frame: odom_frame.into(),
            transform: corrected.compose(&raw_odom.inverse()),
            stamp_us,
        }
    }
}

/// A correction ready to go out, stamped for downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampedTransform {
    pub parent_frame: String,
    pub child_frame: String,
    pub transform: Pose2D,
    pub stamp_us: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    latest: Option<WorldCorrection>,
    entries: BTreeMap<String, WorldCorrection>,
}

/// Guarded correction table. Entries are refreshed, never removed.
#[derive(Debug, Default)]
pub struct TransformCache {
    inner: Mutex<CacheInner>,
}

impl TransformCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the correction produced by the most recent accepted scan.
    pub fn update(&self, correction: WorldCorrection) {
        self.inner.lock().latest = Some(correction);
    }

    /// Fold the latest correction into the table and return a copy of all entries.
    pub fn refresh(&self) -> Vec<WorldCorrection> {
        let mut inner = self.inner.lock();
        if let Some(latest) = inner.latest.clone() {
            inner.entries.insert(latest.odom_frame.clone(), latest);
        }
        inner.entries.values().cloned().collect()
    }

    /// Current correction for one odometry frame.
    pub fn get(&self, odom_frame: &str) -> Option<WorldCorrection> {
        let inner = self.inner.lock();
        inner
            .latest
            .as_ref()
            .filter(|latest| latest.odom_frame == odom_frame)
            .or_else(|| inner.entries.get(odom_frame))
            .cloned()
    }

    pub fn latest(&self) -> Option<WorldCorrection> {
        self.inner.lock().latest.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_correction_maps_raw_odom_onto_corrected() {
        let corrected = Pose2D::new(2.0, 1.0, 0.3);
        let raw = Pose2D::new(1.5, 0.2, -0.1);
        let c = WorldCorrection::from_poses("a/odom", &corrected, &raw, 0);

        let recovered = c.transform.compose(&raw);
        assert_relative_eq!(recovered.x, corrected.x, epsilon = 1e-5);
        assert_relative_eq!(recovered.y, corrected.y, epsilon = 1e-5);
        assert_relative_eq!(recovered.theta, corrected.theta, epsilon = 1e-5);
    }

    #[test]
    fn test_refresh_keeps_idle_agents() {
        let cache = TransformCache::new();
        cache.update(WorldCorrection::from_poses("a/odom", &Pose2D::new(1.0, 0.0, 0.0), &Pose2D::identity(), 1));
        assert_eq!(cache.refresh().len(), 1);

        cache.update(WorldCorrection::from_poses("b/odom", &Pose2D::new(0.0, 1.0, 0.0), &Pose2D::identity(), 2));
        let all = cache.refresh();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].odom_frame, "a/odom");
        assert_eq!(all[1].odom_frame, "b/odom");
    }

    #[test]
    fn test_get_sees_latest_before_refresh() {
        let cache = TransformCache::new();
        cache.update(WorldCorrection::from_poses("a/odom", &Pose2D::new(3.0, 0.0, 0.0), &Pose2D::identity(), 5));

        let c = cache.get("a/odom").unwrap();
        assert_relative_eq!(c.transform.x, 3.0);
        assert!(cache.get("b/odom").is_none());
    }
}
