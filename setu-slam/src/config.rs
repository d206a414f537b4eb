//! Daemon configuration.
//!
//! Every section is optional; missing keys fall back to defaults.
//!
//! ```toml
//! [frames]
//! base_frames = ["alpha/base_link", "beta/base_link"]
//! odom_frames = ["alpha/odom", "beta/odom"]
//! laser_topics = ["/alpha/scan", "/beta/scan"]
//!
//! [admission]
//! throttle_scans = 1
//! minimum_time_interval = 0.5
//!
//! [startup]
//! map_file_name = "maps/office.setu"
//! map_start_at_dock = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::types::Pose2D;
use crate::utils::secs_to_us;
use crate::engine::graph::SolverConfig;
use crate::engine::MapperConfig;
use crate::error::Result;
use crate::loop_closure::InteractiveConfig;
use crate::session::{AdmissionConfig, FramesConfig, MatchType};

/// Default search locations when no path is given.
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["setu-slam.toml", "/etc/setu-slam.toml"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlamConfig {
    #[serde(default)]
    pub frames: FramesConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub interactive: InteractiveConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub mapper: MapperConfig,
    #[serde(default)]
    pub startup: StartupConfig,
    #[serde(default)]
    pub restore: RestoreConfig,
}

impl SlamConfig {
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(basic_toml::from_str(contents)?)
    }

    /// Load from an explicit path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load from `path`, or the first readable default location, or defaults.
    ///
    /// An explicit path that fails to load is reported and replaced by defaults.
    pub fn discover(path: Option<&Path>) -> Self {
        if let Some(path) = path {
            return match Self::load(path) {
                Ok(cfg) => {
                    log::info!("Loaded config from {}", path.display());
                    cfg
                }
                Err(e) => {
                    log::warn!("Failed to load config {}: {}", path.display(), e);
                    Self::default()
                }
            };
        }

        for candidate in DEFAULT_CONFIG_PATHS {
            if let Ok(cfg) = Self::load(Path::new(candidate)) {
                log::info!("Loaded config from {}", candidate);
                return cfg;
            }
        }
        Self::default()
    }
}

/// Publish loop timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Seconds between transform broadcasts; 0 disables the loop.
    pub transform_publish_period: f64,
    /// Seconds between fiducial marker broadcasts.
    pub tag_publish_period: f64,
    /// Seconds between graph snapshot broadcasts.
    pub map_update_interval: f64,
    /// Future-dating applied to broadcast transforms.
    pub transform_timeout: f64,
    /// Odometry history kept for lookups.
    pub tf_buffer_duration: f64,
    /// Outbound queue depth; overflow drops broadcasts.
    pub broadcast_capacity: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            transform_publish_period: 0.05,
            tag_publish_period: 0.5,
            map_update_interval: 10.0,
            transform_timeout: 0.2,
            tf_buffer_duration: 30.0,
            broadcast_capacity: 64,
        }
    }
}

impl PublishConfig {
    /// Transform ticks per fiducial broadcast.
    pub fn tag_publish_ticks(&self) -> u64 {
        if self.transform_publish_period <= 0.0 {
            return 1;
        }
        (self.tag_publish_period / self.transform_publish_period)
            .ceil()
            .max(1.0) as u64
    }

    pub fn transform_timeout_us(&self) -> u64 {
        secs_to_us(self.transform_timeout)
    }
}

/// Map to restore when the daemon starts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    pub map_file_name: Option<String>,
    /// `[x, y, theta]`
    pub map_start_pose: Option<Vec<f32>>,
    pub map_start_at_dock: bool,
}

/// A deserialize request derived from [`StartupConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct StartupRestore {
    pub path: PathBuf,
    pub match_type: MatchType,
    pub initial_pose: Pose2D,
}

impl StartupConfig {
    /// Resolve the startup request, if a map file is configured.
    pub fn restore_request(&self) -> Option<StartupRestore> {
        let path = self.map_file_name.as_deref().filter(|p| !p.is_empty())?;

        let (match_type, initial_pose) = match &self.map_start_pose {
            Some(values) if values.len() == 3 => (
                MatchType::StartAtGivenPose,
                Pose2D::new(values[0], values[1], values[2]),
            ),
            Some(values) => {
                log::error!(
                    "map_start_pose must have exactly three values, got {}; using origin",
                    values.len()
                );
                (MatchType::StartAtGivenPose, Pose2D::identity())
            }
            None if self.map_start_at_dock => (MatchType::StartAtFirstNode, Pose2D::identity()),
            None => {
                log::warn!("map_file_name set without a start pose or dock start; ignoring");
                return None;
            }
        };

        Some(StartupRestore {
            path: PathBuf::from(path),
            match_type,
            initial_pose,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    /// One-second waits for a live scan after restore.
    pub metadata_wait_attempts: u32,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            metadata_wait_attempts: 30,
        }
    }
}
