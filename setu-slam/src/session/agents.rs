//! Fleet roster: which frames and topics belong to which agent.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{Result, SlamError};

/// Frame and topic lists, index-aligned per agent.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FramesConfig {
    /// World frame every correction is expressed in
    pub map_frame: String,
    pub base_frames: Vec<String>,
    pub odom_frames: Vec<String>,
    pub laser_topics: Vec<String>,
    /// Optional; when present must match the other lists
    pub fiducial_topics: Vec<String>,
    /// Optional per-agent flag for upside-down lasers
    pub inverted_lasers: Vec<bool>,
}

impl Default for FramesConfig {
    fn default() -> Self {
        Self {
            map_frame: "map".to_string(),
            base_frames: vec!["base_footprint".to_string()],
            odom_frames: vec!["odom".to_string()],
            laser_topics: vec!["/scan".to_string()],
            fiducial_topics: vec!["/detections".to_string()],
            inverted_lasers: Vec::new(),
        }
    }
}

impl FramesConfig {
    /// Conventional frame layout for a named fleet (`agent/base_link`, `agent/odom`).
    pub fn for_fleet<S: AsRef<str>>(agents: &[S]) -> Self {
        let mut config = Self {
            base_frames: Vec::new(),
            odom_frames: Vec::new(),
            laser_topics: Vec::new(),
            fiducial_topics: Vec::new(),
            ..Default::default()
        };
        for agent in agents {
            let agent = agent.as_ref();
            config.base_frames.push(format!("{agent}/base_link"));
            config.odom_frames.push(format!("{agent}/odom"));
            config.laser_topics.push(format!("/{agent}/scan"));
            config.fiducial_topics.push(format!("/{agent}/detections"));
        }
        config
    }
}

/// One robot in the fleet.
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub name: String,
    /// Base frame; scans are stamped with this frame
    pub base_frame: String,
    pub odom_frame: String,
    pub laser_topic: String,
    pub fiducial_topic: Option<String>,
    pub laser_inverted: bool,
}

/// Agent name of a frame: the part before the first `/`.
pub fn agent_name(frame: &str) -> &str {
    let frame = frame.trim_start_matches('/');
    frame.split('/').next().unwrap_or(frame)
}

/// Validated, immutable list of agents.
#[derive(Debug, Clone)]
pub struct AgentRoster {
    agents: Vec<Agent>,
    by_base_frame: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl AgentRoster {
    /// Build the roster, rejecting misaligned lists.
    ///
    /// A mismatch would silently pair one agent's scans with another's
    /// odometry, so it is a configuration error.
    pub fn from_config(config: &FramesConfig) -> Result<Self> {
        let n = config.base_frames.len();
        if n == 0 {
            return Err(SlamError::Config("no base frames configured".into()));
        }
        if config.odom_frames.len() != n {
            return Err(SlamError::Config(format!(
                "base_frames has {} entries but odom_frames has {}",
                n,
                config.odom_frames.len()
            )));
        }
        if config.laser_topics.len() != n {
            return Err(SlamError::Config(format!(
                "base_frames has {} entries but laser_topics has {}",
                n,
                config.laser_topics.len()
            )));
        }
        if !config.fiducial_topics.is_empty() && config.fiducial_topics.len() != n {
            return Err(SlamError::Config(format!(
                "base_frames has {} entries but fiducial_topics has {}",
                n,
                config.fiducial_topics.len()
            )));
        }
        if !config.inverted_lasers.is_empty() && config.inverted_lasers.len() != n {
            return Err(SlamError::Config(format!(
                "base_frames has {} entries but inverted_lasers has {}",
                n,
                config.inverted_lasers.len()
            )));
        }

        let mut roster = Self {
            agents: Vec::with_capacity(n),
            by_base_frame: HashMap::new(),
            by_name: HashMap::new(),
        };
        for idx in 0..n {
            let base_frame = config.base_frames[idx].clone();
            let agent = Agent {
                name: agent_name(&base_frame).to_string(),
                odom_frame: config.odom_frames[idx].clone(),
                laser_topic: config.laser_topics[idx].clone(),
                fiducial_topic: config.fiducial_topics.get(idx).cloned(),
                laser_inverted: config.inverted_lasers.get(idx).copied().unwrap_or(false),
                base_frame,
            };
            if roster.by_base_frame.contains_key(&agent.base_frame) {
                return Err(SlamError::Config(format!(
                    "base frame {} listed twice",
                    agent.base_frame
                )));
            }
            roster.by_base_frame.insert(agent.base_frame.clone(), idx);
            roster.by_name.entry(agent.name.clone()).or_insert(idx);
            roster.agents.push(agent);
        }
        Ok(roster)
    }

    /// Agent whose base frame is `frame`.
    pub fn for_frame(&self, frame: &str) -> Option<&Agent> {
        self.by_base_frame.get(frame).map(|&idx| &self.agents[idx])
    }

    pub fn by_name(&self, name: &str) -> Option<&Agent> {
        self.by_name.get(name).map(|&idx| &self.agents[idx])
    }

    pub fn first(&self) -> Option<&Agent> {
        self.agents.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
