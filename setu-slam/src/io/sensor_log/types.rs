//! Sensor log file format.
//!
//! ```text
//! ┌──────────────────────┐
//! │ header (64 bytes)    │ postcard LogHeader, zero padded
//! ├──────────────────────┤
//! │ u32 LE length        │
//! │ postcard LogMessage  │ repeated
//! └──────────────────────┘
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::types::{FiducialDetections, OdometrySample, RangeScan};

pub const LOG_MAGIC: [u8; 4] = *b"SLOG";

pub const LOG_VERSION: u16 = 1;

pub const HEADER_SIZE: usize = 64;

/// Largest accepted message payload.
pub const MAX_MESSAGE_BYTES: usize = 10_000_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub start_time_us: u64,
    pub end_time_us: u64,
    pub message_count: u64,
}

impl LogHeader {
    pub fn new() -> Self {
        Self {
            magic: LOG_MAGIC,
            version: LOG_VERSION,
            start_time_us: 0,
            end_time_us: 0,
            message_count: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == LOG_MAGIC && self.version == LOG_VERSION
    }

    pub fn duration_us(&self) -> u64 {
        self.end_time_us.saturating_sub(self.start_time_us)
    }
}

impl Default for LogHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// One recorded observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogMessage {
    Scan(RangeScan),
    Odometry(OdometrySample),
    Fiducials(FiducialDetections),
}

impl LogMessage {
    pub fn timestamp_us(&self) -> u64 {
        match self {
            LogMessage::Scan(scan) => scan.stamp_us,
            LogMessage::Odometry(sample) => sample.stamp_us,
            LogMessage::Fiducials(detections) => detections.stamp_us,
        }
    }
}

/// Summary returned when a recording is closed.
#[derive(Debug, Clone)]
pub struct LogInfo {
    pub path: PathBuf,
    pub message_count: u64,
    pub scan_count: u64,
    pub odometry_count: u64,
    pub fiducial_count: u64,
    pub duration_us: u64,
}
