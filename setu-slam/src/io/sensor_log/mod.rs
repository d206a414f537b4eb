//! Recorded sensor streams for offline replay.

mod player;
mod recorder;
mod types;

pub use player::LogPlayer;
pub use recorder::LogRecorder;
pub use types::{LogHeader, LogInfo, LogMessage, LOG_MAGIC, LOG_VERSION};
