//! I/O and infrastructure layer.
//!
//! # Contents
//!
//! - [`archive`]: on-disk session archives (graph + dataset)
//! - [`broadcast`]: outbound transforms, markers and graph snapshots
//! - [`sensor_log`]: sensor recording and playback

pub mod archive;
pub mod broadcast;
pub mod sensor_log;

pub use archive::{GraphArchive, PostcardArchive, RestoredSession};
pub use broadcast::{Broadcast, Broadcaster, ChannelBroadcaster};
pub use sensor_log::{LogMessage, LogPlayer, LogRecorder};
